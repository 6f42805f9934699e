//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The database variables use the
//! `ISUCON_DB_*` family the deployment provisions.

use std::net::SocketAddr;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Database host.
    pub db_host: String,

    /// Database port.
    pub db_port: u16,

    /// Database user.
    pub db_user: String,

    /// Database password.
    pub db_password: String,

    /// Database name.
    pub db_name: String,

    /// Maximum number of database connections in the pool.
    pub db_max_connections: u32,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to the deployment defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;

        let db_host =
            std::env::var("ISUCON_DB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let db_port = parse_env("ISUCON_DB_PORT", 3306);
        let db_user = std::env::var("ISUCON_DB_USER").unwrap_or_else(|_| "isucon".to_string());
        let db_password =
            std::env::var("ISUCON_DB_PASSWORD").unwrap_or_else(|_| "isucon".to_string());
        let db_name = std::env::var("ISUCON_DB_NAME").unwrap_or_else(|_| "isuride".to_string());
        let db_max_connections = parse_env("ISUCON_DB_MAX_CONNECTIONS", 20);

        Ok(Self {
            listen_addr,
            db_host,
            db_port,
            db_user,
            db_password,
            db_name,
            db_max_connections,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_falls_back_on_missing() {
        assert_eq!(parse_env("RIDE_GATEWAY_TEST_UNSET_VAR", 42u16), 42);
    }
}
