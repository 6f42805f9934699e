//! Payment gateway client.
//!
//! The gateway accepts `POST {base}/payments` with a bearer token and
//! answers 204 No Content once the payment is booked. Anything else is
//! retried under a constant `Idempotency-Key` (the ride id), so a
//! repeated POST can never double-charge. The whole retry loop runs
//! under one overall deadline; exhausting it surfaces as an upstream
//! failure.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;

use crate::domain::RideId;
use crate::error::GatewayError;

/// Overall deadline for one payment including all retries.
const PAYMENT_DEADLINE: Duration = Duration::from_secs(10);

/// Pause between retry attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
struct PostPaymentRequest {
    amount: i32,
}

/// HTTP client for the payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentClient {
    inner: reqwest::Client,
}

impl PaymentClient {
    /// Creates a client with its own connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Books a payment, retrying until the gateway acknowledges with
    /// 204 or the deadline passes.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PaymentUpstream`] when the gateway never
    /// acknowledges within the deadline or the request itself fails.
    pub async fn post_payment(
        &self,
        base_url: &str,
        token: &str,
        ride_id: &RideId,
        amount: i32,
    ) -> Result<(), GatewayError> {
        let url = format!("{base_url}/payments");
        let body = PostPaymentRequest { amount };

        let attempt_loop = async {
            loop {
                let response = self
                    .inner
                    .post(&url)
                    .bearer_auth(token)
                    .header("Idempotency-Key", ride_id.as_str())
                    .json(&body)
                    .send()
                    .await;

                match response {
                    Ok(res) if res.status() == StatusCode::NO_CONTENT => return Ok(()),
                    Ok(res) => {
                        tracing::warn!(status = %res.status(), ride_id = %ride_id, "payment not accepted, retrying");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, ride_id = %ride_id, "payment request failed, retrying");
                    }
                }
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        };

        match tokio::time::timeout(PAYMENT_DEADLINE, attempt_loop).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::PaymentUpstream(
                "gateway did not accept the payment in time".to_owned(),
            )),
        }
    }
}

impl Default for PaymentClient {
    fn default() -> Self {
        Self::new()
    }
}
