//! # ride-gateway
//!
//! Backend of a ride-dispatch service: riders request rides, mobile
//! chairs carry them, fleet owners watch their numbers. The service
//! exposes a JSON REST API for the three client surfaces plus an
//! initialization endpoint, and pushes ride lifecycle events to
//! connected riders and chairs over Server-Sent Events.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, SSE)
//!     │
//!     ├── REST Handlers (api/handlers)
//!     ├── SSE Delivery (api/sse)
//!     │
//!     ├── NotificationHub (notifier)
//!     ├── Dispatcher (dispatcher)
//!     │
//!     ├── CacheRegistry (cache)
//!     ├── Payment Gateway Client (payment)
//!     │
//!     └── MySQL Persistence (persistence)
//! ```
//!
//! The store is authoritative; the caches are projections rebuilt from
//! one scan per table on startup and re-initialization. The dispatcher
//! is a single worker task that matches pending rides to idle chairs
//! once per second.

pub mod api;
pub mod app_state;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod notifier;
pub mod payment;
pub mod persistence;
