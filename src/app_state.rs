//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use sqlx::MySqlPool;

use crate::cache::CacheRegistry;
use crate::dispatcher::DispatcherHandle;
use crate::notifier::NotificationHub;
use crate::payment::PaymentClient;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection pool for the authoritative store.
    pub pool: MySqlPool,
    /// In-memory indexes over the store.
    pub cache: Arc<CacheRegistry>,
    /// Per-rider and per-chair notification queues.
    pub hub: Arc<NotificationHub>,
    /// Producer handle into the matcher worker.
    pub dispatcher: DispatcherHandle,
    /// Payment gateway client.
    pub payment: PaymentClient,
}
