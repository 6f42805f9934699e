//! Notification multiplexer for the SSE surfaces.
//!
//! Every connected rider and chair gets one bounded queue, registered
//! under its principal id when the SSE connection opens. Producers
//! (handlers and the dispatcher) enqueue fully-formed payloads with a
//! non-blocking send; the single consumer per queue is the SSE stream.
//! A reconnect replaces the previous queue, which ends the old consumer
//! once the stale sender is dropped.

use std::collections::HashMap;
use std::hash::Hash;

use sqlx::MySqlConnection;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

use crate::cache::CacheRegistry;
use crate::domain::{
    ChairId, ChairRideNotification, NotificationChair, NotificationUser, RideNotification,
    RideStatusKind, UserId,
};
use crate::error::GatewayError;
use crate::persistence::models::{Ride, User};
use crate::persistence::queries;

/// Queue capacity per subscriber. On overflow the producer drops the
/// event; the stream converges from the store on reconnect.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 100;

/// Map of principal id to that principal's queue sender.
#[derive(Debug)]
struct ChannelMap<K, T> {
    inner: RwLock<HashMap<K, mpsc::Sender<T>>>,
}

impl<K, T> ChannelMap<K, T>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a fresh queue for `key`, replacing any previous one.
    ///
    /// The returned sender is for consumer-side re-enqueueing; dropping
    /// the previous sender ends the previous consumer's stream.
    async fn register(&self, key: K) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        self.inner.write().await.insert(key, tx.clone());
        (tx, rx)
    }

    /// Enqueues an event without blocking.
    ///
    /// Returns `false` when no subscriber is registered or the queue is
    /// full or closed.
    async fn publish(&self, key: &K, event: T) -> bool {
        let Some(tx) = self.inner.read().await.get(key).cloned() else {
            return false;
        };
        tx.try_send(event).is_ok()
    }

    /// Drops every registered queue.
    async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

/// Per-rider and per-chair notification queues.
#[derive(Debug)]
pub struct NotificationHub {
    riders: ChannelMap<UserId, RideNotification>,
    chairs: ChannelMap<ChairId, ChairRideNotification>,
}

impl NotificationHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            riders: ChannelMap::new(),
            chairs: ChannelMap::new(),
        }
    }

    /// Registers a rider's SSE queue, replacing any previous one.
    pub async fn register_rider(
        &self,
        user_id: UserId,
    ) -> (
        mpsc::Sender<RideNotification>,
        mpsc::Receiver<RideNotification>,
    ) {
        self.riders.register(user_id).await
    }

    /// Registers a chair's SSE queue, replacing any previous one.
    pub async fn register_chair(
        &self,
        chair_id: ChairId,
    ) -> (
        mpsc::Sender<ChairRideNotification>,
        mpsc::Receiver<ChairRideNotification>,
    ) {
        self.chairs.register(chair_id).await
    }

    /// Enqueues an event for a rider; drops it when there is no
    /// subscriber or the queue is full.
    pub async fn publish_rider(&self, user_id: &UserId, event: RideNotification) {
        if !self.riders.publish(user_id, event).await {
            tracing::debug!(user_id = %user_id, "rider notification dropped");
        }
    }

    /// Enqueues an event for a chair; drops it when there is no
    /// subscriber or the queue is full.
    pub async fn publish_chair(&self, chair_id: &ChairId, event: ChairRideNotification) {
        if !self.chairs.publish(chair_id, event).await {
            tracing::debug!(chair_id = %chair_id, "chair notification dropped");
        }
    }

    /// Drops every registered queue (re-initialization).
    pub async fn clear_all(&self) {
        self.riders.clear().await;
        self.chairs.clear().await;
    }

    /// Builds and enqueues the rider- and chair-side events for a ride
    /// transition.
    ///
    /// The chair side is skipped while the ride is unassigned. Enqueue
    /// failures are logged, never surfaced; store failures while
    /// building the payloads are.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Database`] if payload construction hits
    /// the store and fails.
    pub async fn publish_ride_transition(
        &self,
        conn: &mut MySqlConnection,
        cache: &CacheRegistry,
        ride: &Ride,
        status: RideStatusKind,
    ) -> Result<(), GatewayError> {
        let rider_event = build_ride_notification(conn, cache, ride, status).await?;
        self.publish_rider(&ride.user_id, rider_event).await;

        if let Some(chair_id) = &ride.chair_id
            && let Some(event) = build_chair_notification(conn, cache, ride, status).await?
        {
            self.publish_chair(chair_id, event).await;
        }
        Ok(())
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the rider-side payload for a ride transition.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
pub async fn build_ride_notification(
    conn: &mut MySqlConnection,
    cache: &CacheRegistry,
    ride: &Ride,
    status: RideStatusKind,
) -> Result<RideNotification, GatewayError> {
    let fare = queries::discounted_fare(
        conn,
        &ride.user_id,
        Some(ride),
        ride.pickup_coordinate(),
        ride.destination_coordinate(),
    )
    .await?;

    let mut chair = None;
    if let Some(chair_id) = &ride.chair_id
        && let Some(cached) = cache.chair(chair_id).await
    {
        let stats = queries::chair_stats(conn, chair_id).await?;
        chair = Some(NotificationChair {
            id: cached.id,
            name: cached.name,
            model: cached.model,
            stats,
        });
    }

    Ok(RideNotification {
        ride_id: ride.id.clone(),
        pickup_coordinate: ride.pickup_coordinate(),
        destination_coordinate: ride.destination_coordinate(),
        fare,
        status,
        chair,
        created_at: ride.created_at.timestamp_millis(),
        updated_at: ride.updated_at.timestamp_millis(),
    })
}

/// Builds the chair-side payload for a ride transition, or `None` when
/// no chair is assigned yet.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
pub async fn build_chair_notification(
    conn: &mut MySqlConnection,
    cache: &CacheRegistry,
    ride: &Ride,
    status: RideStatusKind,
) -> Result<Option<ChairRideNotification>, GatewayError> {
    if ride.chair_id.is_none() {
        return Ok(None);
    }

    let user = match cache.user(&ride.user_id).await {
        Some(user) => user,
        None => {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(&ride.user_id)
                .fetch_one(conn)
                .await?
        }
    };

    Ok(Some(ChairRideNotification {
        ride_id: ride.id.clone(),
        user: NotificationUser {
            id: user.id.clone(),
            name: user.display_name(),
        },
        pickup_coordinate: ride.pickup_coordinate(),
        destination_coordinate: ride.destination_coordinate(),
        status,
    }))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Coordinate;

    fn make_event(status: RideStatusKind) -> RideNotification {
        RideNotification {
            ride_id: crate::domain::RideId::from("r1"),
            pickup_coordinate: Coordinate::new(0, 0),
            destination_coordinate: Coordinate::new(1, 0),
            fare: 600,
            status,
            chair: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_dropped() {
        let hub = NotificationHub::new();
        let user = UserId::from("u1");
        // No panic, no error: the event just vanishes.
        hub.publish_rider(&user, make_event(RideStatusKind::Matching))
            .await;
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let hub = NotificationHub::new();
        let user = UserId::from("u1");
        let (_tx, mut rx) = hub.register_rider(user.clone()).await;

        hub.publish_rider(&user, make_event(RideStatusKind::Matching))
            .await;

        let event = rx.recv().await;
        assert_eq!(event.map(|e| e.status), Some(RideStatusKind::Matching));
    }

    #[tokio::test]
    async fn reconnect_replaces_queue() {
        let hub = NotificationHub::new();
        let user = UserId::from("u1");
        let (old_tx, mut old_rx) = hub.register_rider(user.clone()).await;
        let (_tx, mut new_rx) = hub.register_rider(user.clone()).await;
        drop(old_tx);

        hub.publish_rider(&user, make_event(RideStatusKind::Enroute))
            .await;

        // Old consumer's stream ends, new one gets the event.
        assert!(old_rx.recv().await.is_none());
        assert_eq!(
            new_rx.recv().await.map(|e| e.status),
            Some(RideStatusKind::Enroute)
        );
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let hub = NotificationHub::new();
        let user = UserId::from("u1");
        let (_tx, mut rx) = hub.register_rider(user.clone()).await;

        for _ in 0..=SUBSCRIBER_QUEUE_CAPACITY {
            hub.publish_rider(&user, make_event(RideStatusKind::Matching))
                .await;
        }

        // Exactly the capacity made it through.
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_QUEUE_CAPACITY);
    }
}
