//! Process-wide in-memory indexes over the store.
//!
//! Read-dominant projections used on the hot paths: chair and user
//! identity lookups (by id and by session token), last-known chair
//! locations, cumulative chair distances, chair-model speeds, and the
//! latest status per ride. Writes are point updates; the store stays
//! authoritative and the whole registry is rebuilt from one scan per
//! table on cold start and on re-initialization.
//!
//! # Concurrency
//!
//! Each index sits behind its own [`tokio::sync::RwLock`], so readers
//! of different indexes never contend and point writes lock only the
//! index they touch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use tokio::sync::RwLock;

use crate::domain::{ChairId, Coordinate, OwnerId, RideId, RideStatusKind, UserId};
use crate::error::GatewayError;
use crate::persistence::models::{
    Chair, ChairLocation, ChairModel, ChairTotalDistance, Owner, RideStatus, User,
};

/// Last reported position of a chair.
#[derive(Debug, Clone, Copy)]
pub struct LastLocation {
    /// The reported point.
    pub coordinate: Coordinate,
    /// When it was reported.
    pub recorded_at: DateTime<Utc>,
}

/// All in-memory indexes, one instance per process.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    chairs: RwLock<HashMap<ChairId, Chair>>,
    chair_token_index: RwLock<HashMap<String, ChairId>>,
    chair_locations: RwLock<HashMap<ChairId, LastLocation>>,
    chair_distances: RwLock<HashMap<ChairId, i64>>,
    model_speeds: RwLock<HashMap<String, i32>>,
    users: RwLock<HashMap<UserId, User>>,
    user_token_index: RwLock<HashMap<String, UserId>>,
    user_invitation_index: RwLock<HashMap<String, UserId>>,
    owners: RwLock<HashMap<OwnerId, Owner>>,
    owner_token_index: RwLock<HashMap<String, OwnerId>>,
    latest_ride_statuses: RwLock<HashMap<RideId, RideStatusKind>>,
}

impl CacheRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a chair and its token index entry.
    pub async fn upsert_chair(&self, chair: Chair) {
        self.chair_token_index
            .write()
            .await
            .insert(chair.access_token.clone(), chair.id.clone());
        self.chairs.write().await.insert(chair.id.clone(), chair);
    }

    /// Looks up a chair by id.
    pub async fn chair(&self, id: &ChairId) -> Option<Chair> {
        self.chairs.read().await.get(id).cloned()
    }

    /// Looks up a chair by session token.
    pub async fn chair_by_token(&self, token: &str) -> Option<Chair> {
        let id = self.chair_token_index.read().await.get(token).cloned()?;
        self.chair(&id).await
    }

    /// Records a chair's current position, returning the previous one.
    pub async fn record_chair_location(
        &self,
        chair_id: &ChairId,
        coordinate: Coordinate,
        recorded_at: DateTime<Utc>,
    ) -> Option<LastLocation> {
        self.chair_locations.write().await.insert(
            chair_id.clone(),
            LastLocation {
                coordinate,
                recorded_at,
            },
        )
    }

    /// Last known position of a chair.
    pub async fn chair_location(&self, id: &ChairId) -> Option<LastLocation> {
        self.chair_locations.read().await.get(id).copied()
    }

    /// Adds a Manhattan delta to a chair's cumulative distance.
    pub async fn add_chair_distance(&self, id: &ChairId, delta: i64) {
        *self.chair_distances.write().await.entry(id.clone()).or_insert(0) += delta;
    }

    /// Cumulative travel distance of a chair, if it ever moved.
    pub async fn chair_total_distance(&self, id: &ChairId) -> Option<i64> {
        self.chair_distances.read().await.get(id).copied()
    }

    /// Speed of a chair model, if the model is known.
    pub async fn model_speed(&self, model: &str) -> Option<i32> {
        self.model_speeds.read().await.get(model).copied()
    }

    /// Inserts or replaces a user and its token/invitation indexes.
    pub async fn upsert_user(&self, user: User) {
        self.user_token_index
            .write()
            .await
            .insert(user.access_token.clone(), user.id.clone());
        self.user_invitation_index
            .write()
            .await
            .insert(user.invitation_code.clone(), user.id.clone());
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Looks up a user by id.
    pub async fn user(&self, id: &UserId) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    /// Looks up a user by session token.
    pub async fn user_by_token(&self, token: &str) -> Option<User> {
        let id = self.user_token_index.read().await.get(token).cloned()?;
        self.user(&id).await
    }

    /// Looks up a user by invitation code.
    pub async fn user_by_invitation_code(&self, code: &str) -> Option<User> {
        let id = self
            .user_invitation_index
            .read()
            .await
            .get(code)
            .cloned()?;
        self.user(&id).await
    }

    /// Inserts or replaces an owner and its token index entry.
    pub async fn upsert_owner(&self, owner: Owner) {
        self.owner_token_index
            .write()
            .await
            .insert(owner.access_token.clone(), owner.id.clone());
        self.owners.write().await.insert(owner.id.clone(), owner);
    }

    /// Looks up an owner by id.
    pub async fn owner(&self, id: &OwnerId) -> Option<Owner> {
        self.owners.read().await.get(id).cloned()
    }

    /// Looks up an owner by session token.
    pub async fn owner_by_token(&self, token: &str) -> Option<Owner> {
        let id = self.owner_token_index.read().await.get(token).cloned()?;
        self.owner(&id).await
    }

    /// Records the latest status of a ride.
    pub async fn set_latest_ride_status(&self, ride_id: RideId, status: RideStatusKind) {
        self.latest_ride_statuses
            .write()
            .await
            .insert(ride_id, status);
    }

    /// Latest known status of a ride.
    pub async fn latest_ride_status(&self, ride_id: &RideId) -> Option<RideStatusKind> {
        self.latest_ride_statuses.read().await.get(ride_id).copied()
    }

    /// Rebuilds every index from the store.
    ///
    /// One scan per table; existing contents are replaced wholesale.
    /// Called at startup (failure is fatal) and on re-initialization.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Database`] if any scan fails.
    pub async fn hydrate(&self, pool: &MySqlPool) -> Result<(), GatewayError> {
        let chairs = sqlx::query_as::<_, Chair>("SELECT * FROM chairs")
            .fetch_all(pool)
            .await?;
        let mut chair_map = HashMap::with_capacity(chairs.len());
        let mut chair_tokens = HashMap::with_capacity(chairs.len());
        for chair in chairs {
            chair_tokens.insert(chair.access_token.clone(), chair.id.clone());
            chair_map.insert(chair.id.clone(), chair);
        }

        let locations =
            sqlx::query_as::<_, ChairLocation>("SELECT * FROM chair_locations ORDER BY created_at")
                .fetch_all(pool)
                .await?;
        let mut location_map: HashMap<ChairId, LastLocation> = HashMap::new();
        for location in locations {
            location_map.insert(
                location.chair_id.clone(),
                LastLocation {
                    coordinate: location.coordinate(),
                    recorded_at: location.created_at,
                },
            );
        }

        let distances = sqlx::query_as::<_, ChairTotalDistance>(
            "SELECT * FROM chair_locations_total_distance",
        )
        .fetch_all(pool)
        .await?;
        let distance_map: HashMap<ChairId, i64> = distances
            .into_iter()
            .map(|d| (d.chair_id, d.total_distance))
            .collect();

        let models = sqlx::query_as::<_, ChairModel>("SELECT * FROM chair_models")
            .fetch_all(pool)
            .await?;
        let speed_map: HashMap<String, i32> =
            models.into_iter().map(|m| (m.name, m.speed)).collect();

        let users = sqlx::query_as::<_, User>("SELECT * FROM users")
            .fetch_all(pool)
            .await?;
        let mut user_map = HashMap::with_capacity(users.len());
        let mut user_tokens = HashMap::with_capacity(users.len());
        let mut user_invitations = HashMap::with_capacity(users.len());
        for user in users {
            user_tokens.insert(user.access_token.clone(), user.id.clone());
            user_invitations.insert(user.invitation_code.clone(), user.id.clone());
            user_map.insert(user.id.clone(), user);
        }

        let owners = sqlx::query_as::<_, Owner>("SELECT * FROM owners")
            .fetch_all(pool)
            .await?;
        let mut owner_map = HashMap::with_capacity(owners.len());
        let mut owner_tokens = HashMap::with_capacity(owners.len());
        for owner in owners {
            owner_tokens.insert(owner.access_token.clone(), owner.id.clone());
            owner_map.insert(owner.id.clone(), owner);
        }

        let statuses =
            sqlx::query_as::<_, RideStatus>("SELECT * FROM ride_statuses ORDER BY created_at")
                .fetch_all(pool)
                .await?;
        let mut status_map: HashMap<RideId, RideStatusKind> = HashMap::new();
        for status in statuses {
            status_map.insert(status.ride_id, status.status);
        }

        *self.chairs.write().await = chair_map;
        *self.chair_token_index.write().await = chair_tokens;
        *self.chair_locations.write().await = location_map;
        *self.chair_distances.write().await = distance_map;
        *self.model_speeds.write().await = speed_map;
        *self.users.write().await = user_map;
        *self.user_token_index.write().await = user_tokens;
        *self.user_invitation_index.write().await = user_invitations;
        *self.owners.write().await = owner_map;
        *self.owner_token_index.write().await = owner_tokens;
        *self.latest_ride_statuses.write().await = status_map;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_chair(token: &str) -> Chair {
        Chair {
            id: ChairId::generate(),
            owner_id: OwnerId::generate(),
            name: "QC-1".to_owned(),
            model: "quad".to_owned(),
            is_active: true,
            access_token: token.to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn chair_lookup_by_id_and_token() {
        let cache = CacheRegistry::new();
        let chair = make_chair("tok-1");
        let id = chair.id.clone();
        cache.upsert_chair(chair).await;

        assert!(cache.chair(&id).await.is_some());
        let by_token = cache.chair_by_token("tok-1").await;
        assert_eq!(by_token.map(|c| c.id), Some(id));
        assert!(cache.chair_by_token("nope").await.is_none());
    }

    #[tokio::test]
    async fn distance_accumulates() {
        let cache = CacheRegistry::new();
        let id = ChairId::generate();
        assert_eq!(cache.chair_total_distance(&id).await, None);
        cache.add_chair_distance(&id, 5).await;
        cache.add_chair_distance(&id, 7).await;
        assert_eq!(cache.chair_total_distance(&id).await, Some(12));
    }

    #[tokio::test]
    async fn location_update_returns_previous() {
        let cache = CacheRegistry::new();
        let id = ChairId::generate();
        let prev = cache
            .record_chair_location(&id, Coordinate::new(1, 2), Utc::now())
            .await;
        assert!(prev.is_none());
        let prev = cache
            .record_chair_location(&id, Coordinate::new(3, 4), Utc::now())
            .await;
        assert_eq!(prev.map(|l| l.coordinate), Some(Coordinate::new(1, 2)));
    }

    #[tokio::test]
    async fn latest_ride_status_is_replaced() {
        let cache = CacheRegistry::new();
        let ride = RideId::generate();
        cache
            .set_latest_ride_status(ride.clone(), RideStatusKind::Matching)
            .await;
        cache
            .set_latest_ride_status(ride.clone(), RideStatusKind::Enroute)
            .await;
        assert_eq!(
            cache.latest_ride_status(&ride).await,
            Some(RideStatusKind::Enroute)
        );
    }
}
