//! Background matcher pairing pending rides with idle chairs.
//!
//! A single worker task owns two working sets, `waiting_chairs` and
//! `waiting_rides`, fed by buffered channels that HTTP handlers publish
//! to (a chair became available, a ride was created). A one-second tick
//! runs a matching round: score every viable (ride, chair) pair, sort,
//! assign greedily, persist, and announce the assignment through the
//! notification hub. Nothing outside the worker ever touches the
//! working sets.
//!
//! Persistence errors abort the round and leave the sets intact, so
//! unmatched pairs retry on the next tick. A re-initialization signal
//! reloads both sets from the store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use tokio::sync::mpsc;

use crate::cache::CacheRegistry;
use crate::domain::{ChairId, Coordinate, RideId, RideStatusKind};
use crate::error::GatewayError;
use crate::notifier::NotificationHub;
use crate::persistence::models::Ride;
use crate::persistence::queries;

/// Weight of the chair→pickup leg relative to the trip itself.
const PICKUP_WEIGHT: f64 = 0.1;

/// Score added per second a ride has been waiting, so old rides
/// eventually outrank every fresh one (starvation guard).
const WAIT_WEIGHT: f64 = 0.2;

/// Fallback speed for chairs whose model is missing from the reference
/// table.
const DEFAULT_SPEED: i32 = 1;

/// Period between matching rounds.
const ROUND_PERIOD: Duration = Duration::from_secs(1);

/// A ride waiting for assignment, as carried in the working set.
#[derive(Debug, Clone)]
pub struct PendingRide {
    pub id: RideId,
    pub pickup: Coordinate,
    pub destination: Coordinate,
    pub created_at: DateTime<Utc>,
}

impl From<&Ride> for PendingRide {
    fn from(ride: &Ride) -> Self {
        Self {
            id: ride.id.clone(),
            pickup: ride.pickup_coordinate(),
            destination: ride.destination_coordinate(),
            created_at: ride.created_at,
        }
    }
}

/// A chair eligible for assignment in one round.
#[derive(Debug, Clone)]
pub struct ChairCandidate {
    pub id: ChairId,
    pub location: Coordinate,
    pub speed: i32,
}

/// Producer side of the dispatcher's input channels.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    chair_tx: mpsc::Sender<ChairId>,
    ride_tx: mpsc::Sender<PendingRide>,
    init_tx: mpsc::Sender<()>,
}

impl DispatcherHandle {
    /// Tells the worker a chair became available (activated or finished
    /// a ride).
    pub async fn chair_available(&self, chair_id: ChairId) {
        if self.chair_tx.send(chair_id).await.is_err() {
            tracing::error!("dispatcher is gone, chair availability lost");
        }
    }

    /// Hands a freshly created ride to the worker.
    pub async fn ride_created(&self, ride: PendingRide) {
        if self.ride_tx.send(ride).await.is_err() {
            tracing::error!("dispatcher is gone, new ride lost");
        }
    }

    /// Asks the worker to drop its working sets and reload them from
    /// the store.
    pub async fn reload(&self) {
        if self.init_tx.send(()).await.is_err() {
            tracing::error!("dispatcher is gone, reload signal lost");
        }
    }
}

/// The matcher worker. Create with [`channel`] and drive with
/// [`Dispatcher::run`] in its own task.
#[derive(Debug)]
pub struct Dispatcher {
    pool: MySqlPool,
    cache: Arc<CacheRegistry>,
    hub: Arc<NotificationHub>,
    chair_rx: mpsc::Receiver<ChairId>,
    ride_rx: mpsc::Receiver<PendingRide>,
    init_rx: mpsc::Receiver<()>,
    waiting_chairs: HashSet<ChairId>,
    waiting_rides: HashMap<RideId, PendingRide>,
}

/// Creates the worker and its handle.
#[must_use]
pub fn channel(
    pool: MySqlPool,
    cache: Arc<CacheRegistry>,
    hub: Arc<NotificationHub>,
) -> (DispatcherHandle, Dispatcher) {
    let (chair_tx, chair_rx) = mpsc::channel(1024);
    let (ride_tx, ride_rx) = mpsc::channel(1024);
    let (init_tx, init_rx) = mpsc::channel(4);

    let handle = DispatcherHandle {
        chair_tx,
        ride_tx,
        init_tx,
    };
    let worker = Dispatcher {
        pool,
        cache,
        hub,
        chair_rx,
        ride_rx,
        init_rx,
        waiting_chairs: HashSet::new(),
        waiting_rides: HashMap::new(),
    };
    (handle, worker)
}

impl Dispatcher {
    /// Runs the worker until every handle is dropped.
    pub async fn run(mut self) {
        if let Err(err) = self.reload().await {
            tracing::error!(error = %err, "dispatcher failed to load initial working sets");
        }

        let mut tick = tokio::time::interval(ROUND_PERIOD);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!("dispatcher started");
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(err) = self.run_round().await {
                        tracing::error!(error = %err, "matching round aborted");
                    }
                }
                received = self.chair_rx.recv() => match received {
                    Some(chair_id) => {
                        self.waiting_chairs.insert(chair_id);
                    }
                    None => break,
                },
                received = self.ride_rx.recv() => match received {
                    Some(ride) => {
                        self.waiting_rides.insert(ride.id.clone(), ride);
                    }
                    None => break,
                },
                received = self.init_rx.recv() => match received {
                    Some(()) => {
                        if let Err(err) = self.reload().await {
                            tracing::error!(error = %err, "dispatcher reload failed");
                        }
                    }
                    None => break,
                },
            }
        }
        tracing::info!("dispatcher stopped");
    }

    /// Replaces both working sets with the store's view: rides without
    /// a chair and active chairs without an unevaluated ride.
    async fn reload(&mut self) -> Result<(), GatewayError> {
        let rides = sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE chair_id IS NULL")
            .fetch_all(&self.pool)
            .await?;
        let chair_ids = sqlx::query_scalar::<_, ChairId>(
            "SELECT chairs.id FROM chairs \
             LEFT JOIN rides ON chairs.id = rides.chair_id AND rides.evaluation IS NULL \
             WHERE chairs.is_active = TRUE AND rides.id IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        self.waiting_rides = rides
            .iter()
            .map(|ride| (ride.id.clone(), PendingRide::from(ride)))
            .collect();
        self.waiting_chairs = chair_ids.into_iter().collect();

        tracing::info!(
            rides = self.waiting_rides.len(),
            chairs = self.waiting_chairs.len(),
            "dispatcher working sets reloaded"
        );
        Ok(())
    }

    /// One matching round over a snapshot of the working sets.
    async fn run_round(&mut self) -> Result<(), GatewayError> {
        if self.waiting_rides.is_empty() || self.waiting_chairs.is_empty() {
            return Ok(());
        }

        let mut chairs = Vec::with_capacity(self.waiting_chairs.len());
        let mut inactive = Vec::new();
        for chair_id in &self.waiting_chairs {
            let Some(chair) = self.cache.chair(chair_id).await else {
                continue;
            };
            if !chair.is_active {
                inactive.push(chair_id.clone());
                continue;
            }
            // No known location: skip this round, keep the chair waiting.
            let Some(location) = self.cache.chair_location(chair_id).await else {
                continue;
            };
            let speed = match self.cache.model_speed(&chair.model).await {
                Some(speed) => speed,
                None => {
                    tracing::warn!(chair_id = %chair_id, model = %chair.model, "unknown chair model");
                    DEFAULT_SPEED
                }
            };
            chairs.push(ChairCandidate {
                id: chair_id.clone(),
                location: location.coordinate,
                speed,
            });
        }
        for chair_id in inactive {
            self.waiting_chairs.remove(&chair_id);
        }

        let rides: Vec<PendingRide> = self.waiting_rides.values().cloned().collect();
        let plan = plan_round(&rides, &chairs, Utc::now());
        if plan.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.acquire().await?;
        for (ride_id, chair_id) in plan {
            let updated = sqlx::query("UPDATE rides SET chair_id = ? WHERE id = ? AND chair_id IS NULL")
                .bind(&chair_id)
                .bind(&ride_id)
                .execute(&mut *conn)
                .await?;
            if updated.rows_affected() == 0 {
                // Claimed by someone else; nothing to dispatch here.
                self.waiting_rides.remove(&ride_id);
                continue;
            }

            let Some(ride) = queries::ride_by_id(&mut *conn, &ride_id).await? else {
                self.waiting_rides.remove(&ride_id);
                continue;
            };
            self.hub
                .publish_ride_transition(&mut *conn, &self.cache, &ride, RideStatusKind::Matching)
                .await?;

            self.waiting_rides.remove(&ride_id);
            self.waiting_chairs.remove(&chair_id);
            tracing::info!(ride_id = %ride_id, chair_id = %chair_id, "ride assigned");
        }
        Ok(())
    }
}

/// Score of one (ride, chair) pair; higher is better.
///
/// Travel cost is the weighted chair→pickup leg plus the trip length,
/// normalized by chair speed; waiting time adds a linearly growing
/// bonus shared by every pair of the same ride.
fn pair_score(ride: &PendingRide, chair: &ChairCandidate, now: DateTime<Utc>) -> f64 {
    let d_pickup = chair.location.distance_to(ride.pickup);
    let d_trip = ride.pickup.distance_to(ride.destination);
    let travel =
        (PICKUP_WEIGHT * f64::from(d_pickup) + f64::from(d_trip)) / f64::from(chair.speed.max(1));
    let waited = (now - ride.created_at).num_milliseconds().max(0) as f64 / 1000.0;
    WAIT_WEIGHT * waited - travel
}

/// Plans one round: the greedy best-score-first matching over the cross
/// product, each ride and each chair used at most once.
#[must_use]
pub fn plan_round(
    rides: &[PendingRide],
    chairs: &[ChairCandidate],
    now: DateTime<Utc>,
) -> Vec<(RideId, ChairId)> {
    let mut pairs = Vec::with_capacity(rides.len() * chairs.len());
    for (ride_idx, ride) in rides.iter().enumerate() {
        for (chair_idx, chair) in chairs.iter().enumerate() {
            pairs.push((pair_score(ride, chair, now), ride_idx, chair_idx));
        }
    }
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut ride_taken = vec![false; rides.len()];
    let mut chair_taken = vec![false; chairs.len()];
    let mut plan = Vec::new();
    for (_, ride_idx, chair_idx) in pairs {
        if ride_taken[ride_idx] || chair_taken[chair_idx] {
            continue;
        }
        ride_taken[ride_idx] = true;
        chair_taken[chair_idx] = true;
        plan.push((rides[ride_idx].id.clone(), chairs[chair_idx].id.clone()));
    }
    plan
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn ride_at(
        id: &str,
        pickup: Coordinate,
        destination: Coordinate,
        now: DateTime<Utc>,
    ) -> PendingRide {
        PendingRide {
            id: RideId::from(id),
            pickup,
            destination,
            created_at: now,
        }
    }

    fn chair_at(id: &str, location: Coordinate, speed: i32) -> ChairCandidate {
        ChairCandidate {
            id: ChairId::from(id),
            location,
            speed,
        }
    }

    #[test]
    fn faster_closer_chair_wins() {
        let now = Utc::now();
        let ride = ride_at("r", Coordinate::new(40, 0), Coordinate::new(60, 0), now);
        let slow_far = chair_at("c1", Coordinate::new(0, 0), 5);
        let fast_near = chair_at("c2", Coordinate::new(50, 0), 10);

        let plan = plan_round(&[ride], &[slow_far, fast_near], now);
        assert_eq!(plan, vec![(RideId::from("r"), ChairId::from("c2"))]);
    }

    #[test]
    fn each_chair_assigned_at_most_once_per_round() {
        let now = Utc::now();
        let rides = vec![
            ride_at("r1", Coordinate::new(0, 0), Coordinate::new(5, 0), now),
            ride_at("r2", Coordinate::new(1, 0), Coordinate::new(6, 0), now),
        ];
        let chairs = vec![chair_at("c1", Coordinate::new(0, 0), 3)];

        let plan = plan_round(&rides, &chairs, now);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn each_ride_assigned_at_most_once_per_round() {
        let now = Utc::now();
        let rides = vec![ride_at("r1", Coordinate::new(0, 0), Coordinate::new(5, 0), now)];
        let chairs = vec![
            chair_at("c1", Coordinate::new(0, 0), 3),
            chair_at("c2", Coordinate::new(2, 0), 3),
        ];

        let plan = plan_round(&rides, &chairs, now);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn long_waiting_ride_outranks_cheap_fresh_one() {
        let now = Utc::now();
        let stale = PendingRide {
            created_at: now - chrono::Duration::seconds(60),
            ..ride_at("old", Coordinate::new(50, 0), Coordinate::new(51, 0), now)
        };
        let fresh = ride_at("new", Coordinate::new(1, 0), Coordinate::new(2, 0), now);
        let chairs = vec![chair_at("c1", Coordinate::new(0, 0), 1)];

        let plan = plan_round(&[stale, fresh], &chairs, now);
        assert_eq!(plan[0], (RideId::from("old"), ChairId::from("c1")));
    }

    #[test]
    fn empty_inputs_plan_nothing() {
        let now = Utc::now();
        assert!(plan_round(&[], &[], now).is_empty());
        let rides = vec![ride_at("r", Coordinate::new(0, 0), Coordinate::new(1, 0), now)];
        assert!(plan_round(&rides, &[], now).is_empty());
    }
}
