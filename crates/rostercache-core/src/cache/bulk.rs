//! Shared bulk snapshot of the collections used for cross-entity joins.
//!
//! Sectors are deliberately absent: callers only ever need a handful and
//! fetch them by id set. The other three collections are pulled whole,
//! concurrently, and parsed once into typed models at refresh time.
//!
//! At most one refresh is in flight at any moment. Callers arriving during
//! a refresh await the same shared future; callers arriving with a fresh
//! snapshot never touch the network.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, info, warn};

use super::to_chrono;
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::ServiceError;
use crate::models::{Assignment, Timeslot, Volunteer, ASSIGNMENTS, TIMESLOTS, VOLUNTEERS};
use crate::store::{with_timeout, FetchOptions, RecordStore};

/// Full unfiltered snapshot used as the basis for in-memory joins.
#[derive(Debug, Clone)]
pub struct BulkDataset {
    pub timeslots: Vec<Timeslot>,
    pub assignments: Vec<Assignment>,
    pub volunteers: Vec<Volunteer>,
    pub fetched_at: DateTime<Utc>,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<Arc<BulkDataset>, ServiceError>>>;

struct State {
    snapshot: Option<Arc<BulkDataset>>,
    inflight: Option<RefreshFuture>,
    /// Bumped by invalidation; a refresh started under an older generation
    /// is not stored back.
    generation: u64,
}

pub struct BulkCache {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    hard_staleness_factor: u32,
    fetch_timeout: Duration,
}

impl BulkCache {
    pub fn new(clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        Self {
            state: Mutex::new(State {
                snapshot: None,
                inflight: None,
                generation: 0,
            }),
            clock,
            ttl: config.bulk_ttl,
            hard_staleness_factor: config.hard_staleness_factor,
            fetch_timeout: config.fetch_timeout,
        }
    }

    /// Read-through access to the snapshot, refreshing when stale.
    pub async fn get(
        &self,
        store: &Arc<dyn RecordStore>,
    ) -> Result<Arc<BulkDataset>, ServiceError> {
        let now = self.clock.now();
        let (refresh, generation) = {
            let mut state = self.lock();
            if let Some(snapshot) = &state.snapshot {
                if now - snapshot.fetched_at < to_chrono(self.ttl) {
                    return Ok(snapshot.clone());
                }
            }
            match state.inflight.clone() {
                Some(inflight) => (inflight, state.generation),
                None => {
                    let refresh = Self::refresh_future(
                        store.clone(),
                        self.clock.clone(),
                        self.fetch_timeout,
                    );
                    state.inflight = Some(refresh.clone());
                    (refresh, state.generation)
                }
            }
        };

        let result = refresh.clone().await;

        let mut state = self.lock();
        let own_refresh_done = state
            .inflight
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&refresh));
        if own_refresh_done {
            state.inflight = None;
        }
        match result {
            Ok(snapshot) => {
                if state.generation == generation {
                    state.snapshot = Some(snapshot.clone());
                }
                Ok(snapshot)
            }
            Err(err) => {
                // Refresh failed atomically: the old snapshot, if any, is
                // untouched. Serve it while it is under the hard ceiling.
                if let Some(snapshot) = &state.snapshot {
                    let age = self.clock.now() - snapshot.fetched_at;
                    let ceiling = to_chrono(self.ttl) * self.hard_staleness_factor as i32;
                    if age <= ceiling {
                        warn!(
                            age_secs = age.num_seconds(),
                            error = %err,
                            "Bulk refresh failed, serving stale snapshot"
                        );
                        return Ok(snapshot.clone());
                    }
                    return Err(ServiceError::StaleDataExceeded {
                        age_secs: age.num_seconds(),
                    });
                }
                Err(err)
            }
        }
    }

    fn refresh_future(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        fetch_timeout: Duration,
    ) -> RefreshFuture {
        async move {
            let (timeslots, assignments, volunteers) = tokio::try_join!(
                with_timeout(fetch_timeout, store.fetch_all(TIMESLOTS, FetchOptions::default())),
                with_timeout(fetch_timeout, store.fetch_all(ASSIGNMENTS, FetchOptions::default())),
                with_timeout(fetch_timeout, store.fetch_all(VOLUNTEERS, FetchOptions::default())),
            )?;
            let dataset = BulkDataset {
                timeslots: timeslots.iter().map(Timeslot::from_record).collect(),
                assignments: assignments.iter().map(Assignment::from_record).collect(),
                volunteers: volunteers.iter().map(Volunteer::from_record).collect(),
                fetched_at: clock.now(),
            };
            info!(
                timeslots = dataset.timeslots.len(),
                assignments = dataset.assignments.len(),
                volunteers = dataset.volunteers.len(),
                "Bulk snapshot refreshed"
            );
            Ok(Arc::new(dataset))
        }
        .boxed()
        .shared()
    }

    /// Drop the snapshot so the next read refreshes. A refresh already in
    /// flight still answers its waiters but is not stored back.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.snapshot = None;
        state.generation += 1;
        debug!("Bulk snapshot invalidated");
    }

    /// Snapshot age, for the diagnostics surface.
    pub fn age_secs(&self) -> Option<i64> {
        let state = self.lock();
        state
            .snapshot
            .as_ref()
            .map(|s| (self.clock.now() - s.fetched_at).num_seconds())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
