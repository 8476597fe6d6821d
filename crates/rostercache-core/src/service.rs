//! The aggregation service: result cache, coalescer, bulk snapshot, joins
//! and enrichment wired together behind three query operations.
//!
//! Call path for every query: result cache -> (miss) coalescer -> (no
//! identical computation in flight) bulk read-through and subset fetches ->
//! join -> enrich -> result cache write -> answer every coalesced waiter.
//!
//! Clone is cheap - the service is a handle on shared state, like an HTTP
//! client over a connection pool.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{BulkCache, Coalescer, ResultCache};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::enrich::{staffing_stats, team_sizes, StaffingStats};
use crate::error::ServiceError;
use crate::models::{
    Assignment, Sector, Timeslot, Volunteer, ASSIGNMENTS, SECTORS, TIMESLOTS, VOLUNTEERS,
};
use crate::store::{is_record_id, with_timeout, FetchOptions, RecordStore};
use crate::views::{build_sector_view, build_volunteer_view, SectorView, VolunteerView};

#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<dyn RecordStore>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    bulk: BulkCache,
    results: ResultCache<CachedPayload>,
    coalescer: Coalescer<CachedPayload>,
}

/// What the result cache holds: one finished, enriched response per key.
#[derive(Clone)]
enum CachedPayload {
    Volunteer(VolunteerView),
    Sector(SectorView),
    Stats(StaffingStats),
}

impl CachedPayload {
    fn is_empty(&self) -> bool {
        match self {
            Self::Volunteer(view) => view.is_empty(),
            Self::Sector(view) => view.is_empty(),
            Self::Stats(_) => false,
        }
    }
}

/// Read-only health snapshot of the caching layer.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub result_entries: usize,
    pub inflight_queries: usize,
    pub bulk_age_secs: Option<i64>,
}

impl Service {
    pub fn new(store: Arc<dyn RecordStore>, config: CacheConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Build with an explicit clock. Tests inject a manual clock to cross
    /// TTL boundaries without sleeping.
    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let bulk = BulkCache::new(clock.clone(), &config);
        let results = ResultCache::new(clock.clone(), config.max_result_entries);
        Self {
            inner: Arc::new(ServiceInner {
                store,
                config,
                clock,
                bulk,
                results,
                coalescer: Coalescer::new(),
            }),
        }
    }

    // ===== Queries =====

    /// Enriched volunteer with nested assignments, timeslots and sector.
    pub async fn volunteer_view(&self, volunteer_id: &str) -> Result<VolunteerView, ServiceError> {
        let key = volunteer_key(volunteer_id);
        if let Some(CachedPayload::Volunteer(view)) = self.inner.results.get(&key) {
            debug!(key = %key, "Result cache hit");
            return Ok(view);
        }

        let inner = self.inner.clone();
        let id = volunteer_id.to_string();
        let compute_key = key.clone();
        let payload = self
            .inner
            .coalescer
            .run(&key, move || async move {
                let epoch = inner.results.epoch(&compute_key);
                let view = compute_volunteer_view(&inner, &id).await?;
                let payload = CachedPayload::Volunteer(view);
                store_result(&inner, &compute_key, payload.clone(), epoch);
                Ok(payload)
            })
            .await?;
        match payload {
            CachedPayload::Volunteer(view) => Ok(view),
            _ => Err(ServiceError::Internal(format!("wrong payload under {key}"))),
        }
    }

    /// Sector summary, flat volunteer list, and per-timeslot groupings.
    pub async fn sector_view(&self, sector_id: &str) -> Result<SectorView, ServiceError> {
        let key = sector_key(sector_id);
        if let Some(CachedPayload::Sector(view)) = self.inner.results.get(&key) {
            debug!(key = %key, "Result cache hit");
            return Ok(view);
        }

        let inner = self.inner.clone();
        let id = sector_id.to_string();
        let compute_key = key.clone();
        let payload = self
            .inner
            .coalescer
            .run(&key, move || async move {
                let epoch = inner.results.epoch(&compute_key);
                let view = compute_sector_view(&inner, &id).await?;
                let payload = CachedPayload::Sector(view);
                store_result(&inner, &compute_key, payload.clone(), epoch);
                Ok(payload)
            })
            .await?;
        match payload {
            CachedPayload::Sector(view) => Ok(view),
            _ => Err(ServiceError::Internal(format!("wrong payload under {key}"))),
        }
    }

    /// Staffing totals across all sectors, or a given subset.
    pub async fn aggregate_stats(
        &self,
        sector_ids: Option<&[String]>,
    ) -> Result<StaffingStats, ServiceError> {
        let key = stats_key(sector_ids);
        if let Some(CachedPayload::Stats(stats)) = self.inner.results.get(&key) {
            debug!(key = %key, "Result cache hit");
            return Ok(stats);
        }

        let inner = self.inner.clone();
        let ids = sector_ids.map(|ids| ids.to_vec());
        let compute_key = key.clone();
        let payload = self
            .inner
            .coalescer
            .run(&key, move || async move {
                let epoch = inner.results.epoch(&compute_key);
                let stats = compute_stats(&inner, ids.as_deref()).await?;
                let payload = CachedPayload::Stats(stats);
                store_result(&inner, &compute_key, payload.clone(), epoch);
                Ok(payload)
            })
            .await?;
        match payload {
            CachedPayload::Stats(stats) => Ok(stats),
            _ => Err(ServiceError::Internal(format!("wrong payload under {key}"))),
        }
    }

    // ===== Invalidation (called by the write layer after a mutation) =====

    /// Purge cached results whose key touches `id`. Mutations to the bulk
    /// collections also drop the shared snapshot; sector mutations also
    /// drop aggregate stats, which range over all sectors.
    pub fn invalidate(&self, collection: &str, id: &str) {
        let needle = id.to_string();
        self.inner.results.purge_matching(|key| key.contains(&needle));
        self.inner.coalescer.purge_matching(|key| key.contains(&needle));
        match collection {
            SECTORS => {
                self.inner.results.purge_matching(|key| key.starts_with("stats:"));
                self.inner.coalescer.purge_matching(|key| key.starts_with("stats:"));
            }
            _ => self.inner.bulk.invalidate(),
        }
        debug!(collection = collection, id = id, "Invalidated caches for mutation");
    }

    /// Clear everything, bulk snapshot included.
    pub fn invalidate_all(&self) {
        self.inner.results.purge_all();
        self.inner.coalescer.purge_all();
        self.inner.bulk.invalidate();
        debug!("Invalidated all caches");
    }

    // ===== Diagnostics =====

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            result_entries: self.inner.results.len(),
            inflight_queries: self.inner.coalescer.len(),
            bulk_age_secs: self.inner.bulk.age_secs(),
        }
    }
}

fn volunteer_key(id: &str) -> String {
    format!("volunteer:{id}")
}

fn sector_key(id: &str) -> String {
    format!("sector:{id}")
}

/// Deterministic key for a stats query: sorted so the same id set always
/// lands on the same entry regardless of argument order.
fn stats_key(sector_ids: Option<&[String]>) -> String {
    match sector_ids {
        None => "stats:all".to_string(),
        Some(ids) => {
            let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
            sorted.sort_unstable();
            sorted.dedup();
            format!("stats:{}", sorted.join(","))
        }
    }
}

fn store_result(inner: &ServiceInner, key: &str, payload: CachedPayload, epoch: u64) {
    let ttl = if payload.is_empty() {
        inner.config.empty_result_ttl
    } else {
        inner.config.result_ttl
    };
    inner.results.set(key, payload, ttl, epoch);
}

async fn compute_sector_view(
    inner: &Arc<ServiceInner>,
    sector_id: &str,
) -> Result<SectorView, ServiceError> {
    let timeout = inner.config.fetch_timeout;
    let record = with_timeout(timeout, inner.store.fetch_by_id(SECTORS, sector_id))
        .await?
        .ok_or_else(|| ServiceError::not_found(SECTORS, sector_id))?;
    let sector = Sector::from_record(&record);

    let bulk = inner.bulk.get(&inner.store).await?;
    Ok(build_sector_view(&sector, &bulk, inner.clock.now()))
}

async fn compute_volunteer_view(
    inner: &Arc<ServiceInner>,
    volunteer_id: &str,
) -> Result<VolunteerView, ServiceError> {
    let timeout = inner.config.fetch_timeout;
    let record = with_timeout(timeout, inner.store.fetch_by_id(VOLUNTEERS, volunteer_id))
        .await?
        .ok_or_else(|| ServiceError::not_found(VOLUNTEERS, volunteer_id))?;
    let volunteer = Volunteer::from_record(&record);
    let now = inner.clock.now();

    // Malformed assignment links are dropped, not fatal; a list that is
    // entirely malformed degrades to an empty view.
    let assignment_ids: Vec<String> = volunteer
        .assignment_ids
        .iter()
        .filter(|id| {
            let ok = is_record_id(id);
            if !ok {
                warn!(volunteer = volunteer_id, link = %id, "Dropping malformed assignment link");
            }
            ok
        })
        .cloned()
        .collect();
    if assignment_ids.is_empty() {
        return Ok(build_volunteer_view(
            volunteer,
            &[],
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
            now,
        ));
    }

    let assignment_records =
        with_timeout(timeout, inner.store.fetch_by_ids(ASSIGNMENTS, &assignment_ids)).await?;
    let assignments: Vec<Assignment> =
        assignment_records.iter().map(Assignment::from_record).collect();

    // Only the subset of timeslots and sectors this volunteer touches is
    // fetched, not the full bulk set.
    let timeslot_ids = unique_ids(assignments.iter().flat_map(|a| a.timeslot_ids.iter()));
    let timeslot_records =
        with_timeout(timeout, inner.store.fetch_by_ids(TIMESLOTS, &timeslot_ids)).await?;
    let timeslots: HashMap<String, Timeslot> = timeslot_records
        .iter()
        .map(|r| (r.id.clone(), Timeslot::from_record(r)))
        .collect();

    let sector_ids = unique_ids(
        timeslots
            .values()
            .filter_map(|t| t.sector_id.as_ref())
            .chain(assignments.iter().flat_map(|a| a.sector_ids.iter())),
    );
    let sector_records =
        with_timeout(timeout, inner.store.fetch_by_ids(SECTORS, &sector_ids)).await?;
    let sectors: HashMap<String, Sector> = sector_records
        .iter()
        .map(|r| (r.id.clone(), Sector::from_record(r)))
        .collect();

    // Team sizes reflect total staffing, so they come from the bulk set
    let bulk = inner.bulk.get(&inner.store).await?;
    let sizes = team_sizes(&bulk.assignments);

    Ok(build_volunteer_view(
        volunteer,
        &assignments,
        &timeslots,
        &sectors,
        &sizes,
        now,
    ))
}

async fn compute_stats(
    inner: &Arc<ServiceInner>,
    sector_ids: Option<&[String]>,
) -> Result<StaffingStats, ServiceError> {
    let timeout = inner.config.fetch_timeout;
    let records = match sector_ids {
        Some(ids) => with_timeout(timeout, inner.store.fetch_by_ids(SECTORS, ids)).await?,
        None => {
            with_timeout(timeout, inner.store.fetch_all(SECTORS, FetchOptions::default())).await?
        }
    };
    let sectors: Vec<Sector> = records.iter().map(Sector::from_record).collect();
    Ok(staffing_stats(&sectors))
}

fn unique_ids<'a>(ids: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        if seen.insert(id.as_str()) {
            out.push(id.clone());
        }
    }
    out
}
