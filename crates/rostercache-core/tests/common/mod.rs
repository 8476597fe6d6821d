// Shared test support: an in-memory record store with call counters and
// fault injection, plus the staffing fixture used across the suite.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use rostercache_core::store::{FetchOptions, Record, RecordStore, StoreError};

/// Opt-in log output while debugging a test: `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const S1: &str = "recSEC0000000001A";
pub const S2: &str = "recSEC0000000002A";
pub const T1: &str = "recTSL0000000001A";
pub const T2: &str = "recTSL0000000002A";
pub const A1: &str = "recASG0000000001A";
pub const A2: &str = "recASG0000000002A";
pub const A3: &str = "recASG0000000003A";
pub const V1: &str = "recVOL0000000001A";
pub const V2: &str = "recVOL0000000002A";
/// Volunteer whose assignment list carries one malformed id.
pub const V3: &str = "recVOL0000000003A";
/// Volunteer with no assignments at all.
pub const V4: &str = "recVOL0000000004A";

pub fn record(id: &str, fields: Value) -> Record {
    let Value::Object(map) = fields else {
        panic!("fixture fields must be an object");
    };
    Record::new(id, map)
}

pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Record>>>,
    pub fetch_all_calls: AtomicUsize,
    pub fetch_by_id_calls: AtomicUsize,
    pub fetch_by_ids_calls: AtomicUsize,
    fail: AtomicBool,
    fail_bulk: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            fetch_all_calls: AtomicUsize::new(0),
            fetch_by_id_calls: AtomicUsize::new(0),
            fetch_by_ids_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            fail_bulk: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// The staffing scenario: sector S1 with timeslots T1 (capacity 2) and
    /// T2 (capacity 1); assignments A1{V1,T1}, A2{V2,T1}, A3{V1,T2}; plus a
    /// second sector, a volunteer with a malformed link and one with none.
    pub fn with_scenario() -> Self {
        let store = Self::new();
        store.insert(
            "sectors",
            vec![
                record(S1, json!({"name": "Bar", "totalVolunteers": 3, "totalNeeds": 1})),
                record(S2, json!({"name": "Gates", "totalVolunteers": 5, "totalNeeds": 0})),
            ],
        );
        store.insert(
            "timeslots",
            vec![
                record(T1, json!({
                    "name": "T1",
                    "dateStart": "2025-01-10",
                    "sector": [S1],
                    "capacity": 2,
                })),
                record(T2, json!({
                    "name": "T2",
                    "dateStart": "2025-01-11",
                    "sector": [S1],
                    "capacity": 1,
                })),
            ],
        );
        store.insert(
            "assignments",
            vec![
                record(A1, json!({"volunteer": [V1], "txand": [T1], "status": "Validated"})),
                record(A2, json!({"volunteer": [V2], "txand": [T1], "status": "Pending"})),
                record(A3, json!({"volunteer": [V1], "txand": [T2], "status": "Validated"})),
            ],
        );
        store.insert(
            "volunteers",
            vec![
                record(V1, json!({
                    "firstName": "Maia",
                    "lastName": "Etxeberria",
                    "assignments": [A1, A3],
                })),
                record(V2, json!({
                    "firstName": "Jon",
                    "lastName": "Agirre",
                    "assignments": [A2],
                })),
                record(V3, json!({
                    "firstName": "Ane",
                    "lastName": "Larralde",
                    "assignments": ["badid", A1],
                })),
                record(V4, json!({
                    "firstName": "Peio",
                    "lastName": "Iriarte",
                })),
            ],
        );
        store
    }

    pub fn insert(&self, collection: &str, records: Vec<Record>) {
        let mut collections = self.lock();
        collections.insert(collection.to_string(), records);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fail only whole-collection fetches, leaving per-record reads alive.
    pub fn set_fail_bulk(&self, fail: bool) {
        self.fail_bulk.store(fail, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn simulate(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::ServerError("injected outage".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Record>>> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for MemoryStore {
    fn fetch_all<'a>(
        &'a self,
        collection: &'a str,
        options: FetchOptions,
    ) -> BoxFuture<'a, Result<Vec<Record>, StoreError>> {
        async move {
            self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate().await?;
            if self.fail_bulk.load(Ordering::SeqCst) {
                return Err(StoreError::ServerError("injected bulk outage".to_string()));
            }
            let mut records = self.lock().get(collection).cloned().unwrap_or_default();
            if let Some(max) = options.max_records {
                records.truncate(max as usize);
            }
            Ok(records)
        }
        .boxed()
    }

    fn fetch_by_ids<'a>(
        &'a self,
        collection: &'a str,
        ids: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Record>, StoreError>> {
        async move {
            self.fetch_by_ids_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate().await?;
            // Vanished ids silently drop out, like the real store
            let records = self
                .lock()
                .get(collection)
                .map(|all| {
                    all.iter()
                        .filter(|r| ids.contains(&r.id))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            Ok(records)
        }
        .boxed()
    }

    fn fetch_by_id<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Record>, StoreError>> {
        async move {
            self.fetch_by_id_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate().await?;
            let found = self
                .lock()
                .get(collection)
                .and_then(|all| all.iter().find(|r| r.id == id).cloned());
            Ok(found)
        }
        .boxed()
    }
}
