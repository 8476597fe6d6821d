//! Two-tier caching for the aggregation layer.
//!
//! [`bulk::BulkCache`] holds one shared snapshot of the collections needed
//! for cross-entity joins; [`result::ResultCache`] holds finished enriched
//! payloads per query key; [`coalesce::Coalescer`] makes sure a not-yet-
//! cached key is only ever computed once no matter how many callers ask for
//! it at the same moment.
//!
//! All three are process-wide shared state guarded by plain mutexes that
//! are only ever held for map operations, never across an await.

pub mod bulk;
pub mod coalesce;
pub mod result;

pub use bulk::{BulkCache, BulkDataset};
pub use coalesce::Coalescer;
pub use result::ResultCache;

/// Convert a std duration to a chrono one for timestamp arithmetic.
/// Saturates instead of failing on absurdly large configs.
pub(crate) fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
