//! Record store accessor.
//!
//! The upstream store is schema-light: every record is an opaque id plus an
//! open field map, and relationships are arrays of record ids. This module
//! defines the raw [`Record`] shape, the [`RecordStore`] trait the rest of
//! the crate fetches through, and the HTTP implementation used in
//! production. Everything above this seam is store-agnostic.

pub mod error;
pub mod record;
pub mod rest;

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;

pub use error::StoreError;
pub use record::{fk, is_record_id, Record};
pub use rest::RestStore;

use crate::error::ServiceError;

/// Options for a whole-collection fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Upstream filter formula, passed through verbatim.
    pub filter_formula: Option<String>,
    /// Field to sort by, ascending.
    pub sort_field: Option<String>,
    /// Cap on the number of records returned.
    pub max_records: Option<u32>,
}

/// Read access to one upstream collection at a time.
///
/// Futures are boxed so the service can hold `Arc<dyn RecordStore>` and
/// tests can swap in an in-memory implementation.
pub trait RecordStore: Send + Sync {
    /// Fetch every record of a collection, subject to `options`.
    fn fetch_all<'a>(
        &'a self,
        collection: &'a str,
        options: FetchOptions,
    ) -> BoxFuture<'a, Result<Vec<Record>, StoreError>>;

    /// Fetch a specific id set. Ids that no longer exist are silently
    /// dropped from the result.
    fn fetch_by_ids<'a>(
        &'a self,
        collection: &'a str,
        ids: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Record>, StoreError>>;

    /// Fetch one record, `None` if it does not exist.
    fn fetch_by_id<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Record>, StoreError>>;
}

/// Bound an accessor call so a wedged upstream fails the computation for
/// every coalesced waiter instead of hanging it.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, ServiceError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(ServiceError::UpstreamUnavailable(format!(
            "record store request exceeded {}s",
            limit.as_secs()
        ))),
    }
}
