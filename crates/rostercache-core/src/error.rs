//! Error taxonomy for the aggregation layer.
//!
//! Join and enrichment logic never errors on data-shape irregularities;
//! those degrade to defaults with a logged warning. What reaches callers is
//! limited to upstream I/O failures, missing target entities, and the
//! stale-snapshot ceiling. Variants are cheap to clone because a coalesced
//! failure is delivered to every waiter.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The record store failed or timed out. Not retried here; retry policy
    /// belongs to the caller.
    #[error("record store unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The target entity of a centric view does not exist upstream.
    /// Distinct from an empty-but-valid result.
    #[error("{collection} record {id} not found")]
    NotFound { collection: String, id: String },

    /// The bulk snapshot could not refresh and the copy on hand is past the
    /// hard staleness ceiling.
    #[error("bulk snapshot is {age_secs}s old and the upstream refresh failed")]
    StaleDataExceeded { age_secs: i64 },

    /// A cache invariant was broken. Should not happen in practice.
    #[error("internal cache inconsistency: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Whether a caller-facing handler should map this to a retryable
    /// "temporarily unavailable" response rather than a hard failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_) | Self::StaleDataExceeded { .. }
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        Self::UpstreamUnavailable(err.to_string())
    }
}
