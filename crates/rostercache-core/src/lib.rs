//! Aggregation and caching core for rostercache.
//!
//! The upstream volunteer-staffing data lives in a schema-light record store
//! behind a rate-limited HTTP API. This crate pulls the flat collections,
//! resolves the foreign-key arrays that encode the many-to-many
//! relationships between volunteers, sectors, timeslots and staffing
//! assignments, and serves denormalized, enriched views from a two-tier
//! TTL cache with concurrent-request coalescing.
//!
//! Entry point is [`Service`]; everything upstream-facing goes through the
//! [`store::RecordStore`] trait so callers can swap the HTTP client for an
//! in-memory store in tests.

pub mod cache;
pub mod clock;
pub mod config;
pub mod enrich;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
pub mod views;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, StoreConfig};
pub use enrich::StaffingStats;
pub use error::ServiceError;
pub use service::{Diagnostics, Service};
pub use store::{FetchOptions, Record, RecordStore, RestStore, StoreError};
pub use views::{SectorView, VolunteerView};
