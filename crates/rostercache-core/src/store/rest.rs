//! HTTP client for the upstream record store API.
//!
//! The store speaks a small REST dialect: one endpoint per collection
//! returning `{records: [{id, fields}], offset}` pages, one endpoint per
//! record. Requests authenticate with a bearer API key and the service is
//! aggressively rate limited, so 429 responses are retried with exponential
//! backoff before surfacing.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{is_record_id, FetchOptions, Record, RecordStore, StoreError};
use crate::config::StoreConfig;
use futures::future::BoxFuture;
use futures::FutureExt;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Wider than the service-level fetch bound so the socket-level timeout only
/// fires when the service one is disabled.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Ids per request when fetching an id set. Keeps the filter formula well
/// under the store's URL length limit.
const ID_CHUNK_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    offset: Option<String>,
}

/// Record store client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, StoreError> {
        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| StoreError::InvalidResponse(format!("invalid API key: {}", e)))?;
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, StoreError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::from_status(status, &body))
        }
    }

    /// GET with 429 retry and JSON decoding.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<Option<T>, StoreError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .query(query)
                .send()
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let parsed = response.json().await.map_err(|e| {
                        StoreError::InvalidResponse(format!("failed to parse {}: {}", url, e))
                    })?;
                    return Ok(Some(parsed));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(StoreError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    /// Fetch every page of a collection listing.
    async fn list(
        &self,
        collection: &str,
        options: &FetchOptions,
    ) -> Result<Vec<Record>, StoreError> {
        let url = self.collection_url(collection);
        let mut query: Vec<(String, String)> = Vec::new();
        if let Some(formula) = &options.filter_formula {
            query.push(("filterByFormula".to_string(), formula.clone()));
        }
        if let Some(field) = &options.sort_field {
            query.push(("sort[0][field]".to_string(), field.clone()));
            query.push(("sort[0][direction]".to_string(), "asc".to_string()));
        }
        if let Some(max) = options.max_records {
            query.push(("maxRecords".to_string(), max.to_string()));
        }

        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut page_query = query.clone();
            if let Some(cursor) = &offset {
                page_query.push(("offset".to_string(), cursor.clone()));
            }
            let page: ListResponse = self
                .get_json(&url, &page_query)
                .await?
                .ok_or_else(|| StoreError::NotFound(collection.to_string()))?;
            records.extend(page.records);
            match page.offset {
                Some(cursor) => offset = Some(cursor),
                None => break,
            }
            if let Some(max) = options.max_records {
                if records.len() as u64 >= max as u64 {
                    records.truncate(max as usize);
                    break;
                }
            }
        }
        debug!(collection = collection, count = records.len(), "Fetched collection");
        Ok(records)
    }

    async fn list_by_ids(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        // Ids that do not even look like record ids would corrupt the filter
        // formula; they cannot match anything anyway.
        let valid: Vec<&String> = ids.iter().filter(|id| is_record_id(id)).collect();
        if valid.len() < ids.len() {
            debug!(
                collection = collection,
                dropped = ids.len() - valid.len(),
                "Dropped malformed ids from id-set fetch"
            );
        }

        for chunk in valid.chunks(ID_CHUNK_SIZE) {
            let clauses: Vec<String> = chunk
                .iter()
                .map(|id| format!("RECORD_ID()='{}'", id))
                .collect();
            let formula = if clauses.len() == 1 {
                clauses.into_iter().next().unwrap_or_default()
            } else {
                format!("OR({})", clauses.join(","))
            };
            let options = FetchOptions {
                filter_formula: Some(formula),
                ..FetchOptions::default()
            };
            records.extend(self.list(collection, &options).await?);
        }
        Ok(records)
    }

    async fn get_record(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Record>, StoreError> {
        let url = format!("{}/{}", self.collection_url(collection), id);
        self.get_json(&url, &[]).await
    }
}

impl RecordStore for RestStore {
    fn fetch_all<'a>(
        &'a self,
        collection: &'a str,
        options: FetchOptions,
    ) -> BoxFuture<'a, Result<Vec<Record>, StoreError>> {
        async move { self.list(collection, &options).await }.boxed()
    }

    fn fetch_by_ids<'a>(
        &'a self,
        collection: &'a str,
        ids: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Record>, StoreError>> {
        async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            self.list_by_ids(collection, ids).await
        }
        .boxed()
    }

    fn fetch_by_id<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Record>, StoreError>> {
        async move { self.get_record(collection, id).await }.boxed()
    }
}
