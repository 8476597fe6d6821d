//! Concurrent-request coalescing.
//!
//! N callers asking for the same not-yet-cached key must trigger exactly
//! one computation. The first caller registers a shared future under the
//! key; everyone else awaits the same handle. Registration removal happens
//! on every completion path, success or failure, so an error never leaves a
//! permanently stuck key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::debug;

use crate::error::ServiceError;

type SharedComputation<T> = Shared<BoxFuture<'static, Result<T, ServiceError>>>;

pub struct Coalescer<T: Clone> {
    inflight: Mutex<HashMap<String, SharedComputation<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Coalescer<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `make()` under `key`, unless an identical computation is already
    /// in flight, in which case its result is shared.
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
    {
        let computation = {
            let mut inflight = self.lock();
            if let Some(existing) = inflight.get(key) {
                debug!(key = key, "Joining in-flight computation");
                existing.clone()
            } else {
                let shared = make().boxed().shared();
                inflight.insert(key.to_string(), shared.clone());
                shared
            }
        };

        let result = computation.clone().await;

        // Every finishing waiter tries to deregister, so cleanup does not
        // depend on the first caller surviving to completion. The pointer
        // comparison keeps a purge-then-restart replacement intact.
        let mut inflight = self.lock();
        let still_registered = inflight
            .get(key)
            .is_some_and(|current| current.ptr_eq(&computation));
        if still_registered {
            inflight.remove(key);
        }
        result
    }

    /// In-flight computation count, for diagnostics.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget the in-flight computation for `key`, if any. Current waiters
    /// still receive its result; the next caller starts fresh.
    pub fn purge(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Forget the in-flight computation for every matching key.
    pub fn purge_matching(&self, pred: impl Fn(&str) -> bool) {
        self.lock().retain(|key, _| !pred(key));
    }

    pub fn purge_all(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedComputation<T>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Coalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}
