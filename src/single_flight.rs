//! Deduplication of concurrent async work by key.
//!
//! The first caller for a key starts the work; callers arriving while it is
//! still pending await the same shared future and see the same outcome. The
//! entry is dropped once the work settles, so the next call starts fresh.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};

type InFlight<T> = Shared<BoxFuture<'static, T>>;

pub struct SingleFlight<T> {
    in_flight: Arc<Mutex<HashMap<String, InFlight<T>>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("pending", &self.pending())
            .finish()
    }
}

impl<T> SingleFlight<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with work in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `make()` for `key` unless a call for the same key is already
    /// pending, in which case wait for that one instead. `make` is only
    /// invoked by the caller that starts the work.
    ///
    /// The work runs on its own task, so it settles (and its entry is
    /// removed) even if every caller stops waiting. Must be called from
    /// within a tokio runtime.
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = in_flight.get(key) {
                existing.clone()
            } else {
                let registry = Arc::clone(&self.in_flight);
                let owned_key = key.to_string();
                let work = make();
                let task = tokio::spawn(async move {
                    let outcome = work.await;
                    registry
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&owned_key);
                    outcome
                });
                let fut = async move {
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(err) => std::panic::resume_unwind(
                            err.try_into_panic()
                                .unwrap_or_else(|err| -> Box<dyn Any + Send> {
                                    Box::new(err.to_string())
                                }),
                        ),
                    }
                }
                .boxed()
                .shared();
                in_flight.insert(key.to_string(), fut.clone());
                fut
            }
        };
        shared.await
    }
}
