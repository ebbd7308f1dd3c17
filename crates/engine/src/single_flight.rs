//! Per-key request coalescing.
//!
//! The first caller for a key spawns the work; callers arriving while it is
//! in flight await the same shared result. The work runs on its own task, so
//! a caller that goes away never abandons a reservation half-settled.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::EngineError;

type Flight<V> = Shared<BoxFuture<'static, Result<V, EngineError>>>;

pub struct SingleFlight<V> {
    inflight: Arc<Mutex<HashMap<String, Flight<V>>>>,
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Result of [`SingleFlight::run`].
#[derive(Debug)]
pub struct FlightResult<V> {
    pub value: Result<V, EngineError>,
    /// `false` when this caller joined a flight started by another.
    pub leader: bool,
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` under `key`, or join the flight already running under it.
    /// `work` is dropped unpolled when a flight is joined.
    pub async fn run<F>(&self, key: &str, work: F) -> FlightResult<V>
    where
        F: Future<Output = Result<V, EngineError>> + Send + 'static,
    {
        let (flight, leader) = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            match inflight.get(key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let registry = Arc::clone(&self.inflight);
                    let owned_key = key.to_string();
                    let handle = tokio::spawn(async move {
                        let value = work.await;
                        registry
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&owned_key);
                        value
                    });
                    let flight = async move {
                        handle
                            .await
                            .map_err(|e| EngineError::Internal(format!("generation task failed: {e}")))?
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key.to_string(), flight.clone());
                    (flight, true)
                }
            }
        };

        FlightResult {
            value: flight.await,
            leader,
        }
    }

    /// Keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let flights: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = Arc::clone(&flights);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                flights
                    .run("k", async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(42)
                    })
                    .await
            }));
        }

        let mut leaders = 0;
        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result.value.unwrap(), 42);
            if result.leader {
                leaders += 1;
            }
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(leaders, 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let flights: SingleFlight<&'static str> = SingleFlight::new();
        let (a, b) = tokio::join!(
            flights.run("a", async { Ok("a") }),
            flights.run("b", async { Ok("b") }),
        );
        assert!(a.leader && b.leader);
        assert_eq!(a.value.unwrap(), "a");
        assert_eq!(b.value.unwrap(), "b");
    }

    #[tokio::test]
    async fn key_is_released_after_completion() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let first = flights.run("k", async { Ok(1) }).await;
        let second = flights.run("k", async { Ok(2) }).await;
        assert_eq!(first.value.unwrap(), 1);
        assert_eq!(second.value.unwrap(), 2);
        assert!(second.leader);
    }

    #[tokio::test]
    async fn errors_are_shared_too() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let result = flights
            .run("k", async { Err(EngineError::LedgerWriteFailed("down".into())) })
            .await;
        assert!(matches!(result.value, Err(EngineError::LedgerWriteFailed(_))));
    }

    #[tokio::test]
    async fn work_survives_a_dropped_caller() {
        let flights: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
        let done = Arc::new(AtomicU32::new(0));

        let caller = {
            let flights = Arc::clone(&flights);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                flights
                    .run("k", async move {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        done.fetch_add(1, Ordering::SeqCst);
                        Ok(1)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        caller.abort();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
