//! Call timing for the exposed executor operations.
//!
//! Each instrumented operation wraps its body in [`CallMetrics::time`], so the
//! timing contract is visible where the operation is defined.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Default)]
pub struct MethodCall {
    invokes: AtomicU64,
    failures: AtomicU64,
    total_nanos: AtomicU64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MethodCallSnapshot {
    pub name: String,
    pub invokes: u64,
    pub failures: u64,
    pub average_micros: f64,
}

#[derive(Default)]
pub struct CallMetrics {
    calls: DashMap<&'static str, Arc<MethodCall>>,
}

impl CallMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Awaits `fut`, recording its duration and whether it returned an error.
    pub async fn time<T, E, F>(&self, name: &'static str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.record(name, start.elapsed().as_nanos() as u64, result.is_err());
        result
    }

    /// Times a synchronous operation.
    pub fn time_sync<T, E>(&self, name: &'static str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed().as_nanos() as u64, result.is_err());
        result
    }

    fn record(&self, name: &'static str, nanos: u64, failed: bool) {
        let call = self.calls.entry(name).or_default().value().clone();
        call.invokes.fetch_add(1, Ordering::Relaxed);
        call.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        if failed {
            call.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> Vec<MethodCallSnapshot> {
        let mut snapshot: Vec<MethodCallSnapshot> = self
            .calls
            .iter()
            .map(|entry| {
                let invokes = entry.value().invokes.load(Ordering::Relaxed);
                let total = entry.value().total_nanos.load(Ordering::Relaxed);
                MethodCallSnapshot {
                    name: entry.key().to_string(),
                    invokes,
                    failures: entry.value().failures.load(Ordering::Relaxed),
                    average_micros: if invokes == 0 {
                        0.0
                    } else {
                        total as f64 / invokes as f64 / 1_000.0
                    },
                }
            })
            .collect();
        snapshot.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot
    }

    pub fn invokes(&self, name: &str) -> u64 {
        self.calls
            .get(name)
            .map(|call| call.invokes.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_time_records_invokes_and_failures() {
        let metrics = CallMetrics::new();

        let ok: Result<u32, String> = metrics.time("lookup", async { Ok(1) }).await;
        let err: Result<u32, String> = metrics.time("lookup", async { Err("boom".to_string()) }).await;

        assert_eq!(ok, Ok(1));
        assert!(err.is_err());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "lookup");
        assert_eq!(snapshot[0].invokes, 2);
        assert_eq!(snapshot[0].failures, 1);
    }

    #[test]
    fn test_snapshot_sorted_by_name() {
        let metrics = CallMetrics::new();

        let _ = metrics.time_sync("zeta", || Ok::<_, ()>(()));
        let _ = metrics.time_sync("alpha", || Ok::<_, ()>(()));

        let names: Vec<_> = metrics.snapshot().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(metrics.invokes("alpha"), 1);
        assert_eq!(metrics.invokes("never"), 0);
    }
}
