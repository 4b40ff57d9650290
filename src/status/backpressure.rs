//! Back-pressure watcher: when the node's memory use crosses a threshold,
//! every running query is interrupted so the node can recover.

use super::registry::QueryStatusRegistry;
use crate::background::BackgroundTask;

use sysinfo::{Pid, System};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub trait MemoryProbe: Send + Sync {
    /// Bytes currently used by the process, when known.
    fn used_bytes(&self) -> Option<u64>;
}

/// Resident memory of the current process, as reported by `sysinfo`.
pub struct ProcessMemoryProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl Default for ProcessMemoryProbe {
    fn default() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Cannot resolve own pid, memory probe disabled: {}", e);
                None
            }
        };
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn used_bytes(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        if !system.refresh_process(pid) {
            return None;
        }
        system.process(pid).map(|process| process.memory())
    }
}

pub struct BackPressureWatcher {
    registry: Arc<QueryStatusRegistry>,
    probe: Arc<dyn MemoryProbe>,
    limit_bytes: u64,
    threshold: f64,
}

impl BackPressureWatcher {
    pub fn new(
        registry: Arc<QueryStatusRegistry>,
        probe: Arc<dyn MemoryProbe>,
        limit_bytes: u64,
        threshold: f64,
    ) -> Self {
        Self {
            registry,
            probe,
            limit_bytes: limit_bytes.max(1),
            threshold,
        }
    }

    /// One check. Returns the number of queries interrupted.
    pub fn check(&self) -> usize {
        let Some(used) = self.probe.used_bytes() else {
            tracing::debug!("Memory use unavailable, skipping back-pressure check");
            return 0;
        };

        let fraction = used as f64 / self.limit_bytes as f64;
        if fraction < self.threshold {
            return 0;
        }

        tracing::warn!(
            "Memory use at {:.1}% of {} bytes (threshold {:.1}%)",
            fraction * 100.0,
            self.limit_bytes,
            self.threshold * 100.0
        );
        self.registry.cancel_all_running()
    }

    pub fn start(self: Arc<Self>, period: Duration) -> BackgroundTask {
        BackgroundTask::spawn_periodic("back-pressure", period, move || {
            let watcher = self.clone();
            async move {
                watcher.check();
            }
        })
    }
}
