//! Query Status Registry
//!
//! Node-wide table of the queries this node is coordinating, keyed by a
//! node-local id. Finished entries linger for a grace period so that clients
//! polling for status still find them, then a periodic sweep removes them.

use super::types::{QueryDescriptor, QueryStatus, StatusId};
use crate::background::BackgroundTask;
use crate::config::StatusConfig;

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;

pub struct QueryStatusRegistry {
    statuses: DashMap<StatusId, Arc<QueryStatus>>,
    next_id: AtomicU64,
    config: StatusConfig,
    cleanup: Mutex<Option<BackgroundTask>>,
}

impl QueryStatusRegistry {
    pub fn new(config: StatusConfig) -> Arc<Self> {
        Arc::new(Self {
            statuses: DashMap::new(),
            next_id: AtomicU64::new(1),
            config,
            cleanup: Mutex::new(None),
        })
    }

    /// Starts the periodic cleanup sweep. The sweep holds only a weak
    /// reference, so dropping the registry ends it.
    pub fn start(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let task = BackgroundTask::spawn_periodic(
            "query-status-cleanup",
            self.config.cleanup_interval(),
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(registry) = weak.upgrade() {
                        registry.cleanup_finished();
                    }
                }
            },
        );

        let previous = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if previous.is_some() {
            tracing::warn!("Query status cleanup restarted");
        }
    }

    pub async fn shutdown(&self) {
        let task = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.shutdown().await;
        }
    }

    /// Records a new running query. `running` is the flag the query's own
    /// execution watches; it is set now and cleared on any terminal transition.
    pub fn register(
        &self,
        table: &str,
        query: QueryDescriptor,
        running: Arc<AtomicBool>,
    ) -> Arc<QueryStatus> {
        let id = StatusId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let status = Arc::new(QueryStatus::new(
            id,
            table,
            query,
            running,
            self.config.cleanup_delay(),
        ));
        self.statuses.insert(id, status.clone());
        tracing::debug!(
            "Registered query [{}] on table [{}] as {:?}",
            status.uuid(),
            table,
            id
        );
        status
    }

    /// Moves the query to `Complete` unless it was already cancelled.
    pub fn mark_finished(&self, status: &QueryStatus) {
        if status.finish() {
            tracing::debug!("Query [{}] finished", status.uuid());
        }
    }

    /// Interrupts every running query with this table and uuid. Returns how
    /// many were interrupted; already finished ones are left alone.
    pub fn cancel(&self, table: &str, uuid: &str) -> usize {
        let mut cancelled = 0;
        for entry in self.statuses.iter() {
            let status = entry.value();
            if status.table() == table && status.uuid() == uuid && status.interrupt() {
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::info!("Cancelled {} instances of query [{}] on [{}]", cancelled, uuid, table);
        }
        cancelled
    }

    pub fn list(&self, table: &str) -> Vec<Arc<QueryStatus>> {
        let mut statuses: Vec<_> = self
            .statuses
            .iter()
            .filter(|entry| entry.value().table() == table)
            .map(|entry| entry.value().clone())
            .collect();
        statuses.sort_by_key(|status| status.id());
        statuses
    }

    /// Any status with this table and uuid. The uuid is not unique; when more
    /// than one matches, the earliest registered is returned.
    pub fn get(&self, table: &str, uuid: &str) -> Option<Arc<QueryStatus>> {
        self.statuses
            .iter()
            .filter(|entry| entry.value().table() == table && entry.value().uuid() == uuid)
            .min_by_key(|entry| *entry.key())
            .map(|entry| entry.value().clone())
    }

    /// Distinct uuids known for a table, sorted.
    pub fn list_ids(&self, table: &str) -> Vec<String> {
        self.statuses
            .iter()
            .filter(|entry| entry.value().table() == table)
            .map(|entry| entry.value().uuid().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Interrupts every running query on the node with a back-pressure reason.
    pub fn cancel_all_running(&self) -> usize {
        tracing::warn!("Stopping all queries for back pressure.");
        let mut cancelled = 0;
        for entry in self.statuses.iter() {
            if entry.value().interrupt_for_back_pressure() {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Removes statuses that finished at least the cleanup delay ago.
    pub fn cleanup_finished(&self) -> usize {
        let now = Instant::now();
        let before = self.statuses.len();
        tracing::debug!("Running query status cleanup, {} entries", before);

        self.statuses
            .retain(|_, status| !status.is_valid_for_cleanup(now));

        let removed = before.saturating_sub(self.statuses.len());
        tracing::debug!("Query status cleanup removed {} entries", removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|entry| entry.value().is_running())
            .count()
    }
}
