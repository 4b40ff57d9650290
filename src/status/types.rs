use crate::error::CancelReason;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Node-local identity of one registered query instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatusId(pub u64);

/// What a caller asked for. The uuid is chosen by the caller and is not unique:
/// the same uuid may be registered more than once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryDescriptor {
    pub uuid: String,
    pub query: serde_json::Value,
    /// Stop merging once this many results were seen.
    pub minimum_number_of_results: u64,
    pub max_query_time_ms: u64,
    pub user: Option<String>,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            query: serde_json::Value::Null,
            minimum_number_of_results: u64::MAX,
            max_query_time_ms: 60_000,
            user: None,
        }
    }
}

impl QueryDescriptor {
    pub fn new(uuid: impl Into<String>, query: serde_json::Value) -> Self {
        Self {
            uuid: uuid.into(),
            query,
            ..Default::default()
        }
    }

    pub fn max_query_time(&self) -> Duration {
        Duration::from_millis(self.max_query_time_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Running,
    Complete,
    Interrupted,
    BackPressureInterrupted,
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Interrupted => Some(CancelReason::User),
            Self::BackPressureInterrupted => Some(CancelReason::BackPressure),
            Self::Running | Self::Complete => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Complete => 1,
            Self::Interrupted => 2,
            Self::BackPressureInterrupted => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Complete,
            2 => Self::Interrupted,
            3 => Self::BackPressureInterrupted,
            _ => Self::Running,
        }
    }
}

/// Live record of one running (or recently finished) query.
///
/// The state leaves `Running` exactly once; whichever of finish, cancel or
/// back-pressure stop gets there first wins, the others are no-ops.
#[derive(Debug)]
pub struct QueryStatus {
    id: StatusId,
    table: String,
    query: QueryDescriptor,
    running: Arc<AtomicBool>,
    state: AtomicU8,
    started_at_ms: u64,
    started: Instant,
    finished: Mutex<Option<Instant>>,
    cleanup_delay: Duration,
    changed: Notify,
}

impl QueryStatus {
    pub(crate) fn new(
        id: StatusId,
        table: &str,
        query: QueryDescriptor,
        running: Arc<AtomicBool>,
        cleanup_delay: Duration,
    ) -> Self {
        running.store(true, Ordering::SeqCst);
        Self {
            id,
            table: table.to_string(),
            query,
            running,
            state: AtomicU8::new(QueryState::Running.to_u8()),
            started_at_ms: now_ms(),
            started: Instant::now(),
            finished: Mutex::new(None),
            cleanup_delay,
            changed: Notify::new(),
        }
    }

    pub fn id(&self) -> StatusId {
        self.id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn uuid(&self) -> &str {
        &self.query.uuid
    }

    pub fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    pub fn state(&self) -> QueryState {
        QueryState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The flag shared with the query's own execution loop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.state().cancel_reason()
    }

    pub(crate) fn finish(&self) -> bool {
        self.transition(QueryState::Complete)
    }

    pub(crate) fn interrupt(&self) -> bool {
        self.transition(QueryState::Interrupted)
    }

    pub(crate) fn interrupt_for_back_pressure(&self) -> bool {
        self.transition(QueryState::BackPressureInterrupted)
    }

    fn transition(&self, to: QueryState) -> bool {
        if self
            .state
            .compare_exchange(
                QueryState::Running.to_u8(),
                to.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        self.running.store(false, Ordering::SeqCst);
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.changed.notify_waiters();
        true
    }

    /// Resolves once the query is cancelled. Never resolves for a query that
    /// completes normally.
    pub async fn cancelled(&self) -> CancelReason {
        loop {
            let notified = self.changed.notified();
            if let Some(reason) = self.cancel_reason() {
                return reason;
            }
            notified.await;
        }
    }

    pub fn finished_at(&self) -> Option<Instant> {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Finished for at least the cleanup delay.
    pub fn is_valid_for_cleanup(&self, now: Instant) -> bool {
        self.finished_at()
            .is_some_and(|finished| now.saturating_duration_since(finished) >= self.cleanup_delay)
    }

    pub fn snapshot(&self) -> QueryStatusSnapshot {
        let elapsed = match self.finished_at() {
            Some(finished) => finished.saturating_duration_since(self.started),
            None => self.started.elapsed(),
        };
        QueryStatusSnapshot {
            id: self.id,
            table: self.table.clone(),
            uuid: self.query.uuid.clone(),
            query: self.query.query.clone(),
            user: self.query.user.clone(),
            state: self.state(),
            running: self.is_running(),
            started_at_ms: self.started_at_ms,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Serializable view of a [`QueryStatus`] for the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryStatusSnapshot {
    pub id: StatusId,
    pub table: String,
    pub uuid: String,
    pub query: serde_json::Value,
    pub user: Option<String>,
    pub state: QueryState,
    pub running: bool,
    pub started_at_ms: u64,
    pub elapsed_ms: u64,
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
