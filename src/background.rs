//! Background Tasks
//!
//! A periodic job with an explicit lifecycle: spawned with a period, ticked on a
//! tokio interval, stopped with [`BackgroundTask::shutdown`]. Dropping the handle
//! without a shutdown aborts the job.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub struct BackgroundTask {
    name: String,
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

/// Shortest period a task ticks at; a zero period is raised to this.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

impl BackgroundTask {
    /// Runs `tick` every `period`, first after one full period has elapsed.
    pub fn spawn_periodic<F, Fut>(name: &str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period < MIN_PERIOD {
            tracing::warn!("Background task [{}] period {:?} raised to {:?}", name, period, MIN_PERIOD);
        }
        let period = period.max(MIN_PERIOD);
        let (stop, mut stopped) = watch::channel(false);
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => tick().await,
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Background task [{}] stopped", task_name);
        });

        tracing::info!("Background task [{}] started (every {:?})", name, period);

        Self {
            name: name.to_string(),
            stop,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    /// Signals the loop to stop and waits for the current tick to finish.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!("Background task [{}] ended abnormally: {}", self.name, e);
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
