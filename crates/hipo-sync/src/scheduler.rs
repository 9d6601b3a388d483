//! Polling loops
//!
//! Each [`PollingLoop`] owns at most one background task. The task runs its
//! job, then sleeps for the normal interval (or the retry delay after a
//! transient failure) and runs again. Starting or triggering a loop replaces
//! its task, so a loop never has two timers. Every task carries the epoch it
//! was spawned under and stops touching the loop once the epoch moves on.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::SyncError;

/// Work done by one loop iteration
#[async_trait]
pub trait LoopJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<(), SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    /// Never started or stopped
    Idle,
    /// Waiting for the next run
    Scheduled,
    Running,
    /// Paused while the app is hidden or on a page without live data
    Suspended,
}

type ErrorHook = Arc<dyn Fn(&SyncError) + Send + Sync>;

struct Control {
    state: LoopState,
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

pub struct PollingLoop {
    job: Arc<dyn LoopJob>,
    interval: Duration,
    retry_delay: Duration,
    control: Mutex<Control>,
    on_transient: Option<ErrorHook>,
}

impl PollingLoop {
    pub fn new(job: Arc<dyn LoopJob>, interval: Duration, retry_delay: Duration) -> Self {
        Self {
            job,
            interval,
            retry_delay,
            control: Mutex::new(Control {
                state: LoopState::Idle,
                epoch: 0,
                task: None,
            }),
            on_transient: None,
        }
    }

    /// Called with every transient failure, before the retry is scheduled
    pub fn on_transient(mut self, hook: impl Fn(&SyncError) + Send + Sync + 'static) -> Self {
        self.on_transient = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> LoopState {
        self.control().state
    }

    /// Run now and keep running on the interval. Replaces any pending timer.
    pub fn trigger(self: &Arc<Self>) {
        let mut control = self.control();
        if let Some(task) = control.task.take() {
            task.abort();
        }
        control.epoch += 1;
        control.state = LoopState::Scheduled;
        let epoch = control.epoch;
        control.task = Some(tokio::spawn(self.clone().drive(epoch)));
    }

    /// Same as [`trigger`](Self::trigger); reads better at startup and resume
    pub fn start(self: &Arc<Self>) {
        self.trigger();
    }

    /// Cancel the pending run and mark the loop suspended
    pub fn suspend(&self) {
        self.halt(LoopState::Suspended);
    }

    /// Cancel the pending run and mark the loop idle
    pub fn stop(&self) {
        self.halt(LoopState::Idle);
    }

    fn halt(&self, state: LoopState) {
        let mut control = self.control();
        if let Some(task) = control.task.take() {
            task.abort();
        }
        control.epoch += 1;
        control.state = state;
        tracing::debug!(job = self.job.name(), ?state, "Loop halted");
    }

    /// Run the job once on the caller's task, outside the schedule
    pub async fn run_once(&self) -> Result<(), SyncError> {
        self.job.run().await
    }

    /// Move to `state` if `epoch` is still current
    fn advance(&self, epoch: u64, state: LoopState) -> bool {
        let mut control = self.control();
        if control.epoch != epoch {
            return false;
        }
        control.state = state;
        true
    }

    async fn drive(self: Arc<Self>, epoch: u64) {
        loop {
            if !self.advance(epoch, LoopState::Running) {
                return;
            }
            let result = self.job.run().await;
            if !self.advance(epoch, LoopState::Scheduled) {
                return;
            }

            let delay = match result {
                Ok(()) => self.interval,
                Err(e) if e.is_transient() => {
                    tracing::warn!(job = self.job.name(), error = %e, "Loop iteration failed, retrying");
                    if let Some(hook) = &self.on_transient {
                        hook(&e);
                    }
                    self.retry_delay
                }
                Err(e) => {
                    tracing::debug!(job = self.job.name(), reason = %e, "Loop iteration skipped");
                    self.interval
                }
            };
            tokio::time::sleep(delay).await;
        }
    }
}
