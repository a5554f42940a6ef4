//! Polling of feedback report generation.
//!
//! Ending an interview queues report generation on the backend. The
//! [`FeedbackPoller`] asks for its status on a fixed interval until the
//! report is ready or generation failed. At most one polling task exists
//! per poller; starting again replaces the previous task, and dropping the
//! poller stops it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{ClientError, InterviewClient};
use crate::model::{FeedbackResponse, FeedbackStatus};

/// Where feedback status comes from.
#[async_trait]
pub trait FeedbackSource: Send + Sync {
    async fn feedback_status(&self, session_id: u64) -> Result<FeedbackStatus, ClientError>;

    /// Synchronously generated feedback, used when no report job exists.
    async fn feedback(&self, session_id: u64) -> Result<FeedbackResponse, ClientError>;
}

#[async_trait]
impl FeedbackSource for InterviewClient {
    async fn feedback_status(&self, session_id: u64) -> Result<FeedbackStatus, ClientError> {
        InterviewClient::feedback_status(self, session_id).await
    }

    async fn feedback(&self, session_id: u64) -> Result<FeedbackResponse, ClientError> {
        InterviewClient::feedback(self, session_id).await
    }
}

/// A finished feedback report.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackReport {
    /// Report produced by the background job.
    Generated(Value),
    /// Report from the direct feedback endpoint.
    Direct(FeedbackResponse),
}

/// What the poller observed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackUpdate {
    Progress { status: String, progress: u8 },
    Completed(FeedbackReport),
    Failed(String),
}

impl FeedbackUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FeedbackUpdate::Progress { .. })
    }
}

/// One status check.
pub async fn poll_once<S: FeedbackSource + ?Sized>(source: &S, session_id: u64) -> FeedbackUpdate {
    let status = match source.feedback_status(session_id).await {
        Ok(status) => status,
        Err(e) => return FeedbackUpdate::Failed(format!("could not check feedback status: {e}")),
    };

    match (status.status.as_str(), status.report) {
        (FeedbackStatus::COMPLETED, Some(report)) => FeedbackUpdate::Completed(FeedbackReport::Generated(report)),
        (FeedbackStatus::FAILED, _) => FeedbackUpdate::Failed(
            status
                .error
                .unwrap_or_else(|| "feedback generation failed".to_string()),
        ),
        (FeedbackStatus::NOT_FOUND, _) | (FeedbackStatus::COMPLETED, None) => {
            debug!(session_id, "no report job result, requesting feedback directly");
            match source.feedback(session_id).await {
                Ok(feedback) => FeedbackUpdate::Completed(FeedbackReport::Direct(feedback)),
                Err(e) => FeedbackUpdate::Failed(format!("could not load feedback: {e}")),
            }
        }
        (other, _) => FeedbackUpdate::Progress {
            status: other.to_string(),
            progress: status.progress,
        },
    }
}

/// Owns at most one repeating feedback status task.
#[derive(Debug)]
pub struct FeedbackPoller {
    interval: Duration,
    task: Option<(CancellationToken, JoinHandle<()>)>,
}

impl Default for FeedbackPoller {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl FeedbackPoller {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    pub fn new(interval: Duration) -> Self {
        Self { interval, task: None }
    }

    /// Start polling `session_id`, replacing any running task.
    ///
    /// The first check happens immediately. `on_update` is called after
    /// every check. After [`stop`](Self::stop) no new call starts, except one
    /// that was already executing; [`shutdown`](Self::shutdown) also waits
    /// for that one.
    pub fn start<S, F>(&mut self, source: Arc<S>, session_id: u64, mut on_update: F)
    where
        S: FeedbackSource + ?Sized + 'static,
        F: FnMut(FeedbackUpdate) + Send + 'static,
    {
        self.stop();

        let token = CancellationToken::new();
        let task_token = token.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let update = tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    update = poll_once(&*source, session_id) => update,
                };

                if task_token.is_cancelled() {
                    break;
                }

                let terminal = update.is_terminal();
                if let FeedbackUpdate::Failed(reason) = &update {
                    warn!(session_id, %reason, "feedback polling stopped");
                }
                on_update(update);

                if terminal {
                    break;
                }
            }
        });

        self.task = Some((token, handle));
    }

    /// Stop the running task, if any, without waiting for it.
    pub fn stop(&mut self) {
        if let Some((token, _handle)) = self.task.take() {
            token.cancel();
        }
    }

    /// Stop the running task and wait until it has exited.
    ///
    /// Once this returns, `on_update` is not running and will not be called
    /// again.
    pub async fn shutdown(&mut self) {
        if let Some((token, handle)) = self.task.take() {
            token.cancel();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!(error = %e, "feedback polling task panicked");
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|(token, handle)| !token.is_cancelled() && !handle.is_finished())
    }
}

impl Drop for FeedbackPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
