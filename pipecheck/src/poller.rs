//! Pipeline run poller.
//!
//! Triggers a remote pipeline run and waits for it to reach a terminal
//! status under bounded time: a fixed polling interval, a monotonic
//! wall-clock deadline, and an external cancellation token checked on every
//! tick. On success the caller receives a fully realized, terminal stage
//! tree, never a partially populated one.

use crate::cancellation::CancellationToken;
use crate::clients::{CiServer, TriggerRequest};
use crate::errors::{HarnessError, TimeoutError, TransportError, TriggerError};
use crate::trace::{RunHandle, StageTree};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Timing and failure-tolerance configuration for the polling loop.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed interval between status polls.
    pub interval: Duration,
    /// Maximum wall-clock time to wait for a terminal status.
    pub timeout: Duration,
    /// Consecutive polling I/O failures tolerated before giving up.
    pub max_transport_failures: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
            max_transport_failures: 3,
        }
    }
}

impl PollerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the maximum wall-clock wait.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the consecutive transport-failure threshold.
    #[must_use]
    pub fn with_max_transport_failures(mut self, max: u32) -> Self {
        self.max_transport_failures = max;
        self
    }
}

/// Triggers pipeline runs and awaits their terminal stage trees.
pub struct PipelineRunPoller {
    ci: Arc<dyn CiServer>,
    config: PollerConfig,
    cancel: Arc<CancellationToken>,
}

impl PipelineRunPoller {
    /// Creates a poller over the given CI server.
    #[must_use]
    pub fn new(ci: Arc<dyn CiServer>, config: PollerConfig) -> Self {
        Self { ci, config, cancel: CancellationToken::new() }
    }

    /// Attaches an external cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Triggers a run and awaits its terminal stage tree.
    ///
    /// # Errors
    ///
    /// [`TriggerError`] when the remote engine rejects the trigger,
    /// [`TimeoutError`] when the run does not reach a terminal status within
    /// the configured timeout, [`TransportError`] after repeated polling I/O
    /// failures, and [`HarnessError::Cancelled`] when the cancellation token
    /// fires.
    pub async fn trigger_and_await(
        &self,
        request: &TriggerRequest,
    ) -> Result<StageTree, HarnessError> {
        let (tree, _) = self.trigger_and_await_with_run(request).await?;
        Ok(tree)
    }

    /// Like [`Self::trigger_and_await`], additionally returning the run
    /// handle needed by downstream phases.
    ///
    /// # Errors
    ///
    /// See [`Self::trigger_and_await`].
    pub async fn trigger_and_await_with_run(
        &self,
        request: &TriggerRequest,
    ) -> Result<(StageTree, RunHandle), HarnessError> {
        let run = self
            .ci
            .trigger(request)
            .await
            .map_err(|err| TriggerError::new(&request.job_name, err.to_string()))?;
        info!(job = %request.job_name, run = %run, "pipeline run triggered");

        let deadline = Instant::now() + self.config.timeout;
        let mut consecutive_failures = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                let reason = self.cancel.reason().unwrap_or_else(|| "no reason given".to_string());
                return Err(HarnessError::Cancelled(reason));
            }
            if Instant::now() >= deadline {
                return Err(TimeoutError::new(&request.job_name, self.config.timeout).into());
            }

            match self.ci.run_status(&run).await {
                Ok(status) if status.is_terminal() => {
                    info!(run = %run, %status, "run reached terminal status");
                    let tree = self.ci.stage_tree(&run).await.map_err(|err| {
                        TransportError::new(&request.job_name, 1, err.to_string())
                    })?;
                    return Ok((tree, run));
                }
                Ok(status) => {
                    consecutive_failures = 0;
                    debug!(run = %run, %status, "run still in progress");
                }
                Err(err) => {
                    consecutive_failures += 1;
                    warn!(
                        run = %run,
                        failures = consecutive_failures,
                        error = %err,
                        "status poll failed"
                    );
                    if consecutive_failures >= self.config.max_transport_failures {
                        return Err(TransportError::new(
                            &request.job_name,
                            consecutive_failures,
                            err.to_string(),
                        )
                        .into());
                    }
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockCiServer;
    use crate::errors::ClientError;
    use crate::trace::{RunStatus, StageNode, StageStatus};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request() -> TriggerRequest {
        TriggerRequest::new(
            "unitt-docgen",
            "proj",
            "master",
            "proj",
            "Jenkinsfile",
            "proj-cd",
        )
    }

    fn short_config() -> PollerConfig {
        PollerConfig::new()
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(60))
    }

    fn terminal_tree() -> StageTree {
        StageTree::new(vec![StageNode::new("Checkout", StageStatus::Success)])
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_tree_once_run_is_terminal() {
        let mut ci = MockCiServer::new();
        ci.expect_trigger()
            .times(1)
            .returning(|req| Ok(RunHandle::new(&req.job_name, "7")));
        let polls = AtomicU32::new(0);
        ci.expect_run_status().returning(move |_| {
            if polls.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(RunStatus::Running)
            } else {
                Ok(RunStatus::Success)
            }
        });
        ci.expect_stage_tree().times(1).returning(|_| Ok(terminal_tree()));

        let poller = PipelineRunPoller::new(Arc::new(ci), short_config());
        let (tree, run) = poller.trigger_and_await_with_run(&request()).await.unwrap();
        assert_eq!(tree, terminal_tree());
        assert_eq!(run, RunHandle::new("unitt-docgen", "7"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_run_never_terminal() {
        let mut ci = MockCiServer::new();
        ci.expect_trigger()
            .returning(|req| Ok(RunHandle::new(&req.job_name, "8")));
        ci.expect_run_status().returning(|_| Ok(RunStatus::Running));
        // The stage tree must never be fetched on timeout.
        ci.expect_stage_tree().never();

        let poller = PipelineRunPoller::new(Arc::new(ci), short_config());
        let err = poller.trigger_and_await(&request()).await.unwrap_err();
        assert!(matches!(err, HarnessError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_rejection_is_trigger_error() {
        let mut ci = MockCiServer::new();
        ci.expect_trigger()
            .returning(|_| Err(ClientError::rejected("job not found")));
        ci.expect_run_status().never();

        let poller = PipelineRunPoller::new(Arc::new(ci), short_config());
        let err = poller.trigger_and_await(&request()).await.unwrap_err();
        match err {
            HarnessError::Trigger(trigger) => {
                assert_eq!(trigger.job, "unitt-docgen");
                assert!(trigger.reason.contains("job not found"));
            }
            other => panic!("expected trigger error, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_poll_failures_become_transport_error() {
        let mut ci = MockCiServer::new();
        ci.expect_trigger()
            .returning(|req| Ok(RunHandle::new(&req.job_name, "9")));
        ci.expect_run_status()
            .returning(|_| Err(ClientError::transport("connection reset")));

        let poller = PipelineRunPoller::new(Arc::new(ci), short_config());
        let err = poller.trigger_and_await(&request()).await.unwrap_err();
        match err {
            HarnessError::Transport(transport) => {
                assert_eq!(transport.attempts, 3);
                assert!(transport.detail.contains("connection reset"));
            }
            other => panic!("expected transport error, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_poll_resets_failure_counter() {
        let mut ci = MockCiServer::new();
        ci.expect_trigger()
            .returning(|req| Ok(RunHandle::new(&req.job_name, "10")));
        let polls = AtomicU32::new(0);
        // Two failures, a good "running" poll, two more failures, then done.
        // Never three in a row, so the threshold must not fire.
        ci.expect_run_status().returning(move |_| {
            match polls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 | 3 | 4 => Err(ClientError::transport("blip")),
                2 => Ok(RunStatus::Running),
                _ => Ok(RunStatus::Unstable),
            }
        });
        ci.expect_stage_tree().returning(|_| Ok(terminal_tree()));

        let poller = PipelineRunPoller::new(Arc::new(ci), short_config());
        assert!(poller.trigger_and_await(&request()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_surfaces_reason() {
        let mut ci = MockCiServer::new();
        ci.expect_trigger()
            .returning(|req| Ok(RunHandle::new(&req.job_name, "11")));
        ci.expect_run_status().never();

        let cancel = CancellationToken::new();
        cancel.cancel("external deadline");
        let poller =
            PipelineRunPoller::new(Arc::new(ci), short_config()).with_cancellation(cancel);

        let err = poller.trigger_and_await(&request()).await.unwrap_err();
        match err {
            HarnessError::Cancelled(reason) => assert_eq!(reason, "external deadline"),
            other => panic!("expected cancellation, got {other}"),
        }
    }
}
