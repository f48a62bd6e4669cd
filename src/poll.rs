//! Waiting for remote work to finish.
//!
//! A poller repeatedly fetches the status of a resource and stops as soon as
//! the status is terminal: success returns it, failure becomes
//! [`Error::RemoteWorkFailed`], and running past the deadline becomes
//! [`Error::Timeout`].

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Default pause between two status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default deadline for a wait.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

/// How often to poll and for how long.
///
/// # Examples
///
/// ```
/// use jules_client::PollConfig;
/// use std::time::Duration;
///
/// let config = PollConfig::new(Duration::from_secs(2)).with_timeout(Duration::from_secs(60));
/// assert_eq!(config.timeout, Some(Duration::from_secs(60)));
///
/// // Waits until the remote work settles, however long that takes.
/// let forever = PollConfig::unbounded(Duration::from_secs(10));
/// assert!(forever.timeout.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between fetches.
    pub interval: Duration,
    /// Deadline measured from the first fetch; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }
}

impl PollConfig {
    /// Polls every `interval` with the default deadline.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Polls every `interval` without a deadline.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    /// Sets the deadline.
    ///
    /// A zero timeout does not disable the deadline: the wait gives up at the
    /// first non-terminal fetch made after any time has passed, in practice
    /// right after the first fetch. Use [`PollConfig::unbounded`] to wait
    /// without a deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// States of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollState {
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

/// What the polling loop does after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollStep {
    /// Return the observed status.
    Done,
    /// Sleep, then fetch again.
    Wait(Duration),
}

/// Transition logic shared by the async and blocking pollers.
#[derive(Debug)]
pub(crate) struct PollTracker<'a> {
    resource: &'a str,
    config: &'a PollConfig,
    state: PollState,
    polls: u32,
}

impl<'a> PollTracker<'a> {
    pub(crate) fn new(resource: &'a str, config: &'a PollConfig) -> Self {
        Self {
            resource,
            config,
            state: PollState::Polling,
            polls: 0,
        }
    }

    /// Applies one fetched status.
    ///
    /// Success wins over failure; the deadline is only checked for statuses
    /// that are neither.
    pub(crate) fn observe(
        &mut self,
        succeeded: bool,
        failed: bool,
        elapsed: Duration,
    ) -> Result<PollStep> {
        debug_assert_eq!(self.state, PollState::Polling, "poll already settled");
        self.polls += 1;

        if succeeded {
            self.state = PollState::Succeeded;
            tracing::info!(
                resource = self.resource,
                polls = self.polls,
                state = ?self.state,
                "Remote work completed"
            );
            return Ok(PollStep::Done);
        }

        if failed {
            self.state = PollState::Failed;
            tracing::warn!(
                resource = self.resource,
                polls = self.polls,
                state = ?self.state,
                "Remote work failed"
            );
            return Err(Error::RemoteWorkFailed {
                resource: self.resource.to_string(),
            });
        }

        if let Some(timeout) = self.config.timeout {
            if elapsed > timeout {
                self.state = PollState::TimedOut;
                tracing::warn!(
                    resource = self.resource,
                    polls = self.polls,
                    state = ?self.state,
                    timeout_secs = timeout.as_secs_f64(),
                    "Polling timed out"
                );
                return Err(Error::Timeout {
                    resource: self.resource.to_string(),
                    elapsed,
                });
            }
        }

        tracing::debug!(
            resource = self.resource,
            polls = self.polls,
            interval_ms = self.config.interval.as_millis() as u64,
            "Remote work still running"
        );
        Ok(PollStep::Wait(self.config.interval))
    }
}

/// Polls until the fetched status is terminal.
///
/// `resource` names what is being waited on (e.g. `"sessions/abc123"`) and is
/// carried by the failure and timeout errors. Errors from `fetch_status`
/// propagate unchanged.
///
/// # Examples
///
/// ```no_run
/// use jules_client::{poll_until_terminal, Client, PollConfig};
///
/// # async fn example() -> Result<(), jules_client::Error> {
/// let client = Client::builder().api_key("my-api-key").build()?;
///
/// let session = poll_until_terminal(
///     "sessions/abc123",
///     &PollConfig::default(),
///     || client.get("sessions/abc123"),
///     |s| s["state"] == "COMPLETED",
///     |s| s["state"] == "FAILED",
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn poll_until_terminal<S, F, Fut>(
    resource: &str,
    config: &PollConfig,
    mut fetch_status: F,
    is_success: impl Fn(&S) -> bool,
    is_failure: impl Fn(&S) -> bool,
) -> Result<S>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    let started = tokio::time::Instant::now();
    let mut tracker = PollTracker::new(resource, config);

    loop {
        let status = fetch_status().await?;
        match tracker.observe(is_success(&status), is_failure(&status), started.elapsed())? {
            PollStep::Done => return Ok(status),
            PollStep::Wait(interval) => tokio::time::sleep(interval).await,
        }
    }
}
