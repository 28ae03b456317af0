//! Resource State Polling
//!
//! Repeatedly fetches a piece of cluster state until a predicate holds, the
//! overall timeout elapses, or the caller cancels. The loop is iterative and
//! checks the deadline before every retry; each fetch is itself bounded by
//! the same deadline, so a poll never blocks past its timeout.

use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::error::TesterError;

/// Interval/timeout pair for one kind of wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollTiming {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollTiming {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Condition a poll waits for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetState {
    /// A pod matching the subject is in phase `Running`
    Running,
    /// The observed status string equals the given value
    Status(String),
    /// The subject exists
    Present,
    /// The subject no longer exists
    Absent,
}

impl Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetState::Running => f.write_str("Running"),
            TargetState::Status(status) => write!(f, "status {status}"),
            TargetState::Present => f.write_str("present"),
            TargetState::Absent => f.write_str("absent"),
        }
    }
}

/// Observed state that can be checked against a [`TargetState`]
pub trait Observation: Debug {
    fn satisfies(&self, target: &TargetState) -> bool;
}

/// Describes one wait operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollSpec {
    /// Namespace, name prefix or selector being watched (used in diagnostics)
    pub subject: String,
    pub target: TargetState,
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSpec {
    pub fn new(subject: impl Into<String>, target: TargetState, timing: PollTiming) -> Self {
        Self {
            subject: subject.into(),
            target,
            interval: timing.interval,
            timeout: timing.timeout,
        }
    }
}

/// Why a poll ended without the predicate holding
#[derive(Debug)]
pub enum PollError<S> {
    Timeout {
        subject: String,
        target: String,
        elapsed: Duration,
        attempts: u32,
        /// Last successfully fetched state
        last: Option<S>,
        /// Most recent fetch failure since that state
        last_error: Option<String>,
    },
    Cancelled {
        subject: String,
        last: Option<S>,
    },
}

impl<S: Debug> From<PollError<S>> for TesterError {
    fn from(err: PollError<S>) -> Self {
        match err {
            PollError::Timeout {
                subject,
                target,
                elapsed,
                last,
                last_error,
                ..
            } => {
                let last_state = match (last, last_error) {
                    (Some(state), None) => format!("{state:?}"),
                    (Some(state), Some(error)) => format!("{state:?} (then: {error})"),
                    (None, Some(error)) => format!("nothing (last error: {error})"),
                    (None, None) => "nothing".to_string(),
                };
                TesterError::PollTimeout {
                    subject,
                    target,
                    elapsed,
                    last_state,
                }
            }
            PollError::Cancelled { subject, .. } => TesterError::Cancelled { subject },
        }
    }
}

/// Polls cluster state under a deadline, interruptible through a token
#[derive(Clone, Debug, Default)]
pub struct ResourcePoller {
    cancel: CancellationToken,
}

impl ResourcePoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll under an externally owned cancellation token
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait until the state fetched for `spec` satisfies its target
    pub async fn poll<S, E, F, Fut>(&self, spec: &PollSpec, fetch: F) -> Result<S, PollError<S>>
    where
        S: Observation,
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
    {
        let target = spec.target.clone();
        self.poll_until(
            &spec.subject,
            &spec.target.to_string(),
            spec.interval,
            spec.timeout,
            fetch,
            move |state: &S| state.satisfies(&target),
        )
        .await
    }

    /// Fetch state until `predicate` holds.
    ///
    /// Fetch failures count as "not yet" and are retried within the same
    /// overall timeout. Returns the first state that satisfies the predicate.
    pub async fn poll_until<S, E, F, Fut, P>(
        &self,
        subject: &str,
        target: &str,
        interval: Duration,
        timeout: Duration,
        mut fetch: F,
        predicate: P,
    ) -> Result<S, PollError<S>>
    where
        S: Debug,
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        P: Fn(&S) -> bool,
    {
        let interval = interval.max(Duration::from_millis(1));
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts: u32 = 0;
        let mut last: Option<S> = None;
        let mut last_error: Option<String> = None;

        tracing::debug!("⏳ Waiting for {} to reach {} (every {:?}, max {:?})", subject, target, interval, timeout);

        loop {
            attempts += 1;

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!("🛑 Wait for {} cancelled after {} attempts", subject, attempts);
                    return Err(PollError::Cancelled { subject: subject.to_string(), last });
                }
                fetched = timeout_at(deadline, fetch()) => fetched,
            };

            match fetched {
                Ok(Ok(state)) => {
                    if predicate(&state) {
                        tracing::info!(
                            "✅ {} reached {} after {} attempts ({:?})",
                            subject,
                            target,
                            attempts,
                            started.elapsed()
                        );
                        return Ok(state);
                    }
                    tracing::debug!("🔍 {} not yet {}: {:?}", subject, target, state);
                    last = Some(state);
                    last_error = None;
                }
                Ok(Err(e)) => {
                    tracing::debug!("⚠️ Fetching {} failed (will retry): {}", subject, e);
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    last_error = Some("fetch did not complete before the deadline".to_string());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    "⏰ {} did not reach {} within {:?} ({} attempts), last observed: {:?}",
                    subject,
                    target,
                    timeout,
                    attempts,
                    last
                );
                return Err(PollError::Timeout {
                    subject: subject.to_string(),
                    target: target.to_string(),
                    elapsed: now - started,
                    attempts,
                    last,
                    last_error,
                });
            }

            let wake = (now + interval).min(deadline);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!("🛑 Wait for {} cancelled after {} attempts", subject, attempts);
                    return Err(PollError::Cancelled { subject: subject.to_string(), last });
                }
                _ = sleep_until(wake) => {}
            }
        }
    }
}
