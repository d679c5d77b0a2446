//! Scheduled regeneration retries.
//!
//! A failed sync does not arm an opaque timer. It records a [`ScheduledRetry`]
//! in the [`RetryQueue`], which anyone holding the queue can inspect or
//! cancel. [`RetryQueue::drive`] runs an operation until it succeeds, the
//! attempt budget is spent, or the pending record is cancelled or replaced
//! by someone else.
//!
//! # Retry Strategy
//!
//! - At most `max_attempts` attempts in total (3 by default)
//! - Fixed spacing of `interval` between attempts (5 minutes by default)
//! - Random jitter (0-250ms) added to each wait
//! - Cancelling the pending record cuts the wait short

use crate::config::PipelineConfig;
use chrono::{DateTime, NaiveDate, Utc};
use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::time::{Duration as StdDuration, Instant};
use tokio::sync::{Mutex, Notify};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: StdDuration,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        RetryPolicy {
            max_attempts: config.retry.max_attempts,
            interval: config.retry_interval(),
        }
    }
}

/// The one pending retry, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRetry {
    /// Date the retried run generates for.
    pub date: NaiveDate,
    /// Number of the attempt that will run next, starting at 2.
    pub attempt: u32,
    pub max_attempts: u32,
    pub next_eligible_at: DateTime<Utc>,
    pub last_error: String,
}

/// How [`RetryQueue::drive`] ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { error: E, attempts: u32 },
    /// The pending record was cancelled or replaced while waiting.
    Superseded { error: E, attempts: u32 },
}

pub struct RetryQueue {
    policy: RetryPolicy,
    slot: Mutex<Option<ScheduledRetry>>,
    /// Wakes a `drive` waiting out its interval when the record is cancelled.
    cancelled: Notify,
}

impl fmt::Debug for RetryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryQueue")
            .field("max_attempts", &self.policy.max_attempts)
            .field("interval", &self.policy.interval)
            .finish()
    }
}

impl RetryQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        RetryQueue {
            policy,
            slot: Mutex::new(None),
            cancelled: Notify::new(),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn pending(&self) -> Option<ScheduledRetry> {
        self.slot.lock().await.clone()
    }

    /// Drop the pending retry, returning it.
    pub async fn cancel(&self) -> Option<ScheduledRetry> {
        let taken = self.slot.lock().await.take();
        if let Some(r) = &taken {
            self.cancelled.notify_waiters();
            info!(date = %r.date, attempt = r.attempt, "Cancelled pending retry");
        }
        taken
    }

    /// Record that `failed_attempt` failed and schedule the next one.
    ///
    /// Returns `None` (and clears the slot) once the budget is spent.
    pub async fn schedule(
        &self,
        date: NaiveDate,
        failed_attempt: u32,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<ScheduledRetry> {
        let mut slot = self.slot.lock().await;
        if failed_attempt >= self.policy.max_attempts {
            *slot = None;
            return None;
        }
        let interval = chrono::Duration::from_std(self.policy.interval)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let next = ScheduledRetry {
            date,
            attempt: failed_attempt + 1,
            max_attempts: self.policy.max_attempts,
            next_eligible_at: now + interval,
            last_error: error.into(),
        };
        *slot = Some(next.clone());
        Some(next)
    }

    async fn still_pending(&self, expected: &ScheduledRetry) -> bool {
        self.slot.lock().await.as_ref() == Some(expected)
    }

    async fn clear_if(&self, expected: &ScheduledRetry) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref() == Some(expected) {
            *slot = None;
        }
    }

    /// Run `op` with the queue's budget and spacing.
    ///
    /// `op` receives the 1-based attempt number. Between attempts the pending
    /// record is visible through [`Self::pending`]; cancelling it stops the loop
    /// before the next attempt runs.
    #[instrument(level = "info", skip_all, fields(%date))]
    pub async fn drive<T, E, F, Fut>(&self, date: NaiveDate, mut op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let total_t0 = Instant::now();
        let mut attempt = 1u32;

        loop {
            let attempt_t0 = Instant::now();
            let error = match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempt, "Retry succeeded");
                    }
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                }
                Err(e) => e,
            };

            let Some(scheduled) = self
                .schedule(date, attempt, error.to_string(), Utc::now())
                .await
            else {
                error!(
                    attempt,
                    max = self.policy.max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis(),
                    error = %error,
                    "Sync exhausted retries"
                );
                return RetryOutcome::Exhausted {
                    error,
                    attempts: attempt,
                };
            };

            let jitter_ms: u64 = rng().random_range(0..=250);
            let delay = self.policy.interval + StdDuration::from_millis(jitter_ms);
            warn!(
                attempt,
                max = self.policy.max_attempts,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                next_eligible_at = %scheduled.next_eligible_at,
                ?delay,
                error = %error,
                "Sync attempt failed; retry scheduled"
            );
            let woken = self.cancelled.notified();
            tokio::pin!(woken);
            woken.as_mut().enable();
            if self.still_pending(&scheduled).await {
                tokio::select! {
                    () = sleep(delay) => {}
                    () = woken => debug!(attempt, "Woken early by cancellation"),
                }
            }

            if !self.still_pending(&scheduled).await {
                info!(attempt, "Pending retry was cancelled or replaced; stopping");
                return RetryOutcome::Superseded {
                    error,
                    attempts: attempt,
                };
            }
            self.clear_if(&scheduled).await;
            attempt = scheduled.attempt;
        }
    }
}
