//! Bounded retry combinator.
//!
//! Every retry loop of the pipeline goes through [`RetryBudget::run`], so no
//! loop can spin forever: the producer is invoked at most `max_attempts`
//! times per call, and the outcome says which way the loop ended.

use futures::future::LocalBoxFuture;
use tracing::{debug, warn};

/// Result of one attempt, as judged by the producer.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Finished successfully
    Done(T),
    /// Failed, worth trying again
    Retry(E),
    /// Failed in a way another attempt cannot fix
    Abort(E),
}

/// How a bounded retry loop ended.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success { value: T, attempts: u32 },
    ExhaustedRetries { attempts: u32, last_error: Option<E> },
    Aborted { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::ExhaustedRetries { attempts, .. }
            | Self::Aborted { attempts, .. } => *attempts,
        }
    }

    /// The value, if the loop succeeded.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Maximum number of consecutive attempts for one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
}

impl RetryBudget {
    /// A budget of `max_attempts`, never less than one.
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Drive `producer` until it succeeds, aborts or the budget runs out.
    ///
    /// The producer gets mutable access to `state` and the 1-based attempt
    /// number. A fresh call starts from a full budget.
    pub async fn run<S, T, E, F>(&self, state: &mut S, mut producer: F) -> RetryOutcome<T, E>
    where
        E: std::fmt::Display,
        F: for<'a> FnMut(&'a mut S, u32) -> LocalBoxFuture<'a, Attempt<T, E>>,
    {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match producer(state, attempt).await {
                Attempt::Done(value) => {
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Attempt::Retry(error) => {
                    debug!(attempt, max = self.max_attempts, %error, "attempt failed");
                    last_error = Some(error);
                }
                Attempt::Abort(error) => {
                    return RetryOutcome::Aborted {
                        error,
                        attempts: attempt,
                    };
                }
            }
        }
        warn!(attempts = self.max_attempts, "retry budget exhausted");
        RetryOutcome::ExhaustedRetries {
            attempts: self.max_attempts,
            last_error,
        }
    }
}
