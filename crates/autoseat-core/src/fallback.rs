//! Ordered "first success wins" execution of named strategies.
//!
//! Several seat operations can be carried out in more than one way (call a
//! setter inside the web app, click a control, hit the REST endpoint). Each
//! way is an [`Attempt`]; [`first_success`] runs them strictly in order and
//! stops at the first one that succeeds, so every strategy runs at most once.

use crate::error::{AutoseatError, Result};
use futures::future::BoxFuture;
use tracing::{debug, warn};

/// One named strategy. The future is lazy: nothing runs until it is awaited.
pub struct Attempt<'a, T> {
    pub name: &'static str,
    pub future: BoxFuture<'a, Result<T>>,
}

impl<'a, T> Attempt<'a, T> {
    pub fn new(name: &'static str, future: BoxFuture<'a, Result<T>>) -> Self {
        Self { name, future }
    }
}

/// Outcome of a ladder: which strategy won and what it returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Success<T> {
    pub via: &'static str,
    pub value: T,
}

/// Runs `attempts` in order and returns the first success.
///
/// A fatal error (see [`AutoseatError::is_fatal`]) aborts the ladder and is
/// returned as-is. When every attempt fails the result is
/// [`AutoseatError::FallbackExhausted`] listing each failure.
pub async fn first_success<T>(
    operation: &str,
    attempts: Vec<Attempt<'_, T>>,
) -> Result<Success<T>> {
    let mut failures = Vec::with_capacity(attempts.len());

    for attempt in attempts {
        debug!(operation, strategy = attempt.name, "Trying strategy");
        match attempt.future.await {
            Ok(value) => {
                if !failures.is_empty() {
                    debug!(
                        operation,
                        strategy = attempt.name,
                        failed_before = failures.len(),
                        "Fallback strategy succeeded"
                    );
                }
                return Ok(Success {
                    via: attempt.name,
                    value,
                });
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(operation, strategy = attempt.name, error = %e, "Strategy failed");
                failures.push((attempt.name.to_string(), e.to_string()));
            }
        }
    }

    Err(AutoseatError::FallbackExhausted {
        operation: operation.to_string(),
        attempts: failures,
    })
}
