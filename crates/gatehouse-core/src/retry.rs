// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded fixed-delay retry for outbound operations.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::GatehouseError;

/// Error returned when every attempt failed.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: GatehouseError,
}

/// Runs `op` up to `attempts` times (at least once), sleeping `delay`
/// between failures. A non-retryable error ends the loop at once.
pub async fn with_retries<T, F, Fut>(
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatehouseError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && e.is_retryable() => {
                debug!(attempt, max = attempts, error = %e, "attempt failed, retrying");
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retries(3, Duration::from_millis(500), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(GatehouseError::transport("flaky"))
                } else {
                    Ok("sent")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "sent");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_attempt_ceiling() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(3, Duration::from_millis(500), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatehouseError::transport("down")) }
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_is_returned_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(5, Duration::from_millis(500), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(GatehouseError::NotConnected {
                    tenant: "t-1".into(),
                })
            }
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(matches!(err.last_error, GatehouseError::NotConnected { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let _: Result<(), _> = with_retries(0, Duration::from_millis(10), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatehouseError::transport("down")) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
