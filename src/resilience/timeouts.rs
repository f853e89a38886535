//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap each downstream attempt with its route's deadline
//! - Cancel the attempt cleanly on expiry
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; dropping the future abandons the
//!   in-flight request without assuming the remote side stops working on it
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The attempt did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attempt exceeded its {}ms deadline", .0.as_millis())]
pub struct DeadlineExceeded(pub Duration);

/// Run `future` with a deadline.
pub async fn with_deadline<F: Future>(
    deadline: Duration,
    future: F,
) -> Result<F::Output, DeadlineExceeded> {
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| DeadlineExceeded(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let result = with_deadline(Duration::from_millis(1500), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        })
        .await;

        assert_eq!(result, Err(DeadlineExceeded(Duration::from_millis(1500))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_in_time() {
        let result = with_deadline(Duration::from_millis(1500), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
