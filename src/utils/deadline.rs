//! Deadlines for store operations.

use std::future::Future;
use std::time::Duration;

use serde_json::json;

use crate::error::AppError;

/// Runs `fut` with an upper bound of `limit`.
///
/// # Errors
///
/// Returns [`AppError::Timeout`] naming `operation` when the deadline passes,
/// or the operation's own error converted into [`AppError`].
pub async fn with_deadline<T, E, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AppError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(AppError::timeout(
            "Operation exceeded its deadline",
            json!({ "operation": operation, "deadline_ms": limit.as_millis() as u64 }),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let result: Result<(), AppError> = with_deadline(
            Duration::from_millis(10),
            "slow",
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<(), AppError>(())
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_inner_error_is_converted() {
        let result: Result<(), AppError> =
            with_deadline(Duration::from_secs(1), "fails", async {
                Err::<(), sqlx::Error>(sqlx::Error::PoolTimedOut)
            })
            .await;

        assert!(matches!(result, Err(AppError::Unavailable { .. })));
    }
}
