/// Deadline wrapper for calls to external delivery providers
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("operation timed out after {0:?}")]
    Elapsed(Duration),
    #[error(transparent)]
    Inner(E),
}

impl<E> TimeoutError<E> {
    pub fn is_elapsed(&self) -> bool {
        matches!(self, TimeoutError::Elapsed(_))
    }
}

/// Run a fallible future under a deadline, keeping its own error type
pub async fn with_deadline<F, T, E>(duration: Duration, future: F) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TimeoutError::Inner(e)),
        Err(_) => Err(TimeoutError::Elapsed(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_in_time() {
        let result = with_deadline(Duration::from_secs(1), async { Ok::<_, String>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed() {
        let result = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, String>(7)
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_elapsed());
    }

    #[tokio::test]
    async fn test_inner_error_is_preserved() {
        let result =
            with_deadline(Duration::from_secs(1), async { Err::<i32, _>("rejected") }).await;
        assert!(matches!(result, Err(TimeoutError::Inner("rejected"))));
    }
}
