//! Small helpers shared by the transport: log previews and Telegram retries.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use herbarium_bot::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retry a Telegram API operation with exponential backoff.
///
/// Used for sends and file downloads that may fail on transient network
/// errors:
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max attempts: 3 (see the constants in `config.rs`)
///
/// # Errors
///
/// Returns the last error if every attempt fails.
///
/// # Examples
///
/// ```no_run
/// use herbarium_bot::utils::retry_telegram_operation;
/// use anyhow::Result;
///
/// async fn download_file() -> Result<Vec<u8>> {
///     Ok(vec![])
/// }
///
/// # async fn example() -> Result<()> {
/// let buffer = retry_telegram_operation(|| async {
///     download_file().await
/// }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
        assert_eq!(truncate_str("🌿🌿🌿", 2), "🌿🌿");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() -> Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let value = retry_telegram_operation(|| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("connection reset");
                }
                Ok(7)
            }
        })
        .await?;

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: Result<()> = retry_telegram_operation(|| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("still down")
            }
        })
        .await;

        assert!(result.is_err());
        // First attempt plus one per delay in the strategy
        assert_eq!(calls.load(Ordering::SeqCst), 1 + crate::config::TELEGRAM_API_MAX_RETRIES);
    }
}
