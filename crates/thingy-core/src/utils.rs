/*!
 * Utility functions and helpers for the Thingy driver.
 */
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// Run a future with a timeout
///
/// # Arguments
///
/// * `duration` - The timeout duration
/// * `future` - The future to run
///
/// # Returns
///
/// The result of the future, or a timeout error if the timeout is reached
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout("Operation timed out")),
    }
}

/// Poll `probe` every `interval` until it yields a value, at most `attempts` times.
///
/// The probe runs immediately, so a value that is already available costs
/// no sleep. Waiting is bounded by `interval * (attempts - 1)`.
///
/// # Returns
///
/// The first value produced, or a timeout error once the attempts are spent
pub async fn poll_until<T, F>(interval: Duration, attempts: u32, mut probe: F) -> Result<T>
where
    F: FnMut() -> Option<T>,
{
    for attempt in 1..=attempts {
        if let Some(value) = probe() {
            if attempt > 1 {
                trace!("Poll satisfied after {} attempts", attempt);
            }
            return Ok(value);
        }
        if attempt < attempts {
            sleep(interval).await;
        }
    }

    Err(Error::timeout(format!(
        "Condition not met after {} polls at {:?}",
        attempts, interval
    )))
}

/// Create a task that runs in the background and logs any errors
///
/// # Arguments
///
/// * `handle` - The runtime to spawn onto
/// * `name` - A name for the task (for logging)
/// * `fut` - The future to run
pub fn spawn_and_log<F, T, E>(
    handle: &tokio::runtime::Handle,
    name: &str,
    fut: F,
) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let task_name = name.to_string();
    handle.spawn(async move {
        match fut.await {
            Ok(_) => {
                debug!("Task '{}' completed successfully", task_name);
            }
            Err(e) => {
                warn!("Task '{}' failed: {}", task_name, e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, Error>(42) }).await;
        assert_eq!(assert_ok!(result), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_failure() {
        let result = with_timeout(Duration::from_millis(10), async {
            sleep(Duration::from_millis(100)).await;
            Ok::<_, Error>(42)
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_immediate() {
        let start = tokio::time::Instant::now();
        let value = poll_until(Duration::from_millis(20), 250, || Some(5)).await.unwrap();
        assert_eq!(value, 5);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_eventually() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = calls.clone();
        let value = poll_until(Duration::from_millis(20), 250, move || {
            let n = probe_calls.fetch_add(1, Ordering::SeqCst) + 1;
            (n == 4).then_some(n)
        })
        .await
        .unwrap();
        assert_eq!(value, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out_within_bound() {
        let start = tokio::time::Instant::now();
        let result: Result<()> = poll_until(Duration::from_millis(20), 250, || None).await;
        assert!(matches!(assert_err!(result), Error::Timeout(_)));
        assert!(start.elapsed() <= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_spawn_and_log() {
        let handle = tokio::runtime::Handle::current();
        let task = spawn_and_log(&handle, "ok", async { Ok::<_, Error>(()) });
        task.await.unwrap();
        let task = spawn_and_log(&handle, "failing", async { Err::<(), _>(Error::other("boom")) });
        task.await.unwrap();
    }
}
