use std::future::Future;
use std::time::Duration;

use log::warn;

use super::LciDataError;

/// Classification for retry policy.
///
/// | Class | Retry same source? | Try another source? |
/// |-------|--------------------|---------------------|
/// | `Never` | No | No |
/// | `WithBackoff` | Yes, after a delay | Yes |
/// | `NextProvider` | No | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Terminal failure: missing configuration, unknown dataset, bad
    /// credentials or an unreadable document.
    Never,

    /// Transient failure such as a timeout, rate limit or dropped
    /// connection.
    WithBackoff,

    /// This source cannot serve the request but another one might.
    NextProvider,
}

/// Runs `attempt` until it succeeds, fails with an error that is not
/// [`RetryClass::WithBackoff`], or `max_retries` retries are spent. The delay
/// doubles after every retry.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    label: &str,
    max_retries: u32,
    backoff: Duration,
    mut attempt: F,
) -> Result<T, LciDataError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LciDataError>>,
{
    let mut delay = backoff;
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(e) if e.retry_class() == RetryClass::WithBackoff && retries < max_retries => {
                retries += 1;
                warn!(
                    "{} failed ({}); retry {}/{} in {:?}",
                    label, e, retries, max_retries, delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            result => return result,
        }
    }
}
