//! Timeout and bounded retry around provider calls

use std::future::Future;
use tokio::time::{sleep, timeout};

use crate::config::CallPolicy;
use crate::error::{Error, Result};

/// Run `call` under `policy`
///
/// Each attempt is bounded by the policy timeout. Transient failures (see
/// [`Error::is_transient`]) are retried up to `max_retries` times with exponential backoff;
/// anything else is returned immediately.
pub async fn with_policy<F, Fut, T>(policy: &CallPolicy, operation: &str, call: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        let result = match timeout(policy.timeout(), call()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: operation.to_string(),
                secs: policy.timeout_secs,
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation,
                    attempt + 1,
                    policy.max_retries + 1,
                    delay,
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
