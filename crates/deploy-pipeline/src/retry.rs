use deploy_cloud::CloudError;
use tokio::time::sleep;

/// Exponential-backoff retry wrapper for stages 5 and 6 (spec.md §4.4:
/// "max 3, base 1 s"). Transient errors (the §4.3 network keyword list)
/// are retried; everything else fails immediately.
pub async fn with_retry<F, Fut, T>(
    max_attempts: u32,
    base_delay: std::time::Duration,
    mut operation: F,
) -> Result<T, CloudError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CloudError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < max_attempts && is_transient(&err) => {
                attempt += 1;
                let delay = base_delay * 2u32.pow(attempt - 1);
                tracing::warn!(attempt, error = %err, "transient stage error, retrying");
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_transient(err: &CloudError) -> bool {
    matches!(err, CloudError::Http(_) | CloudError::TimedOut(_)) && deploy_core::DeployError::is_transient_text(&err.to_string())
}
