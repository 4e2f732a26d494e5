use crate::error::{CloudError, Result};
use deploy_core::defaults::LONG_RUNNING_OP_POLL_INTERVAL;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub enum OperationStatus {
    Running,
    Done { success: bool, error: Option<String> },
}

/// Sleep-poll loop at the spec's 3-5s cadence (spec.md §5) until the
/// operation reports done or `timeout` elapses. Shared by the build and
/// serverless collaborators (spec.md §4.4 stages 5 and 6: "polling
/// semantics identical to build").
pub async fn poll_until_done<F, Fut>(mut poll: F, timeout: Duration) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<OperationStatus>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match poll().await? {
            OperationStatus::Done { success: true, .. } => return Ok(()),
            OperationStatus::Done { success: false, error } => {
                return Err(CloudError::OperationFailed(error.unwrap_or_else(|| "operation failed".to_string())));
            }
            OperationStatus::Running => {
                if Instant::now() >= deadline {
                    return Err(CloudError::TimedOut("long-running operation".to_string()));
                }
                sleep(LONG_RUNNING_OP_POLL_INTERVAL).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_operation_reports_done() {
        let calls = AtomicUsize::new(0);
        let result = poll_until_done(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Ok(OperationStatus::Running)
                    } else {
                        Ok(OperationStatus::Done { success: true, error: None })
                    }
                }
            },
            Duration::from_secs(30),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn surfaces_operation_failure() {
        let result = poll_until_done(
            || async { Ok(OperationStatus::Done { success: false, error: Some("bad recipe".to_string()) }) },
            Duration::from_secs(30),
        )
        .await;
        assert!(matches!(result, Err(CloudError::OperationFailed(msg)) if msg == "bad recipe"));
    }
}
