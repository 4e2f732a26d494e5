use deploy_core::defaults::{HEALTH_BACKOFF_BASE, HEALTH_MAX_RETRIES, HEALTH_PER_ATTEMPT_TIMEOUT};
use deploy_core::{DeployError, Result};
use std::time::{Duration, Instant};

/// Paths tried in order against a deployed service before declaring it
/// healthy (spec.md §4.4 step 7): the root, then the two conventional
/// health-check paths.
const HEALTH_PATHS: &[&str] = &["/", "/health", "/api/health"];

/// Timing metrics for one health-verification run, surfaced to the caller
/// for the deployment record (spec.md §4.4 outputs).
#[derive(Debug, Clone)]
pub struct HealthTiming {
    pub attempts: u32,
    pub total: Duration,
    pub path: String,
}

/// Poll a deployed service's root (and the conventional health paths) until
/// any non-5xx response is observed or the timeout/retry budget is
/// exhausted (spec.md §4.4 step 7). Any status under 500 — including
/// redirects and 4xx — counts as healthy; only 5xx and transport failure
/// keep retrying.
pub async fn verify_health(base_url: &str, client: &reqwest::Client) -> Result<HealthTiming> {
    let started = Instant::now();
    let mut last_error: Option<String> = None;

    for attempt in 0..HEALTH_MAX_RETRIES {
        if attempt > 0 {
            let backoff = HEALTH_BACKOFF_BASE * 2u32.pow(attempt - 1);
            tokio::time::sleep(backoff).await;
        }

        for path in HEALTH_PATHS {
            let url = format!("{}{}", base_url.trim_end_matches('/'), path);
            let request = client.get(&url).timeout(HEALTH_PER_ATTEMPT_TIMEOUT);
            match request.send().await {
                Ok(response) if response.status().as_u16() < 500 => {
                    return Ok(HealthTiming {
                        attempts: attempt + 1,
                        total: started.elapsed(),
                        path: (*path).to_string(),
                    });
                }
                Ok(response) => {
                    last_error = Some(format!("{path} returned {}", response.status()));
                }
                Err(err) => {
                    last_error = Some(format!("{path}: {err}"));
                }
            }
        }

        tracing::warn!(attempt, last_error = ?last_error, "health check attempt failed");
    }

    Err(DeployError::HealthDegraded(
        last_error.unwrap_or_else(|| "no response".to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_ok_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let timing = verify_health(&server.uri(), &client).await.unwrap();
        assert_eq!(timing.attempts, 1);
        assert_eq!(timing.path, "/");
    }

    #[tokio::test(start_paused = true)]
    async fn falls_through_to_health_path_when_root_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let timing = verify_health(&server.uri(), &client).await.unwrap();
        assert_eq!(timing.path, "/health");
        assert_eq!(timing.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_past_5xx_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let timing = verify_health(&server.uri(), &client).await.unwrap();
        assert_eq!(timing.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_retries_and_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let result = verify_health(&server.uri(), &client).await;
        assert!(result.is_err());
    }
}
