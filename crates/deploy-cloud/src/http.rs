use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

/// Shared HTTP client builder for every cloud collaborator (spec.md §1:
/// "all cloud interactions go through typed API clients"). Transport-level
/// transient failures (5xx, connect/timeout) are retried by the middleware;
/// response-content-driven classification (the §4.3 keyword list) is the
/// Model Broker's job, not this client's.
///
/// Grounded on `copilot_client`'s `reqwest-retry` integration
/// (`reqwest_retry::policies::ExponentialBackoff` + `RetryTransientMiddleware`).
pub fn build_http_client(max_retries: u32) -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
    ClientBuilder::new(reqwest::Client::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}
