//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create a shared HTTP client with standard configuration.
///
/// Config: 10s connect timeout, 60s request timeout, rustls TLS,
/// `codelens/{version}` user-agent, redirect limit 10. Callers still wrap
/// provider calls in their own, usually shorter, timeout.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .user_agent(concat!("codelens/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("default HTTP client construction must not fail")
}

/// Map a non-success status into an error, logging the body for diagnosis.
pub(crate) fn status_error(
    provider: &'static str,
    status: reqwest::StatusCode,
    body: &str,
) -> crate::LlmError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return crate::LlmError::RateLimited;
    }
    tracing::error!(provider, status = status.as_u16(), "API error: {body}");
    crate::LlmError::Status {
        provider,
        status: status.as_u16(),
    }
}
