//! Shared HTTP plumbing
//!
//! One `reqwest::Client` with a cookie store is shared by every request so the
//! session cookie set by register or login is sent with later calls, the same
//! way a browser sends same-origin credentials.

use std::time::Duration;
use zest_core::{ErrorContext, ErrorResponse, HttpConfig, SessionError, SessionResult};

/// Create the HTTP client used for API calls and push streams.
///
/// No overall request timeout is set on the client because push streams stay
/// open indefinitely; API calls apply [`request_timeout`] per request.
pub fn create_http_client(config: &HttpConfig) -> SessionResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            SessionError::Config {
                message: format!("Invalid user agent: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            }
        })?,
    );

    reqwest::Client::builder()
        .cookie_store(true)
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| SessionError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

pub fn request_timeout(config: &HttpConfig) -> Duration {
    Duration::from_secs(config.timeout_seconds)
}

/// Join a base URL and an absolute path without doubling the slash
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Map a transport failure to a network error
pub fn send_error(error: reqwest::Error, operation: &str) -> SessionError {
    let message = if error.is_timeout() {
        format!("Request timed out: {}", error)
    } else if error.is_connect() {
        format!("Could not connect: {}", error)
    } else {
        format!("Request failed: {}", error)
    };

    SessionError::Network {
        message,
        source: Some(Box::new(error)),
        context: ErrorContext::new("http_client")
            .with_operation(operation)
            .with_suggestion("Check network connectivity and that the backend is running"),
    }
}

/// Turn a non-success response into an authentication error carrying the
/// backend's typed error payload
pub async fn handle_response_error(response: reqwest::Response, operation: &str) -> SessionError {
    let status = response.status();
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let payload = ErrorResponse::from_body(status.as_u16(), status.canonical_reason(), &body);

    SessionError::Authentication {
        message: format!("HTTP {} from {}: {}", status.as_u16(), url.path(), payload.message),
        status: Some(status.as_u16()),
        response: Some(payload),
        context: ErrorContext::new("api_client")
            .with_operation(operation)
            .with_metadata("url", url.as_str())
            .with_suggestion(match status.as_u16() {
                400 => "Check the submitted fields",
                401 | 403 => "Sign in again",
                409 => "Choose a different username",
                _ => "Check the backend logs",
            }),
    }
}
