//! Push token fetcher

use crate::api::BackendClient;
use crate::http::{handle_response_error, send_error};
use tracing::debug;
use zest_core::{ErrorContext, ErrorResponse, PushToken, SessionError, SessionResult};

/// Fetches the short-lived token that authorizes opening a push channel.
///
/// The request relies on the session cookie held by the backend client. One
/// attempt per call; nothing is cached.
#[derive(Clone)]
pub struct PushTokenFetcher {
    backend: BackendClient,
}

impl PushTokenFetcher {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// `GET /api/sse-auth-token`
    pub async fn fetch_token(&self) -> SessionResult<PushToken> {
        let response = self
            .backend
            .http()
            .get(self.backend.endpoint("/api/sse-auth-token"))
            .timeout(self.backend.timeout())
            .send()
            .await
            .map_err(|e| send_error(e, "fetch_token"))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, "fetch_token").await);
        }

        let token = response
            .text()
            .await
            .map_err(|e| send_error(e, "fetch_token"))?;
        let token = token.trim();

        if token.is_empty() {
            return Err(SessionError::Authentication {
                message: "Token endpoint returned an empty token".to_string(),
                status: None,
                response: Some(ErrorResponse::new("empty_token", "No push token was issued")),
                context: ErrorContext::new("push_token").with_operation("fetch_token"),
            });
        }

        debug!("Fetched push token");
        Ok(PushToken::new(token))
    }
}
