//! Backend API client
//!
//! Typed calls for the account endpoints under `/api`. The push token endpoint
//! lives in [`crate::token`].

use crate::http::{create_http_client, handle_response_error, join_url, request_timeout, send_error};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use zest_core::{
    AuthCredentials, HttpConfig, LoginInfo, RegisterInfo, SessionResult, UserInfo,
};

/// Cookie-carrying client for the backend's account API.
///
/// Clones share the same connection pool and cookie jar.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    api_base: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &HttpConfig) -> SessionResult<Self> {
        let client = create_http_client(config)?;
        info!(api_base = %config.api_base, "Created backend client");

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout: request_timeout(config),
        })
    }

    /// The underlying HTTP client, shared with the push channel
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.api_base, path)
    }

    /// `POST /api/register`
    pub async fn register(&self, info: &RegisterInfo) -> SessionResult<UserInfo> {
        debug!(username = %info.username, "Registering user");
        let request = self.client.post(self.endpoint("/api/register")).json(info);
        self.send_json(request, "register").await
    }

    /// `POST /api/login`
    pub async fn login(&self, info: &LoginInfo) -> SessionResult<UserInfo> {
        debug!(username = %info.username, "Logging in");
        let request = self.client.post(self.endpoint("/api/login")).json(info);
        self.send_json(request, "login").await
    }

    /// `GET /api/logout`
    pub async fn logout(&self) -> SessionResult<()> {
        let response = self
            .client
            .get(self.endpoint("/api/logout"))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| send_error(e, "logout"))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, "logout").await);
        }

        Ok(())
    }

    /// `POST /api/auth-creds`; needs a signed-in session
    pub async fn submit_auth_creds(&self, creds: &AuthCredentials) -> SessionResult<()> {
        debug!(client_id = %creds.client_id, "Submitting auth credentials");
        let response = self
            .client
            .post(self.endpoint("/api/auth-creds"))
            .json(creds)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| send_error(e, "auth_creds"))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, "auth_creds").await);
        }

        Ok(())
    }

    /// `GET /api/me`; `None` when the backend does not recognise the session
    pub async fn me(&self) -> SessionResult<Option<UserInfo>> {
        let response = self
            .client
            .get(self.endpoint("/api/me"))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| send_error(e, "me"))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(handle_response_error(response, "me").await);
        }

        let body = response.text().await.map_err(|e| send_error(e, "me"))?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> SessionResult<T> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| send_error(e, operation))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, operation).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| send_error(e, operation))?;
        Ok(serde_json::from_str(&body)?)
    }
}
