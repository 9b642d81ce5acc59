//! Core data structures shared between the stores, the HTTP client and the tests

use crate::error::SessionResult;
use crate::invariant_violation;
use serde::{Deserialize, Serialize};

/// User id sentinel meaning "no user"
pub const NO_USER: i32 = -1;

/// Signed-in flag plus the current user id.
///
/// `signed_in == false` implies `user_id == NO_USER`, and `signed_in == true`
/// implies `user_id >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub signed_in: bool,
    pub user_id: i32,
}

impl SessionState {
    pub const fn signed_out() -> Self {
        Self {
            signed_in: false,
            user_id: NO_USER,
        }
    }

    pub fn signed_in(user_id: i32) -> SessionResult<Self> {
        let state = Self {
            signed_in: true,
            user_id,
        };
        state.validate()?;
        Ok(state)
    }

    pub fn is_consistent(&self) -> bool {
        if self.signed_in {
            self.user_id >= 0
        } else {
            self.user_id == NO_USER
        }
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.is_consistent() {
            Ok(())
        } else {
            Err(invariant_violation!(
                format!(
                    "inconsistent session state: signed_in={}, user_id={}",
                    self.signed_in, self.user_id
                ),
                "session_state",
                "validate"
            ))
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::signed_out()
    }
}

/// Short-lived bearer string authorizing one push subscription
#[derive(Clone, PartialEq, Eq)]
pub struct PushToken(String);

impl PushToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for PushToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PushToken(<redacted>)")
    }
}

impl From<String> for PushToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for PushToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Information about a user, as returned by register, login and me
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: i32,
    #[serde(default)]
    pub username: String,
}

/// Body posted to create a new user
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterInfo {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RegisterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterInfo")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body posted to log in
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginInfo {
    pub username: String,
    pub password: String,
}

impl LoginInfo {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginInfo")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Third-party credentials posted from the secondary auth page, used by the
/// backend to fetch data on the user's behalf
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthCredentials {
    pub oauth_token: String,
    pub client_id: String,
}

impl AuthCredentials {
    pub fn new(oauth_token: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            oauth_token: oauth_token.into(),
            client_id: client_id.into(),
        }
    }
}

impl std::fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("oauth_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Something delivered on an open push channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// The stream answered and is now delivering events
    Open,
    /// One server-sent event; the backend names its events `update`
    Message {
        event: String,
        data: String,
        id: Option<String>,
    },
    /// Transport or protocol failure; the stream ends after this
    Error { message: String },
    /// The stream is finished, either by the server or by `close`
    Closed,
}

impl PushEvent {
    /// Decode the payload of a `Message` as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        match self {
            PushEvent::Message { data, .. } => Some(serde_json::from_str(data)),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PushEvent::Error { .. } | PushEvent::Closed)
    }
}
