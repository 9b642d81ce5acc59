//! Unified error handling system
//!
//! Structured error types with context and recovery suggestions, plus the typed
//! error payload the backend contract uses at the HTTP boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, warn};

pub type SessionResult<T> = Result<T, SessionError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Error body returned by the backend on a non-success status.
///
/// Bodies that do not follow the `{code, message}` shape are folded into one
/// by [`ErrorResponse::from_body`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build a typed error payload from a raw response body.
    pub fn from_body(status: u16, reason: Option<&str>, body: &str) -> Self {
        if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
            return parsed;
        }

        let trimmed = body.trim();
        let message = if trimmed.is_empty() {
            reason.unwrap_or("Unknown error").to_string()
        } else {
            trimmed.to_string()
        };

        Self {
            code: format!("http_{}", status),
            message,
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Main error type for session and push-channel operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// The request could not complete at the transport level
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// The backend answered with a non-success status
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
        response: Option<ErrorResponse>,
        context: ErrorContext,
    },

    /// A caller tried to put the session into an inconsistent state
    #[error("Invariant violation: {message}")]
    InvariantViolation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl SessionError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            SessionError::Network { context, .. } => Some(context),
            SessionError::Authentication { context, .. } => Some(context),
            SessionError::InvariantViolation { context, .. } => Some(context),
            SessionError::Config { context, .. } => Some(context),
            SessionError::Internal { context, .. } => Some(context),
            SessionError::Io(_) | SessionError::Serialization(_) => None,
        }
    }

    /// HTTP status attached to an authentication failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SessionError::Authentication { status, .. } => *status,
            _ => None,
        }
    }

    /// Typed backend payload attached to an authentication failure, if any
    pub fn error_response(&self) -> Option<&ErrorResponse> {
        match self {
            SessionError::Authentication { response, .. } => response.as_ref(),
            _ => None,
        }
    }

    /// Check if error is recoverable
    ///
    /// Nothing in this layer retries; the flag is for callers deciding
    /// whether to offer the user another attempt.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::Network { .. } => true,
            SessionError::Authentication { status, .. } => {
                matches!(status, Some(code) if *code >= 500)
            }
            _ => false,
        }
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, SessionError::InvariantViolation { .. })
    }

    /// Short text suitable for a blocking user alert
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Authentication {
                response: Some(response),
                ..
            } => response.message.clone(),
            SessionError::Authentication { message, .. } => message.clone(),
            SessionError::Network { .. } => "Could not reach the server".to_string(),
            other => other.to_string(),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        match self {
            SessionError::Internal { .. } | SessionError::Config { .. } => {
                error!(error_id = ?error_id, error = %self, "Internal or configuration error");
            }
            SessionError::InvariantViolation { .. } => {
                debug!(error_id = ?error_id, error = %self, "Session invariant violation");
            }
            SessionError::Network { .. } => {
                warn!(error_id = ?error_id, error = %self, "Network error (may be recoverable)");
            }
            SessionError::Authentication { status, .. } => {
                warn!(error_id = ?error_id, status = ?status, error = %self, "Request rejected by backend");
            }
            _ => {
                error!(error_id = ?error_id, error = %self, "Error occurred");
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! invariant_violation {
    ($msg:expr, $component:expr) => {
        $crate::SessionError::InvariantViolation {
            message: $msg.to_string(),
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $operation:expr) => {
        $crate::SessionError::InvariantViolation {
            message: $msg.to_string(),
            context: $crate::ErrorContext::new($component).with_operation($operation),
        }
    };
}

#[macro_export]
macro_rules! network_error {
    ($msg:expr, $component:expr) => {
        $crate::SessionError::Network {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check network connectivity and that the backend is running"),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::SessionError::Network {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check network connectivity and that the backend is running"),
        }
    };
}

#[macro_export]
macro_rules! auth_error {
    ($msg:expr, $component:expr) => {
        $crate::SessionError::Authentication {
            message: $msg.to_string(),
            status: None,
            response: None,
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::SessionError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file"),
        }
    };
}
