//! Client configuration

use crate::error::{ErrorContext, SessionError, SessionResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level client configuration, usually loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Origin serving `/api/*`
    pub api_base: String,
    /// Request timeout in seconds (not applied to push streams)
    pub timeout_seconds: u64,
    /// Connect timeout in seconds, used for every request
    pub connect_timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            user_agent: format!("zest-session/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Push channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Origin serving `/push/<user id>`
    pub push_base: String,
    /// Events buffered per subscriber before slow readers start lagging
    pub event_buffer: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            push_base: "http://localhost:3000".to_string(),
            event_buffer: 64,
        }
    }
}

/// How the registration form's inputs map onto the request body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMapping {
    /// `username` input goes to `username`, `password` input to `password`
    #[default]
    Direct,
    /// Legacy form behaviour: the two inputs are sent in each other's field
    Swapped,
}

/// Registration form behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub field_mapping: FieldMapping,
    /// Page shown after a successful registration
    pub root_path: String,
    /// Optional follow-up page after a successful registration
    pub secondary_auth_page: Option<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            field_mapping: FieldMapping::Direct,
            root_path: "/".to_string(),
            secondary_auth_page: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SessionResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SessionError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> SessionResult<Self> {
        let config: ClientConfig = toml::from_str(content).map_err(|e| SessionError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SessionResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| SessionError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| SessionError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SessionResult<()> {
        validate_base_url(&self.http.api_base, "http.api_base")?;
        validate_base_url(&self.push.push_base, "push.push_base")?;

        if self.http.timeout_seconds == 0 {
            return Err(invalid("http.timeout_seconds must be greater than 0"));
        }

        if self.http.connect_timeout_seconds == 0 {
            return Err(invalid("http.connect_timeout_seconds must be greater than 0"));
        }

        if self.push.event_buffer == 0 {
            return Err(invalid("push.event_buffer must be greater than 0"));
        }

        if !self.registration.root_path.starts_with('/') {
            return Err(invalid("registration.root_path must start with '/'"));
        }

        Ok(())
    }

    /// Config pointing both bases at one origin, as when the API and the
    /// push endpoint are served by the same process
    pub fn for_origin(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/').to_string();
        Self {
            http: HttpConfig {
                api_base: origin.clone(),
                ..HttpConfig::default()
            },
            push: PushConfig {
                push_base: origin,
                ..PushConfig::default()
            },
            ..Self::default()
        }
    }
}

fn validate_base_url(value: &str, field: &str) -> SessionResult<()> {
    let parsed = url::Url::parse(value).map_err(|e| SessionError::Config {
        message: format!("{} is not a valid URL: {}", field, e),
        source: Some(Box::new(e)),
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_metadata("field", field),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SessionError::Config {
            message: format!("{} must use http or https, got {}", field, other),
            source: None,
            context: ErrorContext::new("config")
                .with_operation("validate")
                .with_metadata("field", field),
        }),
    }
}

fn invalid(message: &str) -> SessionError {
    SessionError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion("Use a positive value"),
    }
}
