//! Registration form handler
//!
//! Submits the new-user form to `/api/register`. On success the session store
//! is signed in and the host is sent to the root page (and then to the
//! secondary auth page when one is configured). On failure the session is left
//! alone and the user sees exactly one alert. Registration does not open a
//! push channel, and a channel left over from an earlier session is closed.

use crate::api::BackendClient;
use crate::push_store::PushChannelStore;
use crate::session_store::SessionStore;
use std::sync::Arc;
use tracing::{info, warn};
use zest_core::{
    FieldMapping, Navigator, RegisterInfo, RegistrationConfig, SessionResult, SessionState,
    UserAlert, UserInfo,
};

/// Values typed into the registration form
#[derive(Clone)]
pub struct RegistrationForm {
    pub username: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Request body for the configured field mapping
    pub fn to_register_info(&self, mapping: FieldMapping) -> RegisterInfo {
        match mapping {
            FieldMapping::Direct => RegisterInfo {
                username: self.username.clone(),
                password: self.password.clone(),
            },
            FieldMapping::Swapped => RegisterInfo {
                username: self.password.clone(),
                password: self.username.clone(),
            },
        }
    }
}

impl std::fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct RegistrationHandler {
    backend: BackendClient,
    session: SessionStore,
    config: RegistrationConfig,
    navigator: Arc<dyn Navigator>,
    alert: Arc<dyn UserAlert>,
    push: Option<PushChannelStore>,
}

impl RegistrationHandler {
    pub fn new(
        backend: BackendClient,
        session: SessionStore,
        config: RegistrationConfig,
        navigator: Arc<dyn Navigator>,
        alert: Arc<dyn UserAlert>,
    ) -> Self {
        if config.field_mapping == FieldMapping::Swapped {
            warn!("Registration form uses swapped username/password mapping");
        }

        Self {
            backend,
            session,
            config,
            navigator,
            alert,
            push: None,
        }
    }

    /// Share the push channel store of the host's session controller
    pub fn with_push_store(mut self, store: PushChannelStore) -> Self {
        self.push = Some(store);
        self
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Submit the form. The returned error has already been shown to the user.
    pub async fn submit(&self, form: &RegistrationForm) -> SessionResult<UserInfo> {
        match self.register(form).await {
            Ok(user_info) => {
                info!(user_id = user_info.user_id, "Registration succeeded");
                self.navigator.navigate_to(&self.config.root_path);
                if let Some(page) = &self.config.secondary_auth_page {
                    self.navigator.navigate_to(page);
                }
                Ok(user_info)
            }
            Err(err) => {
                err.log();
                self.alert
                    .alert(&format!("Registration failed: {}", err.user_message()));
                Err(err)
            }
        }
    }

    async fn register(&self, form: &RegistrationForm) -> SessionResult<UserInfo> {
        let body = form.to_register_info(self.config.field_mapping);
        let user_info = self.backend.register(&body).await?;
        self.session
            .set_session(SessionState::signed_in(user_info.user_id)?)?;

        if let Some(stale) = self.push.as_ref().and_then(PushChannelStore::take) {
            info!(
                user_id = stale.user_id(),
                "Closing push channel of the previous session"
            );
            stale.close();
        }

        Ok(user_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_mapping_keeps_fields() {
        let form = RegistrationForm::new("alice", "hunter2");
        let body = form.to_register_info(FieldMapping::Direct);
        assert_eq!(body.username, "alice");
        assert_eq!(body.password, "hunter2");
    }

    #[test]
    fn swapped_mapping_reverses_fields() {
        let form = RegistrationForm::new("alice", "hunter2");
        let body = form.to_register_info(FieldMapping::Swapped);
        assert_eq!(body.username, "hunter2");
        assert_eq!(body.password, "alice");
    }
}
