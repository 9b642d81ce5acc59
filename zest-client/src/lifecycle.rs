//! Session lifecycle controller
//!
//! Two states, signed out and signed in. Logging in publishes the session and
//! then opens the user's push channel; logging out publishes the signed-out
//! session and closes whatever channel is stored. Transitions are serialized,
//! so a login and a logout never interleave.
//!
//! Push setup is best effort: a missing token or a dead push endpoint never
//! undoes a successful login.

use crate::api::BackendClient;
use crate::push::PushChannelManager;
use crate::push_store::PushChannelStore;
use crate::session_store::SessionStore;
use crate::token::PushTokenFetcher;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zest_core::{
    log_operation_error, log_operation_start, log_operation_success, ClientConfig, LoginInfo, PushToken,
    SessionResult, SessionState, UserInfo,
};

pub struct SessionController {
    session: SessionStore,
    push: PushChannelManager,
    backend: BackendClient,
    tokens: PushTokenFetcher,
    transition: Mutex<()>,
}

impl SessionController {
    /// Controller with fresh stores
    pub fn new(config: &ClientConfig) -> SessionResult<Self> {
        Self::with_stores(config, SessionStore::new(), PushChannelStore::new())
    }

    /// Controller driving stores owned by the caller
    pub fn with_stores(
        config: &ClientConfig,
        session: SessionStore,
        push_store: PushChannelStore,
    ) -> SessionResult<Self> {
        config.validate()?;
        let backend = BackendClient::new(&config.http)?;
        let push = PushChannelManager::new(backend.http().clone(), &config.push, push_store);
        let tokens = PushTokenFetcher::new(backend.clone());

        Ok(Self {
            session,
            push,
            backend,
            tokens,
            transition: Mutex::new(()),
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn push_store(&self) -> &PushChannelStore {
        self.push.store()
    }

    pub fn push_manager(&self) -> &PushChannelManager {
        &self.push
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn token_fetcher(&self) -> &PushTokenFetcher {
        &self.tokens
    }

    /// Mark the user signed in and open their push channel with `token`.
    ///
    /// A negative user id is rejected before anything changes.
    pub async fn login(&self, user_info: &UserInfo, token: &PushToken) -> SessionResult<()> {
        let _guard = self.transition.lock().await;
        self.login_locked(user_info, Some(token))
    }

    /// Mark the session signed out and close the stored push channel, if any.
    pub async fn logout(&self) {
        let _guard = self.transition.lock().await;
        self.logout_locked();
    }

    /// Log in against the backend, then subscribe to push with a fresh token.
    pub async fn sign_in(&self, login_info: &LoginInfo) -> SessionResult<UserInfo> {
        let _guard = self.transition.lock().await;
        log_operation_start!("sign_in", username = %login_info.username);

        let user_info = match self.backend.login(login_info).await {
            Ok(user_info) => user_info,
            Err(err) => {
                log_operation_error!("sign_in", err, username = %login_info.username);
                return Err(err);
            }
        };
        self.establish_locked(&user_info).await?;

        log_operation_success!("sign_in", user_id = user_info.user_id);
        Ok(user_info)
    }

    /// Tell the backend to drop the session, then log out locally.
    ///
    /// The local logout happens even when the backend call fails.
    pub async fn sign_out(&self) {
        let _guard = self.transition.lock().await;
        if let Err(err) = self.backend.logout().await {
            warn!(error = %err, "Backend logout failed; clearing local session anyway");
        }
        self.logout_locked();
    }

    /// Pick up a session the backend still recognises from its cookie.
    pub async fn restore(&self) -> SessionResult<Option<UserInfo>> {
        let _guard = self.transition.lock().await;
        match self.backend.me().await? {
            Some(user_info) => {
                self.establish_locked(&user_info).await?;
                Ok(Some(user_info))
            }
            None => {
                debug!("No backend session to restore");
                self.logout_locked();
                Ok(None)
            }
        }
    }

    async fn establish_locked(&self, user_info: &UserInfo) -> SessionResult<()> {
        // Validate before touching the network for a token
        SessionState::signed_in(user_info.user_id)?;

        match self.tokens.fetch_token().await {
            Ok(token) => self.login_locked(user_info, Some(&token)),
            Err(err) => {
                warn!(
                    user_id = user_info.user_id,
                    error = %err,
                    "Push token unavailable; continuing without live push"
                );
                self.login_locked(user_info, None)
            }
        }
    }

    fn login_locked(&self, user_info: &UserInfo, token: Option<&PushToken>) -> SessionResult<()> {
        let state = SessionState::signed_in(user_info.user_id)?;
        self.session.set_session(state)?;
        info!(user_id = user_info.user_id, "Signed in");

        match token {
            Some(token) => self.push.open_and_store(user_info.user_id, token),
            None => {
                // A channel left over from an earlier session must not stay
                // paired with this user
                if let Some(stale) = self.push.store().take() {
                    info!(
                        user_id = stale.user_id(),
                        "Closing push channel of the previous session"
                    );
                    stale.close();
                }
            }
        }

        Ok(())
    }

    fn logout_locked(&self) {
        self.session.reset();

        match self.push.store().take() {
            Some(handle) => {
                info!(user_id = handle.user_id(), "Signed out; closing push channel");
                handle.close();
            }
            None => debug!("Signed out with no push channel to close"),
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.session)
            .field("push", self.push.store())
            .finish()
    }
}
