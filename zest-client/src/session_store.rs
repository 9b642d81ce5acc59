//! Session store
//!
//! Reactive holder of the signed-in flag and the current user id. Observers
//! subscribe to a `watch` channel and see every published state; a state that
//! breaks the signed-in/user-id invariant is never published.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use zest_core::{SessionResult, SessionState};

#[derive(Clone)]
pub struct SessionStore {
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionStore {
    /// A fresh, signed-out store
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::signed_out());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_signed_in(&self) -> bool {
        self.state.borrow().signed_in
    }

    pub fn user_id(&self) -> i32 {
        self.state.borrow().user_id
    }

    /// Receiver that is notified on every change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Replace the whole state in one step
    pub fn set_session(&self, next: SessionState) -> SessionResult<()> {
        self.update(|state| *state = next)
    }

    /// Change only the signed-in flag.
    ///
    /// Fails without publishing anything when the flag no longer agrees with
    /// the stored user id; use [`SessionStore::set_session`] to change both.
    pub fn set_signed_in(&self, signed_in: bool) -> SessionResult<()> {
        self.update(|state| state.signed_in = signed_in)
    }

    /// Change only the user id, under the same rule as `set_signed_in`
    pub fn set_user_id(&self, user_id: i32) -> SessionResult<()> {
        self.update(|state| state.user_id = user_id)
    }

    /// Back to signed out
    pub fn reset(&self) {
        self.state.send_if_modified(|state| {
            let changed = *state != SessionState::signed_out();
            *state = SessionState::signed_out();
            changed
        });
    }

    fn update(&self, apply: impl FnOnce(&mut SessionState)) -> SessionResult<()> {
        let mut result = Ok(());
        self.state.send_if_modified(|state| {
            let mut next = *state;
            apply(&mut next);
            match next.validate() {
                Ok(()) => {
                    let changed = next != *state;
                    if changed {
                        debug!(signed_in = next.signed_in, user_id = next.user_id, "Session updated");
                    }
                    *state = next;
                    changed
                }
                Err(err) => {
                    result = Err(err);
                    false
                }
            }
        });
        result
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zest_core::NO_USER;

    #[test]
    fn starts_signed_out() {
        let store = SessionStore::new();
        assert!(!store.is_signed_in());
        assert_eq!(store.user_id(), NO_USER);
    }

    #[test]
    fn set_session_publishes_both_fields_at_once() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        store.set_session(SessionState::signed_in(7).unwrap()).unwrap();

        assert!(rx.has_changed().unwrap());
        let seen = *rx.borrow_and_update();
        assert_eq!(seen, SessionState { signed_in: true, user_id: 7 });
    }

    #[test]
    fn inconsistent_updates_are_rejected_and_not_published() {
        let store = SessionStore::new();
        let rx = store.subscribe();

        let err = store.set_signed_in(true).unwrap_err();
        assert!(err.is_invariant_violation());
        let err = store.set_user_id(3).unwrap_err();
        assert!(err.is_invariant_violation());
        let err = store
            .set_session(SessionState { signed_in: false, user_id: 3 })
            .unwrap_err();
        assert!(err.is_invariant_violation());

        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.state(), SessionState::signed_out());
    }

    #[test]
    fn single_field_updates_allowed_when_consistent() {
        let store = SessionStore::new();
        store.set_session(SessionState::signed_in(1).unwrap()).unwrap();

        // Switching users while signed in keeps the invariant
        store.set_user_id(2).unwrap();
        assert_eq!(store.user_id(), 2);

        // Signing out needs the user id cleared as well
        assert!(store.set_signed_in(false).is_err());
        assert!(store.is_signed_in());
    }

    #[test]
    fn clones_share_state() {
        let store = SessionStore::new();
        let other = store.clone();
        store.set_session(SessionState::signed_in(9).unwrap()).unwrap();
        assert_eq!(other.user_id(), 9);

        other.reset();
        assert!(!store.is_signed_in());
    }

    #[test]
    fn unchanged_state_does_not_notify() {
        let store = SessionStore::new();
        let rx = store.subscribe();
        store.reset();
        store.set_session(SessionState::signed_out()).unwrap();
        assert!(!rx.has_changed().unwrap());
    }
}
