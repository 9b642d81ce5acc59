//! Push channel handle store
//!
//! Holds at most one open [`PushChannelHandle`]. The store owns the handle;
//! callers borrow it through the accessors or take it out to close it.

use crate::push::PushChannelHandle;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use zest_core::PushEvent;

#[derive(Clone)]
pub struct PushChannelStore {
    handle: Arc<Mutex<Option<PushChannelHandle>>>,
    // Which user's channel is stored, for observers
    active: Arc<watch::Sender<Option<i32>>>,
}

impl PushChannelStore {
    pub fn new() -> Self {
        let (active, _) = watch::channel(None);
        Self {
            handle: Arc::new(Mutex::new(None)),
            active: Arc::new(active),
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    /// User id of the stored channel
    pub fn user_id(&self) -> Option<i32> {
        self.lock().as_ref().map(PushChannelHandle::user_id)
    }

    /// Subscription URL of the stored channel
    pub fn url(&self) -> Option<String> {
        self.lock().as_ref().map(|handle| handle.url().to_string())
    }

    /// Events of the stored channel, if there is one
    pub fn subscribe(&self) -> Option<broadcast::Receiver<PushEvent>> {
        self.lock().as_ref().map(PushChannelHandle::subscribe)
    }

    /// Notified whenever a channel is stored or removed
    pub fn observe(&self) -> watch::Receiver<Option<i32>> {
        self.active.subscribe()
    }

    /// Store a handle (or clear with `None`) and hand back the one it
    /// displaced. The displaced handle is not closed here.
    pub fn set(&self, handle: Option<PushChannelHandle>) -> Option<PushChannelHandle> {
        let user_id = handle.as_ref().map(PushChannelHandle::user_id);
        let previous = std::mem::replace(&mut *self.lock(), handle);
        self.active.send_replace(user_id);
        previous
    }

    pub fn take(&self) -> Option<PushChannelHandle> {
        self.set(None)
    }

    fn lock(&self) -> MutexGuard<'_, Option<PushChannelHandle>> {
        // A panic while holding the lock cannot leave the Option half-written
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PushChannelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PushChannelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannelStore")
            .field("user_id", &self.user_id())
            .finish()
    }
}
