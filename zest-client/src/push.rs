//! Push channel
//!
//! A push channel is a long-lived server-sent-events stream for one user,
//! opened at `<push-base>/push/<user id>?<token>`. Opening never fails
//! synchronously: the stream is driven by a background task and connection
//! problems reach subscribers as [`PushEvent::Error`].

use crate::push_store::PushChannelStore;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zest_core::{PushConfig, PushEvent, PushToken};

/// Build the subscription URL for a user.
pub fn push_url(push_base: &str, user_id: i32, token: &PushToken) -> String {
    format!(
        "{}/push/{}?{}",
        push_base.trim_end_matches('/'),
        user_id,
        token.as_str()
    )
}

/// An open push subscription.
///
/// `close` consumes the handle, so a closed channel cannot be read from.
/// Dropping a handle without closing it also stops the stream.
pub struct PushChannelHandle {
    user_id: i32,
    url: String,
    events: broadcast::Sender<PushEvent>,
    finished: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PushChannelHandle {
    pub fn user_id(&self) -> i32 {
        self.user_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Receive events from now on. Subscribe before yielding to the runtime
    /// to be sure of seeing [`PushEvent::Open`].
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }

    /// Whether the stream has ended, by error, by the server, or by close
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn close(self) {
        debug!(user_id = self.user_id, "Closing push channel");
        self.task.abort();
        finish(&self.events, &self.finished);
    }
}

impl Drop for PushChannelHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for PushChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL carries the token, so only the user id is shown
        f.debug_struct("PushChannelHandle")
            .field("user_id", &self.user_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Opens push channels and keeps the current one in a [`PushChannelStore`]
#[derive(Clone)]
pub struct PushChannelManager {
    client: reqwest::Client,
    push_base: String,
    event_buffer: usize,
    store: PushChannelStore,
}

impl PushChannelManager {
    pub fn new(client: reqwest::Client, config: &PushConfig, store: PushChannelStore) -> Self {
        Self {
            client,
            push_base: config.push_base.trim_end_matches('/').to_string(),
            event_buffer: config.event_buffer.max(1),
            store,
        }
    }

    pub fn store(&self) -> &PushChannelStore {
        &self.store
    }

    pub fn push_base(&self) -> &str {
        &self.push_base
    }

    /// Start streaming the user's push endpoint.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn open(&self, user_id: i32, token: &PushToken) -> PushChannelHandle {
        let url = push_url(&self.push_base, user_id, token);
        let (events, _) = broadcast::channel(self.event_buffer);
        let finished = Arc::new(AtomicBool::new(false));

        info!(user_id = user_id, push_base = %self.push_base, "Opening push channel");

        let task = tokio::spawn(run_stream(
            self.client.clone(),
            url.clone(),
            user_id,
            events.clone(),
            finished.clone(),
        ));

        PushChannelHandle {
            user_id,
            url,
            events,
            finished,
            task,
        }
    }

    /// Open a channel and make it the stored one. A channel that was still
    /// stored is closed first so at most one stays open.
    pub fn open_and_store(&self, user_id: i32, token: &PushToken) {
        let handle = self.open(user_id, token);
        if let Some(previous) = self.store.set(Some(handle)) {
            warn!(
                user_id = previous.user_id(),
                "Replacing a push channel that was never closed"
            );
            previous.close();
        }
    }
}

async fn run_stream(
    client: reqwest::Client,
    url: String,
    user_id: i32,
    events: broadcast::Sender<PushEvent>,
    finished: Arc<AtomicBool>,
) {
    let response = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await;

    let response = match response {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            let status = response.status();
            warn!(user_id = user_id, status = status.as_u16(), "Push endpoint refused subscription");
            fail(
                &events,
                &finished,
                format!("push endpoint returned HTTP {}", status.as_u16()),
            );
            return;
        }
        Err(e) => {
            warn!(user_id = user_id, error = %e, "Push channel connection failed");
            fail(&events, &finished, format!("push connection failed: {}", e));
            return;
        }
    };

    if finished.load(Ordering::SeqCst) {
        return;
    }
    debug!(user_id = user_id, "Push channel open");
    let _ = events.send(PushEvent::Open);

    let mut stream = response.bytes_stream().eventsource();
    while let Some(item) = stream.next().await {
        match item {
            Ok(_) if finished.load(Ordering::SeqCst) => return,
            Ok(event) => {
                let name = if event.event.is_empty() {
                    "message".to_string()
                } else {
                    event.event
                };
                let id = if event.id.is_empty() { None } else { Some(event.id) };
                let _ = events.send(PushEvent::Message {
                    event: name,
                    data: event.data,
                    id,
                });
            }
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Push stream failed");
                fail(&events, &finished, format!("push stream failed: {}", e));
                return;
            }
        }
    }

    debug!(user_id = user_id, "Push stream ended by server");
    finish(&events, &finished);
}

// Whoever flips `finished` first owns the terminal events, so nothing is
// sent after `Closed`
fn fail(events: &broadcast::Sender<PushEvent>, finished: &AtomicBool, message: String) {
    if !finished.swap(true, Ordering::SeqCst) {
        let _ = events.send(PushEvent::Error { message });
        let _ = events.send(PushEvent::Closed);
    }
}

fn finish(events: &broadcast::Sender<PushEvent>, finished: &AtomicBool) {
    if !finished.swap(true, Ordering::SeqCst) {
        let _ = events.send(PushEvent::Closed);
    }
}
