//! Zest Client - session and push-channel lifecycle for the web client
//!
//! Provides the reactive session store, the push channel handle store, the
//! push token fetcher and channel manager, the controller that ties them
//! together after login and logout, and the registration form handler.

pub mod api;
pub mod http;
pub mod lifecycle;
pub mod push;
pub mod push_store;
pub mod registration;
pub mod session_store;
pub mod token;

pub use api::BackendClient;
pub use lifecycle::SessionController;
pub use push::{push_url, PushChannelHandle, PushChannelManager};
pub use push_store::PushChannelStore;
pub use registration::{RegistrationForm, RegistrationHandler};
pub use session_store::SessionStore;
pub use token::PushTokenFetcher;

pub use zest_core;
