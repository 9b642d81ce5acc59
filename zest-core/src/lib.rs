//! Zest Core - shared session types, error taxonomy and ambient infrastructure
//!
//! Everything the client crate needs that is not tied to a transport lives here.

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use tokio;
pub use tracing;
