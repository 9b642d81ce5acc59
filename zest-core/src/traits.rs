//! Seams to the embedding application
//!
//! The client never touches a UI directly. Page changes and blocking alerts go
//! through these traits so a host (or a test) can decide what they mean.

/// Moves the application to another page
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, path: &str);
}

/// Shows a blocking message to the user
pub trait UserAlert: Send + Sync {
    fn alert(&self, message: &str);
}
