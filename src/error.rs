use thiserror::Error;

/// Errors reported by the adapter entry points and the reactor handle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The reactor behind the handle has been dropped; its command
    /// queue no longer accepts submissions.
    #[error("reactor is closed")]
    ReactorClosed,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
