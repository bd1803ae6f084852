/// Identifier addressing a watcher registered with the reactor.
///
/// Tokens are handed out by [`ReactorHandle::register`](crate::ReactorHandle::register)
/// and stay unique for the lifetime of the reactor.
pub type Token = usize;

/// An I/O event reported by the poller.
///
/// An `Event` represents readiness information for a registered
/// file descriptor. It is produced by the poller and consumed
/// by the reactor to invoke the watcher's callback.
///
/// The event indicates whether the file descriptor is readable,
/// writable, or both.
#[derive(Clone, Copy, Debug)]
pub struct Event {
    /// Token associated with the registered file descriptor.
    ///
    /// This token is used to identify the watcher inside the reactor.
    pub token: Token,

    /// Indicates that the file descriptor is readable.
    pub readable: bool,

    /// Indicates that the file descriptor is writable.
    pub writable: bool,
}
