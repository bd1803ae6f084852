/// Readiness hooks a connection exposes to its attachment.
///
/// The adapter invokes these on the reactor thread, serially, whenever
/// the watched socket reports readiness matching the attachment's
/// current interest. Implementations are expected to do bounded,
/// non-blocking work: read until the socket would block, drain a write
/// buffer, and return. They may call the attachment's
/// [`read`](crate::Attachment::read) and
/// [`write`](crate::Attachment::write) toggles, including from inside a
/// hook.
///
/// The attachment keeps only a [`Weak`](std::sync::Weak) reference to
/// the connection; once the last strong reference is dropped, readiness
/// for it is silently skipped.
pub trait ConnectionEvents: Send + Sync {
    /// The socket has bytes to read, or hit EOF or an error condition
    /// that a read will surface.
    fn read_ready(&self);

    /// The socket can accept more bytes.
    fn write_ready(&self);
}
