use super::platform::sys_close;

use std::os::fd::RawFd;

/// Readiness interest for a watched file descriptor.
///
/// Both flags may be toggled independently while the descriptor stays
/// registered; a watcher with neither flag set remains known to the
/// reactor but produces no events.
#[derive(Clone, Copy)]
pub struct Interest {
    /// Deliver an event when the descriptor becomes readable.
    pub read: bool,

    /// Deliver an event when the descriptor becomes writable.
    pub write: bool,
}

/// Wake handle wrapping the poller's internal wake descriptor.
///
/// Writing to the descriptor interrupts a blocking poll from any thread.
/// The descriptor is owned here and closed when the last handle drops.
pub(crate) struct Waker(pub(crate) RawFd);

unsafe impl Send for Waker {}
unsafe impl Sync for Waker {}

impl Drop for Waker {
    fn drop(&mut self) {
        sys_close(self.0);
    }
}
