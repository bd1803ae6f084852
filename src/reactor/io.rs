use super::event::Event;
use super::poller::common::Interest;

use std::os::fd::RawFd;

/// Callback invoked by the reactor when a watched descriptor reports
/// readiness.
///
/// The callback runs on the reactor thread, after the event has been
/// masked by the watcher's current interest. It must not block; it may
/// submit new commands through a [`ReactorHandle`](crate::ReactorHandle).
pub type IoCallback = Box<dyn FnMut(Event) + Send>;

/// A watcher registered in the reactor for I/O readiness.
///
/// The reactor owns one `IoWatcher` per registered descriptor and keeps
/// its interest in sync with the poller. The interest recorded here is
/// authoritative: events are masked against it before dispatch, so a
/// disable applied in the current cycle silences readiness harvested in
/// the previous one.
pub(crate) struct IoWatcher {
    /// The watched file descriptor.
    pub(crate) fd: RawFd,

    /// Readiness interest currently requested for the descriptor.
    pub(crate) interest: Interest,

    /// Dispatch callback for masked readiness events.
    pub(crate) callback: IoCallback,
}
