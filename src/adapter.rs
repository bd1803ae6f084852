//! Connection-to-reactor attachment.
//!
//! This module implements the bridge between a messaging-client
//! connection and an externally owned [`Reactor`](crate::Reactor).
//! It is responsible for:
//! - registering one watcher per connection socket,
//! - rebinding that watcher when the client reconnects,
//! - mirroring the client's read/write interest into the reactor,
//! - routing readiness back into the connection's hooks.
//!
//! The client library owns the [`Attachment`] and calls it at four
//! lifecycle points: attach on (re)connect, the two interest toggles
//! while traffic flows, and detach on final close.

use crate::connection::ConnectionEvents;
use crate::error::Result;
use crate::reactor::{Event, Interest, ReactorHandle, Token};

use log::{debug, trace};
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex, Weak};

/// Live binding of one connection to one reactor.
///
/// An `Attachment` owns the registration of the connection's socket:
/// which reactor watches it, under which token, and with which interest.
/// At most one exists per connection; reconnecting rebinds the existing
/// value instead of creating a second one, and [`detach`](Self::detach)
/// consumes it, so a released attachment cannot be used again.
///
/// The toggles take `&self` and are safe to call from any thread,
/// including from inside the connection's own readiness hooks.
///
/// # Examples
///
/// ```rust,ignore
/// let mut slot = None;
/// Attachment::attach(&mut slot, &reactor.handle(), &conn, socket)?;
///
/// // ... traffic flows, hooks toggle interest ...
///
/// slot.take().unwrap().detach()?;
/// ```
pub struct Attachment {
    state: Mutex<State>,
}

struct State {
    /// Handle to the reactor currently watching the socket.
    reactor: ReactorHandle,

    /// Token of the registered watcher.
    token: Token,

    /// The watched socket.
    fd: RawFd,

    /// Client-side mirror of the requested read interest.
    read_on: bool,

    /// Client-side mirror of the requested write interest.
    write_on: bool,

    /// Cleared by `detach` so `Drop` does not deregister twice.
    attached: bool,
}

impl State {
    fn submit_interest(&self) -> Result<()> {
        self.reactor.set_interest(
            self.token,
            Interest {
                read: self.read_on,
                write: self.write_on,
            },
        )
    }
}

impl Attachment {
    /// Binds `conn`'s socket to the given reactor.
    ///
    /// On the first call (`slot` is `None`) this creates the attachment.
    /// On a reconnect (`slot` holds one) the previous socket's watcher is
    /// deregistered first and the existing attachment is rebound; the
    /// handle may name a different reactor than the previous call.
    ///
    /// Either way the new watcher starts with read interest active and
    /// write interest inactive, and the submission wakes the reactor so
    /// a blocked poll picks the registration up promptly.
    ///
    /// The attachment holds the connection only weakly; dropping the
    /// last `Arc` of the connection silences its callbacks without
    /// detaching.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReactorClosed`](crate::Error::ReactorClosed) when
    /// the target reactor is gone. No new watcher is left registered in
    /// that case.
    pub fn attach<C>(
        slot: &mut Option<Attachment>,
        reactor: &ReactorHandle,
        conn: &Arc<C>,
        socket: RawFd,
    ) -> Result<()>
    where
        C: ConnectionEvents + 'static,
    {
        let conn: Arc<dyn ConnectionEvents> = conn.clone();
        let weak = Arc::downgrade(&conn);

        match slot {
            Some(attachment) => {
                let mut state = attachment.state.lock().unwrap();

                // Fully deactivate the previous binding before rebinding.
                // Its reactor may already be gone after a reconnect.
                let _ = state.reactor.deregister(state.token);

                let token = register_watcher(reactor, socket, weak)?;

                state.reactor = reactor.clone();
                state.token = token;
                state.fd = socket;
                state.read_on = true;
                state.write_on = false;

                debug!("rebound attachment to fd {socket}");
            }

            None => {
                let token = register_watcher(reactor, socket, weak)?;

                *slot = Some(Attachment {
                    state: Mutex::new(State {
                        reactor: reactor.clone(),
                        token,
                        fd: socket,
                        read_on: true,
                        write_on: false,
                        attached: true,
                    }),
                });

                debug!("attached connection on fd {socket}");
            }
        }

        Ok(())
    }

    /// Toggles interest in read readiness.
    ///
    /// The new interest is submitted to the reactor and the wake
    /// descriptor is signalled, even when the flag did not change;
    /// applying an identical interest is a no-op on the loop thread.
    /// Toggles are idempotent.
    pub fn read(&self, enable: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.read_on = enable;

        state.submit_interest()
    }

    /// Toggles interest in write readiness.
    ///
    /// Same submission semantics as [`read`](Self::read). Enable it when
    /// output is buffered, disable it once the buffer drains, or the
    /// loop will spin on an always-writable socket.
    pub fn write(&self, enable: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.write_on = enable;

        state.submit_interest()
    }

    /// Releases the binding.
    ///
    /// Consumes the attachment, deregisters the watcher and purges any
    /// readiness already harvested for it, so no hook fires after the
    /// deregistration is applied. A hook already executing on the
    /// reactor thread finishes normally; `detach` does not wait for it.
    ///
    /// Safe to call whether or not write interest was ever toggled.
    pub fn detach(self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.attached = false;

        debug!("detached connection from fd {}", state.fd);

        state.reactor.deregister(state.token)
    }
}

impl Drop for Attachment {
    /// Best-effort release for attachments dropped without
    /// [`detach`](Self::detach).
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            if state.attached {
                trace!("attachment on fd {} dropped without detach", state.fd);
                let _ = state.reactor.deregister(state.token);
            }
        }
    }
}

/// Registers the combined read/write watcher for a connection socket.
///
/// Read interest starts active, write interest inactive. The dispatch
/// callback upgrades the weak connection reference for the duration of
/// the call; readiness for a dropped connection is skipped.
fn register_watcher(
    reactor: &ReactorHandle,
    socket: RawFd,
    conn: Weak<dyn ConnectionEvents>,
) -> Result<Token> {
    let callback = Box::new(move |event: Event| {
        let Some(conn) = conn.upgrade() else {
            trace!("readiness for a dropped connection, skipping");
            return;
        };

        if event.readable {
            conn.read_ready();
        }
        if event.writable {
            conn.write_ready();
        }
    });

    reactor.register(
        socket,
        Interest {
            read: true,
            write: false,
        },
        callback,
    )
}
