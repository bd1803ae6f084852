use super::command::Command;
use super::event::{Event, Token};
use super::io::{IoCallback, IoWatcher};
use super::poller::common::Interest;
use super::poller::{Poller, Waker};
use crate::error::{Error, Result};

use log::{debug, trace, warn};
use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

/// A single-threaded I/O event loop.
///
/// The reactor owns a platform poller and a registry of watchers, each
/// pairing a file descriptor with a readiness interest and a dispatch
/// callback. The thread that drives [`run`](Self::run) (or
/// [`turn`](Self::turn)) is the only one that touches the registry;
/// every other thread talks to the reactor through a cloneable
/// [`ReactorHandle`].
///
/// Each cycle proceeds in a fixed order:
/// 1. apply all queued commands,
/// 2. dispatch readiness harvested by the previous cycle, masked by the
///    watchers' current interest,
/// 3. block in the poller.
///
/// Applying commands first means a deregistration always wins over
/// readiness that was harvested before it: the stale events are purged
/// and their callback is never invoked again.
///
/// # Examples
///
/// ```rust,ignore
/// let mut reactor = Reactor::new()?;
/// let handle = reactor.handle();
///
/// // hand `handle` to other threads, then drive the loop
/// reactor.run()?;
/// ```
pub struct Reactor {
    /// Command queue receiver; handles hold the sending side.
    receiver: Receiver<Command>,

    /// Prototype handle cloned out to callers.
    handle: ReactorHandle,

    /// Platform poller (epoll or kqueue).
    poller: Poller,

    /// Readiness harvested by the previous poll, not yet dispatched.
    events: Vec<Event>,

    /// Registered watchers, keyed by token.
    watchers: HashMap<Token, IoWatcher>,

    /// Set once [`Command::Shutdown`] has been observed.
    shutdown: bool,
}

impl Reactor {
    /// Creates a new reactor.
    ///
    /// # Errors
    ///
    /// Fails when the platform poller or its wake descriptor cannot be
    /// created.
    pub fn new() -> io::Result<Self> {
        let (sender, receiver) = channel();
        let poller = Poller::new()?;

        let handle = ReactorHandle {
            sender,
            waker: poller.waker(),
            next_token: Arc::new(AtomicUsize::new(0)),
        };

        Ok(Self {
            receiver,
            handle,
            poller,
            events: Vec::with_capacity(64),
            watchers: HashMap::new(),
            shutdown: false,
        })
    }

    /// Returns a handle for submitting commands from any thread.
    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// Number of watchers currently registered.
    ///
    /// Counts applied registrations only; commands still queued are not
    /// reflected until the next cycle.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Drives the loop until shutdown is requested.
    ///
    /// Equivalent to calling [`turn`](Self::turn) without a timeout until
    /// it returns `false`.
    pub fn run(&mut self) -> io::Result<()> {
        while self.turn(None)? {}

        Ok(())
    }

    /// Runs a single cycle: apply commands, dispatch pending readiness,
    /// poll.
    ///
    /// With `timeout` of `None` the poll blocks until an event or a wake
    /// arrives. Returns `Ok(false)` once shutdown has been observed; the
    /// loop must not be driven further.
    pub fn turn(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        if self.shutdown {
            return Ok(false);
        }

        if !self.drain_commands() {
            return Ok(false);
        }

        self.dispatch();

        self.poller.poll(&mut self.events, timeout)?;

        Ok(true)
    }

    /// Applies every queued command. Returns `false` when shutdown was
    /// requested.
    fn drain_commands(&mut self) -> bool {
        while let Ok(command) = self.receiver.try_recv() {
            match command {
                Command::Register {
                    token,
                    fd,
                    interest,
                    callback,
                } => {
                    if let Err(err) = self.poller.register(fd, token, interest) {
                        warn!("failed to register fd {fd} with the poller: {err}");
                        continue;
                    }

                    self.watchers.insert(
                        token,
                        IoWatcher {
                            fd,
                            interest,
                            callback,
                        },
                    );
                    trace!("registered watcher {token} on fd {fd}");
                }

                Command::SetInterest { token, interest } => {
                    let Some(watcher) = self.watchers.get_mut(&token) else {
                        trace!("interest change for unknown watcher {token}");
                        continue;
                    };

                    watcher.interest = interest;
                    let fd = watcher.fd;
                    trace!(
                        "watcher {token} interest now read={} write={}",
                        interest.read, interest.write
                    );

                    if let Err(err) = self.poller.reregister(fd, token, interest) {
                        warn!("failed to update interest of watcher {token}: {err}");
                        self.watchers.remove(&token);
                    }
                }

                Command::Deregister { token } => {
                    if let Some(watcher) = self.watchers.remove(&token) {
                        self.poller.deregister(watcher.fd);
                        self.events.retain(|event| event.token != token);
                        trace!("deregistered watcher {token} from fd {}", watcher.fd);
                    } else {
                        trace!("deregister for unknown watcher {token}");
                    }
                }

                Command::Shutdown => {
                    debug!("reactor shutting down");
                    self.shutdown = true;
                    return false;
                }
            }
        }

        true
    }

    /// Dispatches readiness harvested by the previous poll.
    ///
    /// Events are masked by the watcher's current interest at dispatch
    /// time, so an interest cleared in this cycle suppresses readiness
    /// harvested in the previous one.
    fn dispatch(&mut self) {
        let events: Vec<Event> = self.events.drain(..).collect();

        for event in events {
            let Some(watcher) = self.watchers.get_mut(&event.token) else {
                trace!("readiness for unknown watcher {}", event.token);
                continue;
            };

            let readable = event.readable && watcher.interest.read;
            let writable = event.writable && watcher.interest.write;

            if !readable && !writable {
                continue;
            }

            (watcher.callback)(Event {
                token: event.token,
                readable,
                writable,
            });
        }
    }
}

/// Cloneable, thread-safe handle to a [`Reactor`].
///
/// All watcher mutations go through the handle as commands; the reactor
/// thread applies them at the start of its next cycle. Every submission
/// signals the reactor's wake descriptor, so a loop blocked in its poll
/// re-evaluates watcher state promptly instead of waiting for an
/// unrelated event.
#[derive(Clone)]
pub struct ReactorHandle {
    /// Command queue sender.
    sender: Sender<Command>,

    /// Wake handle shared with the poller.
    waker: Arc<Waker>,

    /// Source of watcher tokens, shared by all handle clones.
    next_token: Arc<AtomicUsize>,
}

impl ReactorHandle {
    /// Registers a file descriptor and returns the token addressing it.
    ///
    /// The descriptor must be non-blocking and stay open until the
    /// watcher is deregistered. `callback` runs on the reactor thread
    /// whenever readiness matching `interest` is observed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReactorClosed`] when the reactor is gone.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let token = handle.register(
    ///     socket.as_raw_fd(),
    ///     Interest { read: true, write: false },
    ///     Box::new(|event| println!("ready: {event:?}")),
    /// )?;
    /// ```
    pub fn register(&self, fd: RawFd, interest: Interest, callback: IoCallback) -> Result<Token> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        self.send(Command::Register {
            token,
            fd,
            interest,
            callback,
        })?;

        Ok(token)
    }

    /// Replaces the readiness interest of a registered watcher.
    ///
    /// Unknown tokens are tolerated by the reactor; a toggle racing a
    /// deregistration is dropped loop-side.
    pub fn set_interest(&self, token: Token, interest: Interest) -> Result<()> {
        self.send(Command::SetInterest { token, interest })
    }

    /// Removes a watcher and purges its undispatched readiness.
    pub fn deregister(&self, token: Token) -> Result<()> {
        self.send(Command::Deregister { token })
    }

    /// Asks the reactor to exit its loop at the start of the next cycle.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Interrupts a blocking poll without submitting a command.
    pub fn wake(&self) {
        self.waker.wake();
    }

    fn send(&self, command: Command) -> Result<()> {
        self.sender.send(command).map_err(|_| Error::ReactorClosed)?;
        self.waker.wake();

        Ok(())
    }
}
