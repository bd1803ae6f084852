//! macOS `kqueue`-based poller implementation.
//!
//! This module provides the macOS backend for the reactor. It is
//! functionally equivalent to the Linux `epoll` poller and exposes
//! the same interface.
//!
//! Responsibilities:
//! - Register file descriptors with read/write interests
//! - Block waiting for I/O readiness
//! - Wake the reactor when new commands are submitted
//! - Support bounded waits via poll timeouts
//!
//! Read and write readiness are separate kqueue filters; both are added
//! at registration time and enabled or disabled to match the interest.
//! The wake-up signal is a self-pipe whose read end stays registered for
//! the poller's whole lifetime.
//!
//! This backend is selected automatically on macOS targets.

use super::common::Interest;
use crate::reactor::event::Event;
use crate::reactor::poller::Waker;
use crate::reactor::poller::platform::{sys_close, sys_read, sys_write};

use libc::{
    EV_ADD, EV_DELETE, EV_DISABLE, EV_ENABLE, EVFILT_READ, EVFILT_WRITE, F_GETFL, F_SETFD,
    F_SETFL, FD_CLOEXEC, O_NONBLOCK, fcntl, kevent, kqueue, pipe, timespec,
};
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Duration;

/// Reserved token used internally for the wake-up event.
///
/// Watcher tokens are allocated by counting up from zero, so `usize::MAX`
/// can never collide with one.
const WAKE_TOKEN: usize = usize::MAX;

/// macOS `kqueue` poller.
///
/// This poller owns:
/// - a `kqueue` instance,
/// - a self-pipe used as a wake-up signal,
/// - a reusable event buffer.
///
/// The wake-up mechanism allows other threads to interrupt a blocking
/// `kevent()` call whenever they submit a command.
pub(crate) struct KqueuePoller {
    /// Kqueue file descriptor.
    kq: RawFd,

    /// Reusable buffer for kqueue events.
    events: Vec<kevent>,

    /// Waker wrapping the write end of the wake pipe.
    waker: Arc<Waker>,

    /// Read end of the wake pipe, registered with `WAKE_TOKEN`.
    wake_rx: RawFd,
}

unsafe impl Send for KqueuePoller {}

impl Waker {
    /// Wake the poller.
    ///
    /// This writes to the wake pipe, causing `kevent` to return
    /// immediately.
    pub(crate) fn wake(&self) {
        sys_write(self.0, &1u64.to_ne_bytes());
    }
}

impl KqueuePoller {
    /// Create a new `KqueuePoller`.
    ///
    /// This:
    /// - creates the kqueue instance,
    /// - creates a non-blocking wake pipe,
    /// - registers the pipe's read end as a persistent wake source.
    pub(crate) fn new() -> io::Result<Self> {
        let kq = unsafe { kqueue() };
        if kq < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut fds = [0 as RawFd; 2];
        let rc = unsafe { pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            sys_close(kq);
            return Err(err);
        }

        let (wake_rx, wake_tx) = (fds[0], fds[1]);

        let cleanup = |err: io::Error| {
            sys_close(wake_rx);
            sys_close(wake_tx);
            sys_close(kq);
            err
        };

        if let Err(err) = prepare_pipe_fd(wake_rx).and_then(|_| prepare_pipe_fd(wake_tx)) {
            return Err(cleanup(err));
        }

        let change = kevent {
            ident: wake_rx as usize,
            filter: EVFILT_READ,
            flags: EV_ADD | EV_ENABLE,
            fflags: 0,
            data: 0,
            udata: WAKE_TOKEN as *mut _,
        };

        let rc = unsafe { kevent(kq, &change, 1, std::ptr::null_mut(), 0, std::ptr::null()) };
        if rc < 0 {
            return Err(cleanup(io::Error::last_os_error()));
        }

        Ok(Self {
            kq,
            events: vec![unsafe { std::mem::zeroed() }; 64],
            waker: Arc::new(Waker(wake_tx)),
            wake_rx,
        })
    }

    /// Return the poller waker.
    ///
    /// The reactor shares this with its handles so command submission can
    /// interrupt `kevent`.
    pub(crate) fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    /// Register a file descriptor with the poller.
    ///
    /// Both filters are always added; the interest decides which start
    /// out enabled.
    pub(crate) fn register(&self, fd: RawFd, token: usize, interest: Interest) -> io::Result<()> {
        self.apply(fd, token, interest)
    }

    /// Update interest flags for an already registered descriptor.
    pub(crate) fn reregister(&self, fd: RawFd, token: usize, interest: Interest) -> io::Result<()> {
        self.apply(fd, token, interest)
    }

    fn apply(&self, fd: RawFd, token: usize, interest: Interest) -> io::Result<()> {
        let changes = [
            filter_event(fd, token, EVFILT_READ, interest.read),
            filter_event(fd, token, EVFILT_WRITE, interest.write),
        ];

        let rc = unsafe {
            kevent(
                self.kq,
                changes.as_ptr(),
                changes.len() as i32,
                std::ptr::null_mut(),
                0,
                std::ptr::null(),
            )
        };

        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Remove a file descriptor from the poller.
    ///
    /// Errors are ignored; the descriptor may already have been closed,
    /// which removes its filters implicitly.
    pub(crate) fn deregister(&self, fd: RawFd) {
        let changes = [
            kevent {
                ident: fd as usize,
                filter: EVFILT_READ,
                flags: EV_DELETE,
                fflags: 0,
                data: 0,
                udata: std::ptr::null_mut(),
            },
            kevent {
                ident: fd as usize,
                filter: EVFILT_WRITE,
                flags: EV_DELETE,
                fflags: 0,
                data: 0,
                udata: std::ptr::null_mut(),
            },
        ];

        unsafe {
            kevent(
                self.kq,
                changes.as_ptr(),
                changes.len() as i32,
                std::ptr::null_mut(),
                0,
                std::ptr::null(),
            );
        }
    }

    /// Poll for I/O readiness events.
    ///
    /// Blocks until:
    /// - at least one file descriptor becomes ready,
    /// - the wake event is triggered,
    /// - or the optional timeout expires.
    pub(crate) fn poll(
        &mut self,
        events: &mut Vec<Event>,
        timeout: Option<Duration>,
    ) -> io::Result<()> {
        let ts = timeout.map(|t| timespec {
            tv_sec: t.as_secs() as libc::time_t,
            tv_nsec: t.subsec_nanos() as libc::c_long,
        });

        let ts_ptr = ts
            .as_ref()
            .map(|ts| ts as *const timespec)
            .unwrap_or(std::ptr::null());

        let n = unsafe {
            kevent(
                self.kq,
                std::ptr::null(),
                0,
                self.events.as_mut_ptr(),
                self.events.len() as i32,
                ts_ptr,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        events.clear();

        for ev in &self.events[..n as usize] {
            // Wake-up event; drain the pipe completely.
            if ev.udata as usize == WAKE_TOKEN {
                let mut buf = [0u8; 64];
                while sys_read(self.wake_rx, &mut buf) > 0 {}
                continue;
            }

            let token = ev.udata as usize;

            let readable = ev.filter == EVFILT_READ;
            let writable = ev.filter == EVFILT_WRITE;

            if let Some(e) = events.iter_mut().find(|e| e.token == token) {
                e.readable |= readable;
                e.writable |= writable;
            } else {
                events.push(Event {
                    token,
                    readable,
                    writable,
                });
            }
        }

        Ok(())
    }
}

impl Drop for KqueuePoller {
    fn drop(&mut self) {
        sys_close(self.wake_rx);
        sys_close(self.kq);
    }
}

fn filter_event(fd: RawFd, token: usize, filter: i16, enabled: bool) -> kevent {
    kevent {
        ident: fd as usize,
        filter,
        flags: EV_ADD | if enabled { EV_ENABLE } else { EV_DISABLE },
        fflags: 0,
        data: 0,
        udata: token as *mut _,
    }
}

/// Sets a pipe descriptor to non-blocking, close-on-exec mode.
fn prepare_pipe_fd(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { fcntl(fd, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = unsafe { fcntl(fd, F_SETFL, flags | O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = unsafe { fcntl(fd, F_SETFD, FD_CLOEXEC) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}
