//! # Ligare
//!
//! **Ligare** binds messaging-client connections to an externally owned
//! event loop. Instead of the client library spinning up its own polling
//! thread per connection, the application runs one single-threaded
//! [`Reactor`] and attaches every connection to it; the reactor calls
//! back into each connection when its socket is ready.
//!
//! The crate has two halves:
//!
//! - A **reactor**: a from-scratch, single-threaded event loop over
//!   epoll (Linux) or kqueue (macOS), driven by the application. All
//!   watcher mutations arrive over a command queue from a cloneable
//!   [`ReactorHandle`] and are applied at the start of each cycle, so
//!   callbacks always run serially on the loop thread.
//! - An **adapter**: the [`Attachment`] type, which owns the binding of
//!   one connection to one reactor. It registers the socket with read
//!   interest on attach, mirrors the client's read/write toggles into
//!   the loop, rebinds on reconnect, and releases everything on detach.
//!
//! Connections participate by implementing [`ConnectionEvents`], two
//! non-blocking hooks invoked on the loop thread.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ligare::{Attachment, ConnectionEvents, Reactor};
//! use std::os::fd::AsRawFd;
//! use std::sync::Arc;
//!
//! struct Conn { /* socket, buffers, ... */ }
//!
//! impl ConnectionEvents for Conn {
//!     fn read_ready(&self) { /* read until WouldBlock */ }
//!     fn write_ready(&self) { /* drain the output buffer */ }
//! }
//!
//! let mut reactor = Reactor::new()?;
//! let handle = reactor.handle();
//!
//! let conn = Arc::new(Conn { /* ... */ });
//! let mut slot = None;
//! Attachment::attach(&mut slot, &handle, &conn, socket.as_raw_fd())?;
//!
//! // The reactor thread is wherever the application wants it.
//! reactor.run()?;
//! ```
//!
//! ## Threading
//!
//! The reactor thread is the only one that touches watcher state; every
//! entry point on [`Attachment`] and [`ReactorHandle`] may be called
//! from any thread and wakes a blocked poll after queueing its command.
//! Hooks run serially, never concurrently with each other.

mod adapter;
mod connection;
mod error;
mod reactor;

pub use adapter::Attachment;
pub use connection::ConnectionEvents;
pub use error::{Error, Result};
pub use reactor::{Event, Interest, IoCallback, Reactor, ReactorHandle, Token};
