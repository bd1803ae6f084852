//! Reactor core and event handling.
//!
//! This module implements the externally owned event loop the adapter
//! binds connections to. The reactor is responsible for:
//! - driving I/O readiness through the platform poller,
//! - applying watcher commands submitted from other threads,
//! - invoking watcher callbacks serially on the loop thread.
//!
//! Applications own the [`Reactor`] value and drive it themselves; every
//! other component interacts with it through a [`ReactorHandle`].

mod core;

pub(crate) mod command;
pub(crate) mod event;
pub(crate) mod io;
pub(crate) mod poller;

pub use self::core::{Reactor, ReactorHandle};
pub use self::event::{Event, Token};
pub use self::io::IoCallback;
pub use self::poller::common::Interest;
