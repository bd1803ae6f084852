use super::event::Token;
use super::io::IoCallback;
use super::poller::common::Interest;

use std::os::fd::RawFd;

pub(crate) enum Command {
    Register {
        token: Token,
        fd: RawFd,
        interest: Interest,
        callback: IoCallback,
    },
    SetInterest {
        token: Token,
        interest: Interest,
    },
    Deregister {
        token: Token,
    },
    Shutdown,
}
