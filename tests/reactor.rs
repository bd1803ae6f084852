use ligare::{Error, Event, Interest, Reactor};

use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

fn pair() -> (UnixStream, UnixStream) {
    let (a, b) = UnixStream::pair().expect("socketpair failed");
    a.set_nonblocking(true).expect("set_nonblocking failed");
    b.set_nonblocking(true).expect("set_nonblocking failed");

    (a, b)
}

fn spin(reactor: &mut Reactor, turns: usize) {
    for _ in 0..turns {
        reactor
            .turn(Some(Duration::from_millis(10)))
            .expect("reactor turn failed");
    }
}

#[test]
fn test_read_readiness_dispatches_once_per_cycle() {
    let mut reactor = Reactor::new().expect("reactor creation failed");
    let handle = reactor.handle();

    let (a, mut b) = pair();
    let count = Arc::new(AtomicUsize::new(0));

    let callback = {
        let count = count.clone();
        let drain = a.try_clone().expect("clone failed");
        Box::new(move |_event: Event| {
            let mut buf = [0u8; 256];
            let _ = (&drain).read(&mut buf);
            count.fetch_add(1, Ordering::SeqCst);
        })
    };

    handle
        .register(
            a.as_raw_fd(),
            Interest {
                read: true,
                write: false,
            },
            callback,
        )
        .expect("register failed");

    b.write_all(b"ping").expect("write failed");

    // First turn applies the registration and harvests; the second
    // dispatches. The callback drains the socket, so later turns must
    // not re-deliver.
    spin(&mut reactor, 2);
    assert_eq!(
        count.load(Ordering::SeqCst),
        1,
        "one readiness notification should dispatch exactly one callback"
    );

    spin(&mut reactor, 3);
    assert_eq!(
        count.load(Ordering::SeqCst),
        1,
        "a drained socket should not re-deliver readiness"
    );
}

#[test]
fn test_write_readiness_masked_until_enabled() {
    let mut reactor = Reactor::new().expect("reactor creation failed");
    let handle = reactor.handle();

    let (a, _b) = pair();
    let writables = Arc::new(AtomicUsize::new(0));

    let callback = {
        let writables = writables.clone();
        Box::new(move |event: Event| {
            if event.writable {
                writables.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let token = handle
        .register(
            a.as_raw_fd(),
            Interest {
                read: true,
                write: false,
            },
            callback,
        )
        .expect("register failed");

    spin(&mut reactor, 3);
    assert_eq!(
        writables.load(Ordering::SeqCst),
        0,
        "an always-writable socket must stay silent while write interest is off"
    );

    handle
        .set_interest(
            token,
            Interest {
                read: true,
                write: true,
            },
        )
        .expect("set_interest failed");

    spin(&mut reactor, 3);
    assert!(
        writables.load(Ordering::SeqCst) >= 1,
        "write readiness should flow once write interest is enabled"
    );

    handle
        .set_interest(
            token,
            Interest {
                read: true,
                write: false,
            },
        )
        .expect("set_interest failed");

    // One turn to apply the toggle; harvested-but-undispatched write
    // readiness must be suppressed by the interest mask.
    spin(&mut reactor, 1);
    let settled = writables.load(Ordering::SeqCst);

    spin(&mut reactor, 3);
    assert_eq!(
        writables.load(Ordering::SeqCst),
        settled,
        "write readiness should stop after write interest is disabled"
    );
}

#[test]
fn test_deregister_purges_pending_readiness() {
    let mut reactor = Reactor::new().expect("reactor creation failed");
    let handle = reactor.handle();

    let (a, mut b) = pair();
    let count = Arc::new(AtomicUsize::new(0));

    let callback = {
        let count = count.clone();
        Box::new(move |_event: Event| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    };

    let token = handle
        .register(
            a.as_raw_fd(),
            Interest {
                read: true,
                write: false,
            },
            callback,
        )
        .expect("register failed");

    spin(&mut reactor, 1);
    assert_eq!(reactor.watcher_count(), 1, "registration should be applied");

    // Make the socket readable so the next poll harvests an event, then
    // deregister before it can be dispatched.
    b.write_all(b"stale").expect("write failed");
    spin(&mut reactor, 1);

    handle.deregister(token).expect("deregister failed");
    spin(&mut reactor, 3);

    assert_eq!(
        count.load(Ordering::SeqCst),
        0,
        "readiness harvested before a deregistration must never dispatch"
    );
    assert_eq!(
        reactor.watcher_count(),
        0,
        "deregistration should empty the registry"
    );
}

#[test]
fn test_callback_can_deregister_itself() {
    let mut reactor = Reactor::new().expect("reactor creation failed");
    let handle = reactor.handle();

    let (a, mut b) = pair();
    let count = Arc::new(AtomicUsize::new(0));
    let token_cell = Arc::new(AtomicUsize::new(usize::MAX));

    let callback = {
        let count = count.clone();
        let token_cell = token_cell.clone();
        let handle = handle.clone();
        Box::new(move |_event: Event| {
            count.fetch_add(1, Ordering::SeqCst);
            let _ = handle.deregister(token_cell.load(Ordering::SeqCst));
        })
    };

    let token = handle
        .register(
            a.as_raw_fd(),
            Interest {
                read: true,
                write: false,
            },
            callback,
        )
        .expect("register failed");
    token_cell.store(token, Ordering::SeqCst);

    b.write_all(b"ping").expect("write failed");

    spin(&mut reactor, 6);
    assert_eq!(
        count.load(Ordering::SeqCst),
        1,
        "a callback deregistering itself should fire exactly once"
    );
    assert_eq!(
        reactor.watcher_count(),
        0,
        "self-deregistration should empty the registry"
    );
}

#[test]
fn test_foreign_thread_toggle_interrupts_blocked_poll() {
    let mut reactor = Reactor::new().expect("reactor creation failed");
    let handle = reactor.handle();

    let (a, _b) = pair();
    let (tx, rx) = mpsc::channel();

    let callback = {
        let tx = tx.clone();
        Box::new(move |event: Event| {
            if event.writable {
                let _ = tx.send(());
            }
        })
    };

    let token = handle
        .register(
            a.as_raw_fd(),
            Interest {
                read: true,
                write: false,
            },
            callback,
        )
        .expect("register failed");

    let loop_thread = thread::spawn(move || {
        reactor.run().expect("reactor run failed");
        reactor
    });

    // The socket never becomes readable, so without the wake signal the
    // loop would stay blocked in its poll forever.
    handle
        .set_interest(
            token,
            Interest {
                read: true,
                write: true,
            },
        )
        .expect("set_interest failed");

    rx.recv_timeout(Duration::from_secs(2))
        .expect("write readiness should arrive within one wake cycle");

    handle.shutdown().expect("shutdown failed");
    let reactor = loop_thread.join().expect("loop thread panicked");

    assert_eq!(
        reactor.watcher_count(),
        1,
        "shutdown should not disturb registered watchers"
    );
}

#[test]
fn test_shutdown_unblocks_run() {
    let mut reactor = Reactor::new().expect("reactor creation failed");
    let handle = reactor.handle();

    let (tx, rx) = mpsc::channel();
    let loop_thread = thread::spawn(move || {
        let result = reactor.run();
        let _ = tx.send(result);
    });

    handle.shutdown().expect("shutdown failed");

    let result = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("run should return promptly after shutdown");
    assert!(result.is_ok(), "run should exit cleanly on shutdown");

    loop_thread.join().expect("loop thread panicked");

    // Waking a loop that already exited must stay harmless.
    handle.wake();
}

#[test]
fn test_turn_respects_timeout_when_idle() {
    let mut reactor = Reactor::new().expect("reactor creation failed");

    let start = Instant::now();
    let more = reactor
        .turn(Some(Duration::from_millis(50)))
        .expect("reactor turn failed");
    let elapsed = start.elapsed();

    assert!(more, "an idle turn should report the loop as still open");
    assert!(
        elapsed >= Duration::from_millis(40),
        "idle turn returned after {elapsed:?}, expected it to wait for the timeout"
    );
    assert!(
        elapsed < Duration::from_secs(5),
        "idle turn should not overshoot the timeout grossly"
    );
}

#[test]
fn test_commands_for_unknown_tokens_are_tolerated() {
    let mut reactor = Reactor::new().expect("reactor creation failed");
    let handle = reactor.handle();

    handle
        .set_interest(
            4096,
            Interest {
                read: true,
                write: true,
            },
        )
        .expect("set_interest for an unknown token should queue fine");
    handle
        .deregister(4096)
        .expect("deregister for an unknown token should queue fine");

    spin(&mut reactor, 2);
    assert_eq!(
        reactor.watcher_count(),
        0,
        "stray commands must not materialize watchers"
    );
}

#[test]
fn test_handle_reports_closed_after_reactor_drop() {
    let handle = {
        let reactor = Reactor::new().expect("reactor creation failed");
        reactor.handle()
    };

    let (a, _b) = pair();

    let result = handle.register(
        a.as_raw_fd(),
        Interest {
            read: true,
            write: false,
        },
        Box::new(|_event: Event| {}),
    );
    assert!(
        matches!(result, Err(Error::ReactorClosed)),
        "register on a dropped reactor should report it closed"
    );

    assert!(
        matches!(
            handle.set_interest(
                0,
                Interest {
                    read: false,
                    write: false
                }
            ),
            Err(Error::ReactorClosed)
        ),
        "set_interest on a dropped reactor should report it closed"
    );
    assert!(
        matches!(handle.deregister(0), Err(Error::ReactorClosed)),
        "deregister on a dropped reactor should report it closed"
    );
    assert!(
        matches!(handle.shutdown(), Err(Error::ReactorClosed)),
        "shutdown on a dropped reactor should report it closed"
    );
}
