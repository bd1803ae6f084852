//! Measures how fast framed messages flow through an attached socket.
//!
//! A producer thread streams length-prefixed messages over a socket
//! pair as fast as the kernel accepts them. The consumer side is
//! attached to a reactor running on its own thread, and reassembles
//! frames from the read hook. The main thread prints a running count
//! once per second and a summary at the end.

use clap::Parser;
use ligare::{Attachment, ConnectionEvents, Reactor, ReactorHandle};
use log::{info, warn};

use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "throughput", about = "Stream framed messages through a reactor")]
struct Args {
    /// Number of messages to send.
    #[arg(long, default_value_t = 100_000)]
    messages: usize,

    /// Payload size per message, in bytes.
    #[arg(long, default_value_t = 128)]
    payload: usize,
}

struct Consumer {
    socket: UnixStream,
    buf: Mutex<Vec<u8>>,
    received: AtomicUsize,
    done: AtomicBool,
    attachment: Mutex<Option<Attachment>>,
    reactor: ReactorHandle,
}

impl Consumer {
    fn finish(&self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(attachment) = self.attachment.lock().unwrap().take() {
            let _ = attachment.detach();
        }
        let _ = self.reactor.shutdown();
    }
}

impl ConnectionEvents for Consumer {
    fn read_ready(&self) {
        let mut chunk = [0u8; 16 * 1024];
        let mut buf = self.buf.lock().unwrap();
        let mut eof = false;

        loop {
            match (&self.socket).read(&mut chunk) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!("read failed: {err}");
                    eof = true;
                    break;
                }
            }
        }

        // Count every complete frame: a 4-byte big-endian length, then
        // that many payload bytes.
        let mut consumed = 0;
        while buf.len() - consumed >= 4 {
            let header: [u8; 4] = buf[consumed..consumed + 4].try_into().unwrap();
            let len = u32::from_be_bytes(header) as usize;
            if buf.len() - consumed < 4 + len {
                break;
            }
            consumed += 4 + len;
            self.received.fetch_add(1, Ordering::Relaxed);
        }
        buf.drain(..consumed);
        drop(buf);

        if eof {
            self.finish();
        }
    }

    fn write_ready(&self) {}
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let (producer, consumer) = UnixStream::pair()?;
    consumer.set_nonblocking(true)?;

    let total = args.messages;
    let payload = vec![0x2au8; args.payload];

    info!("producing {total} messages of {} bytes", args.payload);
    let producer_thread = thread::spawn(move || -> std::io::Result<()> {
        let mut producer = producer;
        let header = (payload.len() as u32).to_be_bytes();
        for _ in 0..total {
            producer.write_all(&header)?;
            producer.write_all(&payload)?;
        }
        // Dropping the producer end delivers EOF to the consumer.
        Ok(())
    });

    let mut reactor = Reactor::new()?;
    let handle = reactor.handle();

    let conn = Arc::new(Consumer {
        socket: consumer,
        buf: Mutex::new(Vec::new()),
        received: AtomicUsize::new(0),
        done: AtomicBool::new(false),
        attachment: Mutex::new(None),
        reactor: handle.clone(),
    });
    let fd = conn.socket.as_raw_fd();

    let mut slot = None;
    Attachment::attach(&mut slot, &handle, &conn, fd).expect("attach failed");
    *conn.attachment.lock().unwrap() = slot.take();

    let loop_thread = thread::spawn(move || reactor.run());

    let start = Instant::now();
    let mut last = 0;
    let mut ticks = 0u32;
    while !conn.done.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
        ticks += 1;
        if ticks % 10 == 0 {
            let received = conn.received.load(Ordering::Relaxed);
            println!("received {received} messages (+{} msg/s)", received - last);
            last = received;
        }
    }

    loop_thread.join().expect("loop thread panicked")?;
    producer_thread.join().expect("producer thread panicked")?;

    let elapsed = start.elapsed();
    let received = conn.received.load(Ordering::Relaxed);
    let rate = received as f64 / elapsed.as_secs_f64();
    let volume = (received * (args.payload + 4)) as f64 / (1024.0 * 1024.0);
    println!(
        "received {received}/{total} messages in {:.2}s ({rate:.0} msg/s, {volume:.2} MiB)",
        elapsed.as_secs_f64()
    );

    Ok(())
}
