//! Single-connection TCP echo server.
//!
//! Accepts one client, attaches its socket to a reactor, and echoes
//! every byte back. The write path shows the intended back-pressure
//! dance: buffer on read, enable write interest, drain on write
//! readiness, disable write interest once empty. EOF detaches the
//! connection and shuts the loop down.
//!
//! Try it with `nc 127.0.0.1 7000`.

use clap::Parser;
use ligare::{Attachment, ConnectionEvents, Reactor, ReactorHandle};
use log::{info, warn};

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "echo", about = "Echo one TCP connection through a reactor")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:7000")]
    listen: String,
}

struct EchoConn {
    socket: TcpStream,
    pending: Mutex<VecDeque<u8>>,
    attachment: Mutex<Option<Attachment>>,
    reactor: ReactorHandle,
}

impl EchoConn {
    /// Detach and stop the loop; used on EOF and on read/write errors.
    fn finish(&self) {
        if let Some(attachment) = self.attachment.lock().unwrap().take() {
            let _ = attachment.detach();
        }
        let _ = self.reactor.shutdown();
    }
}

impl ConnectionEvents for EchoConn {
    fn read_ready(&self) {
        let mut chunk = [0u8; 4096];
        let mut pending = self.pending.lock().unwrap();

        loop {
            match (&self.socket).read(&mut chunk) {
                Ok(0) => {
                    info!("client closed the connection");
                    drop(pending);
                    self.finish();
                    return;
                }
                Ok(n) => pending.extend(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!("read failed: {err}");
                    drop(pending);
                    self.finish();
                    return;
                }
            }
        }

        if !pending.is_empty() {
            if let Some(attachment) = &*self.attachment.lock().unwrap() {
                let _ = attachment.write(true);
            }
        }
    }

    fn write_ready(&self) {
        let mut pending = self.pending.lock().unwrap();

        while !pending.is_empty() {
            let (front, _) = pending.as_slices();
            match (&self.socket).write(front) {
                Ok(0) => break,
                Ok(n) => {
                    pending.drain(..n);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!("write failed: {err}");
                    drop(pending);
                    self.finish();
                    return;
                }
            }
        }

        if pending.is_empty() {
            if let Some(attachment) = &*self.attachment.lock().unwrap() {
                let _ = attachment.write(false);
            }
        }
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let listener = TcpListener::bind(&args.listen)?;
    info!("listening on {}", listener.local_addr()?);

    let (socket, peer) = listener.accept()?;
    socket.set_nonblocking(true)?;
    info!("client connected from {peer}");

    let mut reactor = Reactor::new()?;
    let handle = reactor.handle();

    let fd = socket.as_raw_fd();
    let conn = Arc::new(EchoConn {
        socket,
        pending: Mutex::new(VecDeque::new()),
        attachment: Mutex::new(None),
        reactor: handle.clone(),
    });

    let mut slot = None;
    Attachment::attach(&mut slot, &handle, &conn, fd).expect("attach failed");
    *conn.attachment.lock().unwrap() = slot.take();

    reactor.run()?;
    info!("echo session finished");

    Ok(())
}
