//! Connection dispatcher
//!
//! One accept thread admits connections into a bounded [`SlotTable`] and
//! gives each admitted connection its own handler thread. When every slot
//! is taken the connection is closed without a response.
//!
//! Shutdown is a drain: the accept loop stops and drops the listener, then
//! every handler that was running is joined. In-flight transfers finish;
//! the per-stream timeouts bound how long a stalled peer can delay this.

use std::io::{self, BufReader, Cursor, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tabvault_core::{TabError, TabResult};

use crate::config::ServerConfig;
use crate::handlers;
use crate::protocol::{RequestKind, PREFIX_LEN};
use crate::slots::SlotTable;

/// A bound, not yet running, transfer server.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
}

impl Server {
    /// Validate `config`, create the data directory, and bind the listener.
    pub fn bind(config: ServerConfig) -> TabResult<Self> {
        config.validate().map_err(|reason| TabError::Io {
            path: None,
            kind: io::ErrorKind::InvalidInput,
            message: format!("Invalid server configuration: {}", reason),
        })?;

        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| TabError::io_at(&config.data_dir, e, "Failed to create data directory"))?;

        let listener = TcpListener::bind(config.bind_addr).map_err(|e| TabError::Io {
            path: None,
            kind: e.kind(),
            message: format!("Failed to bind {}: {}", config.bind_addr, e),
        })?;
        let local_addr = listener.local_addr()?;

        Ok(Self { listener, local_addr, config })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawn the accept thread.
    pub fn start(self) -> TabResult<ServerHandle> {
        self.listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let slots = SlotTable::new(self.config.pool_size);
        let local_addr = self.local_addr;

        let ctx = Arc::new(Context {
            data_dir: self.config.data_dir.clone(),
            config: self.config,
        });
        let accept_shutdown = Arc::clone(&shutdown);
        let accept_slots = Arc::clone(&slots);
        let listener = self.listener;

        let accept = thread::Builder::new()
            .name("tabvault-accept".to_string())
            .spawn(move || accept_loop(listener, ctx, accept_slots, accept_shutdown))
            .map_err(|e| TabError::Io {
                path: None,
                kind: io::ErrorKind::Other,
                message: format!("Failed to spawn accept thread: {}", e),
            })?;

        log::info!("Listening on {} ({} handler slots)", local_addr, slots.capacity());

        Ok(ServerHandle {
            shutdown,
            accept: Some(accept),
            slots,
            local_addr,
        })
    }
}

/// Handle to a running server. Dropping it performs [`ServerHandle::shutdown`].
pub struct ServerHandle {
    shutdown: Arc<AtomicBool>,
    accept: Option<thread::JoinHandle<()>>,
    slots: Arc<SlotTable>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections being served right now.
    pub fn active_connections(&self) -> usize {
        self.slots.active_count()
    }

    /// Stop accepting, then wait for every in-flight handler to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(accept) = self.accept.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::Release);
        let _ = accept.join();

        let started = Instant::now();
        let workers = self.slots.take_workers();
        let active = self.slots.active_peers();
        log::info!("Shutting down: draining {} active connection(s)", active.len());
        for (index, peer) in &active {
            log::debug!("Waiting on {} in slot {}", peer, index);
        }
        for worker in workers {
            let _ = worker.join();
        }
        log::info!("Shutdown complete after {:?}", started.elapsed());
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Context {
    data_dir: PathBuf,
    config: ServerConfig,
}

fn accept_loop(listener: TcpListener, ctx: Arc<Context>, slots: Arc<SlotTable>, shutdown: Arc<AtomicBool>) {
    let poll = ctx.config.accept_poll_interval;
    while !shutdown.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => dispatch(stream, peer, &ctx, &slots),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(poll),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                log::warn!("accept failed: {}", e);
                thread::sleep(poll);
            }
        }
    }
    drop(listener);
    log::info!("Stopped accepting connections");
}

fn dispatch(stream: TcpStream, peer: SocketAddr, ctx: &Arc<Context>, slots: &Arc<SlotTable>) {
    let Some(lease) = slots.reserve(peer) else {
        log::warn!("Rejected {}: all {} handler slots busy", peer, slots.capacity());
        let _ = stream.shutdown(Shutdown::Both);
        return;
    };
    let index = lease.index();
    log::info!("Accepted {} into slot {}", peer, index);

    let ctx = Arc::clone(ctx);
    let spawned = thread::Builder::new()
        .name(format!("tabvault-conn-{}", index))
        .spawn(move || {
            let _lease = lease;
            let started = Instant::now();
            match serve(stream, &ctx) {
                Ok(summary) => log::info!("{} {} ({:?})", peer, summary, started.elapsed()),
                Err(e) => log::error!("{} request failed: {}", peer, e),
            }
        });

    match spawned {
        Ok(worker) => slots.attach(index, worker),
        // The closure, and with it the lease and stream, is dropped
        Err(e) => log::error!("Failed to spawn handler for {}: {}", peer, e),
    }
}

/// Serve one request. Returns a one-line summary for the log.
fn serve(stream: TcpStream, ctx: &Context) -> TabResult<String> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(ctx.config.read_timeout))?;
    stream.set_write_timeout(Some(ctx.config.write_timeout))?;
    let _ = stream.set_nodelay(true);

    let mut prefix = [0u8; PREFIX_LEN];
    if let Err(e) = (&stream).read_exact(&mut prefix) {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Ok("closed without a request".to_string());
        }
        return Err(e.into());
    }

    let kind = RequestKind::classify(&prefix);
    let mut input = Cursor::new(prefix).chain(&stream);
    let mut out = &stream;

    let summary = match kind {
        RequestKind::List => {
            let mut reader = BufReader::new(input);
            handlers::read_command(&mut reader)?;
            let count = handlers::handle_list(&ctx.data_dir, &mut out)?;
            format!("LIST: {} file(s)", count)
        }
        RequestKind::Get => {
            let mut reader = BufReader::new(input);
            let command = handlers::read_command(&mut reader)?;
            let sent = handlers::handle_get(&ctx.data_dir, &command, &mut out, &ctx.config)?;
            format!("{}: {} bytes", command, sent)
        }
        RequestKind::Push => {
            let ack = handlers::handle_push(&ctx.data_dir, &mut input, &mut out, &ctx.config)?;
            format!("push: {}", ack.to_line())
        }
    };

    out.flush()?;
    let _ = stream.shutdown(Shutdown::Write);
    Ok(summary)
}
