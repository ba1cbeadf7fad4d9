//! Connection identity, tracking and the raw (non-HTTP) serve loop.
//!
//! # Responsibilities
//! - Generate unique connection IDs (the `fd` listeners see)
//! - Keep an outbound queue per open connection for `send` / `close`
//! - Fire `connect`, `receive` and `close` around a connection's lifetime
//!
//! # Design Decisions
//! - The handler runs in its own task; a panicking listener ends the
//!   connection but `close` still fires

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use hyper::body::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::RuntimeError;
use crate::events::{Descriptor, Payload};
use crate::lifecycle::shutdown::ShutdownListener;
use crate::observability::metrics;
use crate::runtime::listener::ConnectionPermit;
use crate::runtime::{RuntimeSettings, TcpRuntime};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Instruction queued for a live connection.
#[derive(Debug)]
pub(crate) enum Outbound {
    Data(Bytes),
    Close,
}

/// Open connections by id.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTable {
    senders: Arc<DashMap<u64, mpsc::UnboundedSender<Outbound>>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. The entry is removed when the guard drops.
    pub(crate) fn track(&self, id: ConnectionId) -> (ConnectionGuard, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(id.as_u64(), tx);
        metrics::set_active_connections(self.senders.len());
        (
            ConnectionGuard {
                table: self.clone(),
                id,
            },
            rx,
        )
    }

    pub(crate) fn push(&self, fd: u64, message: Outbound) -> Result<(), RuntimeError> {
        let sender = self
            .senders
            .get(&fd)
            .map(|entry| entry.value().clone())
            .ok_or(RuntimeError::UnknownConnection(fd))?;
        sender
            .send(message)
            .map_err(|_| RuntimeError::UnknownConnection(fd))
    }

    pub fn active_count(&self) -> usize {
        self.senders.len()
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub(crate) struct ConnectionGuard {
    table: ConnectionTable,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.table.senders.remove(&self.id.as_u64());
        metrics::set_active_connections(self.table.senders.len());
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Drive one accepted connection from `connect` to `close`.
pub(crate) async fn serve(
    runtime: TcpRuntime,
    stream: TcpStream,
    peer: SocketAddr,
    reactor_id: u32,
    permit: ConnectionPermit,
    settings: Arc<RuntimeSettings>,
    shutdown: ShutdownListener,
) {
    let (guard, outbound) = runtime.connections().track(ConnectionId::new());
    let fd = guard.id().as_u64();

    let handler = tokio::spawn({
        let runtime = runtime.clone();
        async move {
            // A failed connect firing is already reported; the connection stays open.
            runtime.emit(Descriptor::Connect, Payload::Connect { fd, reactor_id, peer });

            if runtime.serves_http(&settings) {
                drop(outbound);
                crate::http::server::serve_connection(
                    runtime.clone(),
                    stream,
                    fd,
                    settings.package_max_length,
                    shutdown,
                )
                .await;
            } else {
                serve_raw(&runtime, stream, fd, reactor_id, settings.buffer_size, outbound, shutdown)
                    .await;
            }
        }
    });

    if let Err(e) = handler.await {
        tracing::error!(fd, reactor_id, error = %e, "Connection handler panicked");
        metrics::record_connection_panic();
    }

    drop(guard);
    runtime.emit(Descriptor::Close, Payload::Close { fd, reactor_id });
    drop(permit);
}

async fn serve_raw(
    runtime: &TcpRuntime,
    stream: TcpStream,
    fd: u64,
    reactor_id: u32,
    buffer_size: usize,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    mut shutdown: ShutdownListener,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; buffer_size];

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => {
                    let data = Bytes::copy_from_slice(&buf[..n]);
                    runtime.emit(Descriptor::Receive, Payload::Receive { fd, reactor_id, data });
                }
                Err(e) => {
                    tracing::debug!(fd, error = %e, "Read failed");
                    break;
                }
            },
            message = outbound.recv() => match message {
                Some(Outbound::Data(data)) => {
                    if let Err(e) = writer.write_all(&data).await {
                        tracing::debug!(fd, error = %e, "Write failed");
                        break;
                    }
                }
                Some(Outbound::Close) | None => break,
            },
        }
    }

    // Flush what listeners queued before the connection went away.
    while let Ok(Outbound::Data(data)) = outbound.try_recv() {
        if writer.write_all(&data).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}
