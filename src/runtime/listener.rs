//! TCP listener with backpressure, shared by all event workers.
//!
//! # Responsibilities
//! - Bind to the endpoint address
//! - Accept incoming TCP connections from any worker
//! - Enforce `max_connection` via semaphore
//!
//! # Design Decisions
//! - Permit acquired before accept: at the limit, nobody accepts
//! - The permit lives as long as the connection task

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::RuntimeError;

/// A bounded TCP listener that limits concurrent connections.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Bind `addr` allowing at most `max_connections` open connections.
    pub async fn bind(addr: SocketAddr, max_connections: usize) -> Result<Self, RuntimeError> {
        let inner = TcpListener::bind(addr).await.map_err(RuntimeError::Bind)?;
        let local_addr = inner.local_addr().map_err(RuntimeError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
        })
    }

    /// Accept a new connection, waiting while the limit is reached.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), RuntimeError> {
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|_| RuntimeError::Io(std::io::Error::other("connection limiter closed")))?;

        let (stream, addr) = self.inner.accept().await?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RuntimeError> {
        Ok(self.inner.local_addr()?)
    }
}

/// A connection slot; released when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
