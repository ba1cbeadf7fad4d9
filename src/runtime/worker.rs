//! Event workers: accept connections and drive them.
//!
//! Each worker is one tokio task standing in for a worker process. All
//! workers accept from the same listener; a connection stays with the worker
//! that accepted it (its `reactor_id`).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::events::{Descriptor, Payload, WorkerInfo};
use crate::runtime::connection;
use crate::runtime::listener::Listener;
use crate::runtime::{RuntimeSettings, TcpRuntime};

/// Back-off after a failed accept, so a persistent error does not spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

pub(crate) async fn run_event_worker(
    runtime: TcpRuntime,
    worker_id: u32,
    listener: Arc<Listener>,
    settings: Arc<RuntimeSettings>,
) {
    let info = WorkerInfo {
        worker_id,
        worker_pid: std::process::id(),
        task_worker: false,
    };
    let mut shutdown = runtime.shutdown_listener();
    let mut reload = runtime.reload_listener();
    let mut connections = JoinSet::new();

    runtime.emit(Descriptor::WorkerStart, Payload::WorkerStart(info));
    tracing::debug!(worker_id, "Worker started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = reload.recv() => restart(&runtime, info),
            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    connections.spawn(connection::serve(
                        runtime.clone(),
                        stream,
                        peer,
                        worker_id,
                        permit,
                        Arc::clone(&settings),
                        runtime.shutdown_listener(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(worker_id, error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(worker_id, error = %e, "Connection task failed");
                }
            }
        }
    }

    // Connections observe the same shutdown and close on their own.
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            tracing::error!(worker_id, error = %e, "Connection task failed");
        }
    }

    runtime.emit(Descriptor::WorkerStop, Payload::WorkerStop(info));
    tracing::debug!(worker_id, "Worker stopped");
}

/// Stop and start `info` again in place.
pub(crate) fn restart(runtime: &TcpRuntime, info: WorkerInfo) {
    tracing::info!(worker_id = info.worker_id, task_worker = info.task_worker, "Reloading worker");
    runtime.emit(Descriptor::WorkerStop, Payload::WorkerStop(info));
    runtime.emit(Descriptor::WorkerStart, Payload::WorkerStart(info));
}
