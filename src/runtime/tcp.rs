//! Tokio-based server runtime emitting every lifecycle event.
//!
//! # Responsibilities
//! - Validate the endpoint and hold typed settings
//! - Keep one callback per event name and report callback failures
//! - Run master, event workers and task workers as tokio tasks
//! - Offer server operations: send, close, dispatch_task, reload, shutdown
//!
//! # Data Flow
//! ```text
//! start()
//!     → build tokio runtime → bind listener
//!     → start → manager_start (process mode)
//!     → spawn event workers + task workers (each fires worker_start)
//!     → master loop: shutdown | reload | worker crash (worker_error + delayed respawn)
//!     → drain workers → manager_stop (process mode) → shutdown
//! ```
//!
//! # Design Decisions
//! - Every role lives in one OS process; pids are the process id
//! - `start` builds its own multi-threaded tokio runtime and blocks on it,
//!   so it must not be called from inside another tokio runtime
//! - A callback is cloned out of the table before it runs, so callbacks may
//!   install further callbacks
//! - A crashed worker is respawned after a per-worker exponential delay
//! - `start` clears its run state through a drop guard, on return or unwind

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::{ArcSwap, ArcSwapOption};
use dashmap::DashMap;
use hyper::body::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinSet};

use crate::error::{HookError, RuntimeError};
use crate::events::{Descriptor, Payload, WorkerInfo};
use crate::lifecycle::shutdown::{ReloadListener, Shutdown, ShutdownListener};
use crate::lifecycle::signals::{next_signal, SignalAction};
use crate::lifecycle::Reload;
use crate::observability::metrics;
use crate::runtime::backoff::RespawnBackoff;
use crate::runtime::connection::{ConnectionTable, Outbound};
use crate::runtime::listener::Listener;
use crate::runtime::task::{self, TaskJob, TaskQueue};
use crate::runtime::worker;
use crate::runtime::{
    Callback, Endpoint, Runtime, RuntimeSettings, ServerMode, Settings, SocketType,
};

/// Bundled server runtime. Cheap to clone; clones share one server.
#[derive(Clone)]
pub struct TcpRuntime {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: Endpoint,
    addr: SocketAddr,
    callbacks: DashMap<String, Callback>,
    settings: ArcSwap<Settings>,
    running: AtomicBool,
    local_addr: ArcSwapOption<SocketAddr>,
    shutdown: Shutdown,
    reload: Reload,
    connections: ConnectionTable,
    tasks: ArcSwapOption<mpsc::UnboundedSender<TaskJob>>,
    next_task_id: AtomicU64,
    process_name: ArcSwapOption<String>,
}

impl TcpRuntime {
    /// Address the server is listening on, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr.load_full().map(|addr| *addr)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Last title passed to `set_process_name`.
    pub fn process_name(&self) -> Option<String> {
        self.inner.process_name.load_full().map(|name| (*name).clone())
    }

    /// Queue `data` for the raw connection `fd`.
    pub fn send(&self, fd: u64, data: impl Into<Bytes>) -> Result<(), RuntimeError> {
        self.inner.connections.push(fd, Outbound::Data(data.into()))
    }

    /// Close the raw connection `fd` after flushing queued data.
    pub fn close(&self, fd: u64) -> Result<(), RuntimeError> {
        self.inner.connections.push(fd, Outbound::Close)
    }

    /// Hand `data` to the task workers. Returns the task id.
    pub fn dispatch_task(&self, data: impl Into<Bytes>, src_worker_id: u32) -> Result<u64, RuntimeError> {
        let guard = self.inner.tasks.load();
        let sender = guard.as_ref().ok_or(RuntimeError::NoTaskWorkers)?;
        let task_id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);

        sender
            .send(TaskJob {
                task_id,
                src_worker_id,
                data: data.into(),
            })
            .map_err(|_| RuntimeError::NoTaskWorkers)?;

        tracing::debug!(task_id, src_worker_id, "Task dispatched");
        Ok(task_id)
    }

    /// Restart all workers. Returns false when the server is not running.
    pub fn reload(&self) -> bool {
        let delivered = self.inner.reload.trigger();
        if delivered {
            tracing::info!("Reload requested");
        }
        delivered
    }

    /// Stop the server. Returns false when it is not running.
    pub fn shutdown(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        tracing::info!("Shutdown requested");
        self.inner.shutdown.trigger();
        true
    }

    /// Open connections.
    pub fn connections(&self) -> &ConnectionTable {
        &self.inner.connections
    }

    /// Run the callback installed for `descriptor`, if any.
    ///
    /// A failure is logged and counted, then returned to the caller.
    pub fn fire(&self, descriptor: Descriptor, payload: Payload) -> Result<(), HookError> {
        let callback = match self.inner.callbacks.get(descriptor.name()) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Ok(()),
        };

        callback(self, payload).inspect_err(|e| {
            tracing::error!(event = descriptor.name(), error = %e, "Event callback failed");
            metrics::record_callback_failure(descriptor.name());
        })
    }

    /// Fire from inside the runtime, where `fire` has already reported a
    /// failure and nothing else depends on the outcome.
    pub(crate) fn emit(&self, descriptor: Descriptor, payload: Payload) {
        let _ = self.fire(descriptor, payload);
    }

    pub(crate) fn serves_http(&self, settings: &RuntimeSettings) -> bool {
        settings.open_http_protocol || self.inner.callbacks.contains_key(Descriptor::Request.name())
    }

    pub(crate) fn shutdown_listener(&self) -> ShutdownListener {
        self.inner.shutdown.subscribe()
    }

    pub(crate) fn reload_listener(&self) -> ReloadListener {
        self.inner.reload.subscribe()
    }

    fn run(&self) -> Result<(), RuntimeError> {
        let settings = Arc::new(RuntimeSettings::from_settings(&self.inner.settings.load())?);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(settings.worker_num + settings.task_worker_num)
            .thread_name("lifecycle-worker")
            .enable_all()
            .build()?;

        runtime.block_on(self.serve(settings))
    }

    async fn serve(&self, settings: Arc<RuntimeSettings>) -> Result<(), RuntimeError> {
        let listener = Arc::new(Listener::bind(self.inner.addr, settings.max_connection).await?);

        // Tasks dispatched before the task workers run wait in the queue.
        let queue = (settings.task_worker_num > 0).then(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            self.inner.tasks.store(Some(Arc::new(tx)));
            Arc::new(Mutex::new(rx))
        });

        self.inner.local_addr.store(Some(Arc::new(listener.local_addr()?)));

        // Subscribed before any worker exists so the master sees every reload.
        let mut shutdown = self.shutdown_listener();
        let mut reload = self.reload_listener();

        let pid = std::process::id();
        let process_mode = self.inner.endpoint.mode == ServerMode::Process;

        self.emit(
            Descriptor::Start,
            Payload::Start {
                master_pid: pid,
                manager_pid: if process_mode { pid } else { 0 },
            },
        );
        if process_mode {
            self.emit(Descriptor::ManagerStart, Payload::ManagerStart { manager_pid: pid });
        }

        let mut supervisor = Supervisor {
            runtime: self.clone(),
            listener,
            settings: Arc::clone(&settings),
            queue,
            workers: JoinSet::new(),
            backoff: RespawnBackoff::default(),
        };
        supervisor.spawn_all();

        let signals = settings
            .handle_signals
            .then(|| tokio::spawn(watch_signals(self.clone())));

        tracing::info!(
            endpoint = %self.inner.endpoint,
            workers = settings.worker_num,
            task_workers = settings.task_worker_num,
            "Server started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = reload.recv() => {
                    self.emit(Descriptor::Reload, Payload::Reload);
                }
                Some(joined) = supervisor.workers.join_next() => supervisor.reap(joined),
            }
        }

        if let Some(signals) = signals {
            signals.abort();
        }

        // Task workers stop taking jobs once the queue is gone.
        self.inner.tasks.store(None);
        supervisor.drain().await;

        if process_mode {
            self.emit(Descriptor::ManagerStop, Payload::ManagerStop { manager_pid: pid });
        }
        self.emit(Descriptor::Shutdown, Payload::Shutdown);

        tracing::info!("Server stopped");
        Ok(())
    }
}

impl Runtime for TcpRuntime {
    fn create(endpoint: &Endpoint) -> Result<Self, RuntimeError> {
        let ip = resolve_host(endpoint)?;

        Ok(Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.clone(),
                addr: SocketAddr::new(ip, endpoint.port),
                callbacks: DashMap::new(),
                settings: ArcSwap::from_pointee(Settings::new()),
                running: AtomicBool::new(false),
                local_addr: ArcSwapOption::empty(),
                shutdown: Shutdown::new(),
                reload: Reload::new(),
                connections: ConnectionTable::new(),
                tasks: ArcSwapOption::empty(),
                next_task_id: AtomicU64::new(0),
                process_name: ArcSwapOption::empty(),
            }),
        })
    }

    fn on(&self, event: &str, callback: Callback) {
        tracing::debug!(event, "Callback installed");
        self.inner.callbacks.insert(event.to_owned(), callback);
    }

    fn set(&self, settings: Settings) -> Result<(), RuntimeError> {
        if self.is_running() {
            return Err(RuntimeError::AlreadyRunning);
        }

        let mut merged = Settings::clone(&self.inner.settings.load());
        merged.apply(settings);
        RuntimeSettings::from_settings(&merged)?;

        self.inner.settings.store(Arc::new(merged));
        Ok(())
    }

    fn settings(&self) -> Settings {
        Settings::clone(&self.inner.settings.load())
    }

    fn start(&self) -> Result<(), RuntimeError> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RuntimeError::AlreadyRunning);
        }

        let _running = RunningGuard { inner: &self.inner };
        self.run()
    }

    fn set_process_name(&self, name: &str) -> Result<(), RuntimeError> {
        self.inner.process_name.store(Some(Arc::new(name.to_owned())));
        apply_process_name(name)
    }
}

impl fmt::Debug for TcpRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpRuntime")
            .field("endpoint", &self.inner.endpoint)
            .field("running", &self.is_running())
            .field("local_addr", &self.local_addr())
            .field("callbacks", &self.inner.callbacks.len())
            .field("connections", &self.inner.connections.active_count())
            .finish()
    }
}

/// Clears per-run state and the running flag when `start` ends.
struct RunningGuard<'a> {
    inner: &'a Inner,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.inner.tasks.store(None);
        self.inner.local_addr.store(None);
        self.inner.shutdown.reset();
        self.inner.running.store(false, Ordering::SeqCst);
    }
}

type WorkerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// How a supervised worker ended.
struct WorkerExit {
    info: WorkerInfo,
    uptime: Duration,
    result: Result<(), JoinError>,
}

/// Worker tasks owned by the master.
struct Supervisor {
    runtime: TcpRuntime,
    listener: Arc<Listener>,
    settings: Arc<RuntimeSettings>,
    queue: Option<TaskQueue>,
    workers: JoinSet<WorkerExit>,
    backoff: RespawnBackoff,
}

impl Supervisor {
    fn spawn_all(&mut self) {
        let pid = std::process::id();
        let event_workers = self.settings.worker_num as u32;

        for worker_id in 0..event_workers {
            let info = WorkerInfo {
                worker_id,
                worker_pid: pid,
                task_worker: false,
            };
            self.spawn(info, Duration::ZERO);
        }
        for i in 0..self.settings.task_worker_num as u32 {
            let info = WorkerInfo {
                worker_id: event_workers + i,
                worker_pid: pid,
                task_worker: true,
            };
            self.spawn(info, Duration::ZERO);
        }
    }

    fn worker_future(&self, info: WorkerInfo) -> Option<WorkerFuture> {
        let runtime = self.runtime.clone();
        if info.task_worker {
            let queue = Arc::clone(self.queue.as_ref()?);
            Some(Box::pin(task::run_task_worker(runtime, info.worker_id, queue)))
        } else {
            Some(Box::pin(worker::run_event_worker(
                runtime,
                info.worker_id,
                Arc::clone(&self.listener),
                Arc::clone(&self.settings),
            )))
        }
    }

    /// Start `info` after `delay`, unless shutdown comes first.
    fn spawn(&mut self, info: WorkerInfo, delay: Duration) {
        let Some(run) = self.worker_future(info) else {
            return;
        };
        let mut shutdown = self.runtime.shutdown_listener();

        // The outer task outlives a panicking worker and reports who it was.
        self.workers.spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = shutdown.recv() => {
                        return WorkerExit {
                            info,
                            uptime: Duration::ZERO,
                            result: Ok(()),
                        };
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let started = Instant::now();
            let result = tokio::spawn(run).await;
            WorkerExit {
                info,
                uptime: started.elapsed(),
                result,
            }
        });
    }

    fn reap(&mut self, joined: Result<WorkerExit, JoinError>) {
        let WorkerExit { info, uptime, result } = match joined {
            Ok(exited) => exited,
            Err(e) => {
                tracing::error!(error = %e, "Worker supervisor task failed");
                return;
            }
        };
        let shutting_down = self.runtime.inner.shutdown.is_triggered();

        match result {
            Ok(()) => {
                if !shutting_down {
                    tracing::warn!(worker_id = info.worker_id, "Worker exited before shutdown");
                }
            }
            Err(e) => {
                tracing::error!(worker_id = info.worker_id, error = %e, "Worker crashed");
                self.runtime.emit(
                    Descriptor::WorkerError,
                    Payload::WorkerError {
                        worker: info,
                        exit_code: 255,
                        signal: 0,
                    },
                );
                if !shutting_down {
                    let delay = self.backoff.next_delay(info.worker_id, uptime);
                    tracing::info!(
                        worker_id = info.worker_id,
                        delay_ms = delay.as_millis() as u64,
                        "Respawning worker"
                    );
                    self.spawn(info, delay);
                }
            }
        }
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Ok(WorkerExit {
                info,
                result: Err(e),
                ..
            }) = joined
            {
                tracing::error!(worker_id = info.worker_id, error = %e, "Worker crashed during shutdown");
            }
        }
    }
}

async fn watch_signals(runtime: TcpRuntime) {
    loop {
        match next_signal().await {
            Ok(SignalAction::Shutdown) => {
                tracing::info!("Shutdown signal received");
                runtime.shutdown();
                return;
            }
            Ok(SignalAction::Reload) => {
                tracing::info!("Reload signal received");
                runtime.reload();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Signal handling unavailable");
                return;
            }
        }
    }
}

fn resolve_host(endpoint: &Endpoint) -> Result<IpAddr, RuntimeError> {
    let ip = match endpoint.host.as_str() {
        "localhost" => match endpoint.sock_type {
            SocketType::Tcp => IpAddr::V4(Ipv4Addr::LOCALHOST),
            SocketType::Tcp6 => IpAddr::V6(Ipv6Addr::LOCALHOST),
        },
        host => host.parse::<IpAddr>().map_err(|_| {
            RuntimeError::InvalidEndpoint(format!("host `{host}` is not an IP address"))
        })?,
    };

    match (endpoint.sock_type, ip) {
        (SocketType::Tcp, IpAddr::V4(_)) | (SocketType::Tcp6, IpAddr::V6(_)) => Ok(ip),
        (SocketType::Tcp, IpAddr::V6(_)) => Err(RuntimeError::InvalidEndpoint(format!(
            "host `{ip}` is IPv6 but the socket type is tcp"
        ))),
        (SocketType::Tcp6, IpAddr::V4(_)) => Err(RuntimeError::InvalidEndpoint(format!(
            "host `{ip}` is IPv4 but the socket type is tcp6"
        ))),
    }
}

#[cfg(target_os = "linux")]
fn apply_process_name(name: &str) -> Result<(), RuntimeError> {
    let title = std::ffi::CString::new(name).map_err(|e| RuntimeError::ProcessName(e.to_string()))?;
    nix::sys::prctl::set_name(&title).map_err(|e| RuntimeError::ProcessName(e.to_string()))
}

#[cfg(not(target_os = "linux"))]
fn apply_process_name(name: &str) -> Result<(), RuntimeError> {
    if name.contains('\0') {
        return Err(RuntimeError::ProcessName("name contains a NUL byte".into()));
    }
    Ok(())
}
