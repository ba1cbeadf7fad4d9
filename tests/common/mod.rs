//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lifecycle_router::{
    Callback, Endpoint, Event, HookError, Payload, Runtime, RuntimeError, Settings, TcpRuntime,
};

/// Runtime double that records everything the router asks of it.
#[derive(Default)]
pub struct FakeRuntime {
    pub endpoint: Endpoint,
    callbacks: Mutex<HashMap<String, Callback>>,
    bindings: Mutex<Vec<String>>,
    settings: Mutex<Settings>,
    titles: Mutex<Vec<String>>,
    starts: AtomicUsize,
    refuse_titles: AtomicBool,
}

impl FakeRuntime {
    /// Deliver `payload` the way the real runtime would for `name`.
    pub fn fire(&self, name: &str, payload: Payload) -> Result<(), HookError> {
        let callback = self.callbacks.lock().unwrap().get(name).cloned();
        match callback {
            Some(callback) => callback(self, payload),
            None => Ok(()),
        }
    }

    /// Event names passed to `on`, in call order.
    pub fn bindings(&self) -> Vec<String> {
        self.bindings.lock().unwrap().clone()
    }

    pub fn bind_count(&self, name: &str) -> usize {
        self.bindings.lock().unwrap().iter().filter(|n| *n == name).count()
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn refuse_titles(&self) {
        self.refuse_titles.store(true, Ordering::SeqCst);
    }
}

impl Runtime for FakeRuntime {
    fn create(endpoint: &Endpoint) -> Result<Self, RuntimeError> {
        if endpoint.host.is_empty() {
            return Err(RuntimeError::InvalidEndpoint("empty host".into()));
        }
        Ok(Self {
            endpoint: endpoint.clone(),
            ..Self::default()
        })
    }

    fn on(&self, event: &str, callback: Callback) {
        self.bindings.lock().unwrap().push(event.to_owned());
        self.callbacks.lock().unwrap().insert(event.to_owned(), callback);
    }

    fn set(&self, settings: Settings) -> Result<(), RuntimeError> {
        self.settings.lock().unwrap().apply(settings);
        Ok(())
    }

    fn settings(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    fn start(&self) -> Result<(), RuntimeError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_process_name(&self, name: &str) -> Result<(), RuntimeError> {
        if self.refuse_titles.load(Ordering::SeqCst) {
            return Err(RuntimeError::ProcessName("refused".into()));
        }
        self.titles.lock().unwrap().push(name.to_owned());
        Ok(())
    }
}

/// Ordered record of listener invocations.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Listener appending `label` and succeeding.
    pub fn record(
        &self,
        label: &'static str,
    ) -> impl Fn(&dyn Runtime, &Event) -> Result<(), HookError> + Send + Sync + 'static {
        let journal = self.clone();
        move |_: &dyn Runtime, _: &Event| {
            journal.push(label);
            Ok(())
        }
    }

    /// Listener appending `label` and failing.
    pub fn fail(
        &self,
        label: &'static str,
    ) -> impl Fn(&dyn Runtime, &Event) -> Result<(), HookError> + Send + Sync + 'static {
        let journal = self.clone();
        move |_: &dyn Runtime, _: &Event| {
            journal.push(label);
            Err(HookError::failed(label))
        }
    }
}

/// Settings for a small server that leaves signals alone.
pub fn test_settings() -> Settings {
    Settings::new()
        .with("worker_num", 2)
        .with("handle_signals", false)
}

/// Run `start` on a background thread and wait until the server listens.
pub fn spawn_server<F>(runtime: Arc<TcpRuntime>, start: F) -> (SocketAddr, std::thread::JoinHandle<()>)
where
    F: FnOnce() + Send + 'static,
{
    let handle = std::thread::spawn(start);

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(addr) = runtime.local_addr() {
            return (addr, handle);
        }
        assert!(Instant::now() < deadline, "server did not start listening");
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Poll `condition` until it holds or a few seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Shut the server down and wait for `start` to return.
pub async fn stop(runtime: &TcpRuntime, handle: std::thread::JoinHandle<()>) {
    assert!(runtime.shutdown(), "server was not running");
    tokio::task::spawn_blocking(move || handle.join())
        .await
        .unwrap()
        .expect("server thread panicked");
}
