//! Router behaviour against a recording runtime double.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::body::Bytes;
use lifecycle_router::{
    Bootstrap, BuiltinHook, Descriptor, Endpoint, Event, HookError, HookRegistry, Payload,
    RawRequest, RawResponse, Router, RouterError, Runtime, RuntimeError, ServerMode, Settings,
    SocketType, WorkerInfo,
};
use serde_json::json;

mod common;
use common::{FakeRuntime, Journal};

fn endpoint() -> Endpoint {
    Endpoint::new("127.0.0.1", 9501, ServerMode::Process, SocketType::Tcp)
}

fn router() -> Router<FakeRuntime> {
    Router::new(endpoint(), HookRegistry::new())
}

fn worker(worker_id: u32) -> Payload {
    Payload::WorkerStart(WorkerInfo {
        worker_id,
        worker_pid: 55,
        task_worker: false,
    })
}

struct Recording {
    journal: Journal,
}

impl BuiltinHook for Recording {
    fn descriptors(&self) -> &'static [Descriptor] {
        &[Descriptor::WorkerStart]
    }

    fn before(&self, _server: &dyn Runtime, _event: &Event) -> Result<(), HookError> {
        self.journal.push("builtin.before");
        Ok(())
    }

    fn after(&self, _server: &dyn Runtime, _event: &Event) -> Result<(), HookError> {
        self.journal.push("builtin.after");
        Ok(())
    }
}

#[test]
fn nothing_is_bound_until_someone_listens() {
    let router = router();
    let server = router.server().unwrap();
    assert!(server.bindings().is_empty());

    router.on(Descriptor::Connect, |_: &dyn Runtime, _: &Event| Ok(())).unwrap();
    assert_eq!(server.bindings(), vec!["connect"]);
    assert!(router.is_bound(Descriptor::Connect));
    assert!(!router.is_bound(Descriptor::Close));
}

#[test]
fn each_descriptor_is_bound_once() {
    let router = router();
    let journal = Journal::new();

    router.on(Descriptor::Request.before(), journal.record("a")).unwrap();
    router.on(Descriptor::Request, journal.record("b")).unwrap();
    router.on(Descriptor::Request.after(), journal.record("c")).unwrap();
    router.on(Descriptor::Request.before(), journal.record("d")).unwrap();

    let server = router.server().unwrap();
    assert_eq!(server.bind_count("request"), 1);
    assert_eq!(server.bindings().len(), 1);

    let http = hyper::Request::builder()
        .uri("/")
        .body(Bytes::new())
        .unwrap();
    server
        .fire(
            "request",
            Payload::Request {
                request: Arc::new(RawRequest::new(1, http)),
                response: RawResponse::new(),
            },
        )
        .unwrap();

    assert_eq!(journal.entries(), vec!["a", "d", "b", "c"]);
    assert_eq!(server.bind_count("request"), 1);
}

#[test]
fn start_binds_only_descriptors_with_listeners() {
    let router = router();
    router.on(Descriptor::Connect, |_: &dyn Runtime, _: &Event| Ok(())).unwrap();

    router.start(Settings::new()).unwrap();

    let server = router.server().unwrap();
    assert_eq!(server.bindings(), vec!["connect"]);
    assert_eq!(server.start_count(), 1);
}

#[test]
fn server_handle_is_memoized() {
    let router = router();
    let first = router.server().unwrap();
    let second = router.server().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn phases_run_in_order_with_builtin_first() {
    let journal = Journal::new();
    let router = router();

    router.on(Descriptor::WorkerStart.after(), journal.record("after")).unwrap();
    router.on(Descriptor::WorkerStart, journal.record("primary")).unwrap();
    router.on(Descriptor::WorkerStart.before(), journal.record("before")).unwrap();
    router
        .install_builtin(Arc::new(Recording {
            journal: journal.clone(),
        }))
        .unwrap();

    let server = router.server().unwrap();
    server.fire("worker_start", worker(0)).unwrap();

    assert_eq!(
        journal.entries(),
        vec!["builtin.before", "before", "primary", "builtin.after", "after"]
    );
}

#[test]
fn listeners_keep_registration_order() {
    let journal = Journal::new();
    let router = router();
    router.on(Descriptor::Receive, journal.record("first")).unwrap();
    router.on(Descriptor::Receive, journal.record("second")).unwrap();
    router.on(Descriptor::Receive, journal.record("third")).unwrap();

    let server = router.server().unwrap();
    server
        .fire(
            "receive",
            Payload::Receive {
                fd: 1,
                reactor_id: 0,
                data: Bytes::from_static(b"ping"),
            },
        )
        .unwrap();

    assert_eq!(journal.entries(), vec!["first", "second", "third"]);
}

#[test]
fn failure_stops_the_firing_but_not_the_next_one() {
    let journal = Journal::new();
    let router = router();
    let calls = Arc::new(AtomicUsize::new(0));

    let before_journal = journal.clone();
    let before_calls = Arc::clone(&calls);
    router
        .on(Descriptor::WorkerStart.before(), move |_: &dyn Runtime, _: &Event| {
            before_journal.push("before");
            if before_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(HookError::failed("first firing refused"))
            } else {
                Ok(())
            }
        })
        .unwrap();
    router.on(Descriptor::WorkerStart, journal.record("primary")).unwrap();
    router.on(Descriptor::WorkerStart.after(), journal.record("after")).unwrap();

    let server = router.server().unwrap();
    assert!(matches!(server.fire("worker_start", worker(1)), Err(HookError::Failed(_))));
    assert_eq!(journal.entries(), vec!["before"]);

    server.fire("worker_start", worker(1)).unwrap();
    assert_eq!(journal.entries(), vec!["before", "before", "primary", "after"]);
}

#[test]
fn failing_primary_skips_later_listeners() {
    let journal = Journal::new();
    let router = router();
    router.on(Descriptor::Task, journal.fail("primary-1")).unwrap();
    router.on(Descriptor::Task, journal.record("primary-2")).unwrap();
    router.on(Descriptor::Task.after(), journal.record("after")).unwrap();

    let server = router.server().unwrap();
    let result = server.fire(
        "task",
        Payload::Task {
            task_id: 1,
            src_worker_id: 0,
            data: Bytes::from_static(b"job"),
        },
    );

    assert!(result.is_err());
    assert_eq!(journal.entries(), vec!["primary-1"]);
}

#[test]
fn mismatched_payload_is_rejected() {
    let journal = Journal::new();
    let router = router();
    router.on(Descriptor::WorkerStart, journal.record("primary")).unwrap();

    let server = router.server().unwrap();
    let result = server.fire("worker_start", Payload::Shutdown);

    assert!(matches!(
        result,
        Err(HookError::PayloadMismatch {
            expected: Descriptor::WorkerStart,
            actual: Descriptor::Shutdown,
        })
    ));
    assert!(journal.entries().is_empty());
}

#[test]
fn listener_added_during_firing_applies_next_time() {
    let journal = Journal::new();
    let router = Arc::new(router());

    let inner_router = Arc::clone(&router);
    let inner_journal = journal.clone();
    let added = Arc::new(AtomicUsize::new(0));
    router
        .on(Descriptor::Reload, move |_: &dyn Runtime, _: &Event| {
            inner_journal.push("outer");
            if added.fetch_add(1, Ordering::SeqCst) == 0 {
                inner_router
                    .on(Descriptor::Reload, inner_journal.record("late"))
                    .map_err(HookError::failed)?;
            }
            Ok(())
        })
        .unwrap();

    let server = router.server().unwrap();
    server.fire("reload", Payload::Reload).unwrap();
    assert_eq!(journal.entries(), vec!["outer"]);

    server.fire("reload", Payload::Reload).unwrap();
    assert_eq!(journal.entries(), vec!["outer", "outer", "late"]);
}

#[test]
fn start_keeps_existing_settings() {
    let router = router();
    let server = router.server().unwrap();
    server.set(Settings::new().with("worker_num", 4)).unwrap();

    router
        .start(Settings::new().with("worker_num", 8).with("task_worker_num", 2))
        .unwrap();

    let applied = server.settings();
    assert_eq!(applied.get("worker_num"), Some(&json!(4)));
    assert_eq!(applied.get("task_worker_num"), Some(&json!(2)));
    assert_eq!(applied.get("buffer_size"), Some(&json!(64 * 1024)));
    assert_eq!(server.start_count(), 1);
}

#[test]
fn ready_is_dispatched_by_start_and_never_bound() {
    let journal = Journal::new();
    let router = router();
    router.on(Descriptor::Ready, journal.record("ready")).unwrap();

    let server = router.server().unwrap();
    assert!(server.bindings().is_empty());

    router.start(Settings::new()).unwrap();
    assert_eq!(journal.entries(), vec!["ready"]);
    assert!(!server.bindings().iter().any(|name| name == "ready"));
}

#[test]
fn failing_ready_listener_prevents_start() {
    let journal = Journal::new();
    let router = router();
    router.on(Descriptor::Ready, journal.fail("ready")).unwrap();

    let result = router.start(Settings::new());

    assert!(matches!(result, Err(RouterError::Hook(HookError::Failed(_)))));
    assert_eq!(router.server().unwrap().start_count(), 0);
}

#[test]
fn injected_registry_is_bound_at_start() {
    let journal = Journal::new();
    let mut registry = HookRegistry::new();
    registry.register(Descriptor::Close, Arc::new(journal.record("close")));

    let router: Router<FakeRuntime> = Router::new(endpoint(), registry);
    let server = router.server().unwrap();
    assert!(server.bindings().is_empty());

    router.start(Settings::new()).unwrap();
    assert_eq!(server.bindings(), vec!["close"]);

    server
        .fire("close", Payload::Close { fd: 3, reactor_id: 0 })
        .unwrap();
    assert_eq!(journal.entries(), vec!["close"]);
}

#[test]
fn process_naming_titles_each_role() {
    let router = router();
    router.set_process_name("app-").unwrap();

    let server = router.server().unwrap();
    assert_eq!(server.bindings(), vec!["start", "manager_start", "worker_start"]);

    server
        .fire("start", Payload::Start { master_pid: 100, manager_pid: 101 })
        .unwrap();
    server
        .fire("manager_start", Payload::ManagerStart { manager_pid: 101 })
        .unwrap();
    server.fire("worker_start", worker(3)).unwrap();
    server
        .fire(
            "worker_start",
            Payload::WorkerStart(WorkerInfo {
                worker_id: 4,
                worker_pid: 56,
                task_worker: true,
            }),
        )
        .unwrap();

    assert_eq!(
        server.titles(),
        vec!["app-master-100", "app-manager-101", "app-worker-55-3", "app-taskworker-56-4"]
    );
}

#[test]
fn refused_title_does_not_abort_firing() {
    let journal = Journal::new();
    let router = router();
    router.set_process_name("app-").unwrap();
    router.on(Descriptor::WorkerStart, journal.record("primary")).unwrap();

    let server = router.server().unwrap();
    server.refuse_titles();
    server.fire("worker_start", worker(0)).unwrap();

    assert!(server.titles().is_empty());
    assert_eq!(journal.entries(), vec!["primary"]);
}

#[test]
fn invalid_endpoint_surfaces_on_first_use() {
    let router: Router<FakeRuntime> =
        Router::new(Endpoint::new("", 9501, ServerMode::Base, SocketType::Tcp), HookRegistry::new());

    let result = router.on(Descriptor::Start, |_: &dyn Runtime, _: &Event| Ok(()));
    assert!(matches!(
        result,
        Err(RouterError::Runtime(RuntimeError::InvalidEndpoint(_)))
    ));
    assert!(router.server().is_err());
}

#[test]
fn bootstrap_forwards_requests_to_bridge() {
    let bootstrap: Bootstrap<FakeRuntime> =
        Bootstrap::create("127.0.0.1", 9501, ServerMode::Process, SocketType::Tcp);
    bootstrap
        .enable_request_forwarding(|request: &RawRequest, response: &RawResponse| -> Result<(), HookError> {
            response.status(201)?;
            response.header("x-path", request.uri().path())?;
            response.end(request.body().clone());
            Ok(())
        })
        .unwrap();

    let server = bootstrap.server().unwrap();
    assert_eq!(server.bindings(), vec!["request"]);

    let http = hyper::Request::builder()
        .method("POST")
        .uri("/orders")
        .body(Bytes::from_static(b"payload"))
        .unwrap();
    let response = RawResponse::new();
    server
        .fire(
            "request",
            Payload::Request {
                request: Arc::new(RawRequest::new(9, http)),
                response: response.clone(),
            },
        )
        .unwrap();

    assert!(response.is_ended());
    assert_eq!(response.status_code().as_u16(), 201);
    let http = response.into_http();
    assert_eq!(http.headers()["x-path"], "/orders");
}

#[test]
fn bootstrap_start_runs_runtime() {
    let bootstrap: Bootstrap<FakeRuntime> =
        Bootstrap::create("127.0.0.1", 9501, ServerMode::Base, SocketType::Tcp);
    bootstrap.set_process_name("svc-").unwrap();
    bootstrap.start(Settings::new().with("worker_num", 1)).unwrap();

    let server = bootstrap.server().unwrap();
    assert_eq!(server.start_count(), 1);
    assert_eq!(server.settings().get("worker_num"), Some(&json!(1)));
}
