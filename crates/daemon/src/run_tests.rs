// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backend::fake::{FakeBackend, FakeProcessPlan};
use crate::logs::FakeEmitter;
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use stevedore_core::{FakeClock, RunAction, State};
use stevedore_wire::AllocationRequest;

struct Harness {
    backend: FakeBackend,
    registry: Arc<Registry<FakeClock>>,
    clock: FakeClock,
}

impl Harness {
    fn new() -> Self {
        let clock = FakeClock::new();
        let registry = Arc::new(Registry::new(
            stevedore_core::ExecutorResources { memory_mb: 1024, disk_mb: 1024, containers: 8 },
            clock.clone(),
        ));
        Self { backend: FakeBackend::new(), registry, clock }
    }

    fn created_container(&self, guid: &str) -> Container {
        self.registry
            .allocate(guid, &AllocationRequest { memory_mb: 1, disk_mb: 1, ..Default::default() })
            .unwrap();
        self.registry.start_initializing(guid).unwrap();
        self.registry.mark_created(guid, "handle-1".to_string(), Vec::new()).unwrap()
    }

    fn sequence(&self, container: Container, complete_url: String) -> RunSequence<FakeClock> {
        RunSequence {
            container,
            actions: vec![run_action("/bin/app")],
            env: Vec::new(),
            complete_url,
            registry: self.registry.clone(),
            backend: Arc::new(self.backend.clone()),
            emitter: FakeEmitter::new(),
            http: reqwest::Client::new(),
            clock: self.clock.clone(),
            max_log_message_size: 4096,
            monitor_interval: std::time::Duration::from_millis(10),
        }
    }
}

fn run_action(path: &str) -> Action {
    Action::Run(RunAction {
        path: path.to_string(),
        args: Vec::new(),
        env: Vec::new(),
        timeout_ms: 0,
        resource_limits: Default::default(),
    })
}

/// Collects callback POST bodies on an ephemeral port.
async fn callback_server() -> (String, Arc<Mutex<Vec<RunResult>>>) {
    let received: Arc<Mutex<Vec<RunResult>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let app = Router::new().route(
        "/completed",
        post(move |body: axum::body::Bytes| {
            let sink = sink.clone();
            async move {
                sink.lock().push(serde_json::from_slice(&body).unwrap());
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}/completed"), received)
}

async fn eventually<T>(check: impl Fn() -> Option<T>) -> T {
    for _ in 0..100 {
        if let Some(value) = check() {
            return value;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not met within one second");
}

#[tokio::test]
async fn successful_run_completes_the_registry_record() {
    let harness = Harness::new();
    let container = harness.created_container("guid-1");
    let sequence = harness.sequence(container, String::new());

    let (ready_tx, ready_rx) = oneshot::channel();
    sequence.run(CancellationToken::new(), ready_tx).await.unwrap();
    ready_rx.await.unwrap();

    let container = harness.registry.get("guid-1").unwrap();
    assert_eq!(container.state, State::Completed);
    assert!(!container.run_result.failed);
    assert_eq!(container.run_result.guid, "guid-1");
}

#[tokio::test]
async fn failed_run_records_the_failure_reason_and_posts_the_callback() {
    let harness = Harness::new();
    harness.backend.enqueue_process(FakeProcessPlan::failing("boom"));
    let container = harness.created_container("guid-1");
    let (url, received) = callback_server().await;
    let sequence = harness.sequence(container, url);

    let (ready_tx, _ready_rx) = oneshot::channel();
    let err = sequence.run(CancellationToken::new(), ready_tx).await.unwrap_err();
    assert_eq!(err.to_string(), "boom");

    let container = harness.registry.get("guid-1").unwrap();
    assert_eq!(container.state, State::Completed);
    assert!(container.run_result.failed);
    assert_eq!(container.run_result.failure_reason, "boom");

    let payload = eventually(|| received.lock().first().cloned()).await;
    assert_eq!(
        payload,
        RunResult {
            guid: "guid-1".to_string(),
            failed: true,
            failure_reason: "boom".to_string(),
            result: String::new(),
        }
    );
}

#[tokio::test]
async fn callback_failures_are_swallowed() {
    let harness = Harness::new();
    let container = harness.created_container("guid-1");
    // Nothing is listening on this port; the callback can only fail.
    let sequence = harness.sequence(container, "http://127.0.0.1:9/completed".to_string());

    let (ready_tx, _ready_rx) = oneshot::channel();
    sequence.run(CancellationToken::new(), ready_tx).await.unwrap();

    assert_eq!(harness.registry.get("guid-1").unwrap().state, State::Completed);
}

#[tokio::test]
async fn cancelled_run_leaves_the_registry_alone_and_fires_no_callback() {
    let harness = Harness::new();
    harness.backend.enqueue_process(FakeProcessPlan::hanging());
    let container = harness.created_container("guid-1");
    let (url, received) = callback_server().await;
    let sequence = harness.sequence(container, url);

    let cancel = CancellationToken::new();
    let (ready_tx, ready_rx) = oneshot::channel();
    let worker = tokio::spawn(sequence.run(cancel.clone(), ready_tx));

    ready_rx.await.unwrap();
    cancel.cancel();

    let err = tokio::time::timeout(std::time::Duration::from_secs(1), worker)
        .await
        .expect("run did not return after cancel")
        .unwrap()
        .unwrap_err();
    assert!(err.is_cancelled());

    // Still Created: the Delete that cancelled us owns the registry record.
    assert_eq!(harness.registry.get("guid-1").unwrap().state, State::Created);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(received.lock().is_empty());
}

#[tokio::test]
async fn readiness_is_announced_before_the_tree_finishes() {
    let harness = Harness::new();
    harness.backend.enqueue_process(FakeProcessPlan::hanging());
    let container = harness.created_container("guid-1");
    let sequence = harness.sequence(container, String::new());

    let cancel = CancellationToken::new();
    let (ready_tx, ready_rx) = oneshot::channel();
    let worker = tokio::spawn(sequence.run(cancel.clone(), ready_tx));

    // Readiness arrives while the action tree is still hanging.
    tokio::time::timeout(std::time::Duration::from_secs(1), ready_rx)
        .await
        .expect("not ready in time")
        .unwrap();

    cancel.cancel();
    let _ = worker.await;
}
