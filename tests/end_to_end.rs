//! End-to-end bridge tests: a real host and client wired over the
//! in-process pair transport, with demo services standing in for the
//! embedding application's business logic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};

use webview_bridge::host::ServiceEmitter;
use webview_bridge::{
    BridgeService, ClientBridge, CollectionMirror, HostBridge, ListenerId, MethodMetadata,
    PropertyCell, ReregisterPolicy, Result, ServiceSchema, TypeTag, transport,
};

// ============================================================================
// Demo Services
// ============================================================================

/// Todo list holder: a collection property plus a change event.
#[derive(Default)]
struct TodoService {
    todos: Mutex<Vec<Value>>,
    next_id: AtomicUsize,
    emitter: Mutex<Option<ServiceEmitter>>,
}

impl TodoService {
    fn todos_value(&self) -> Value {
        Value::Array(self.todos.lock().clone())
    }

    fn notify_changed(&self) {
        if let Some(emitter) = self.emitter.lock().as_ref() {
            emitter.emit_event("TodosChanged", Value::Null);
        }
    }
}

impl BridgeService for TodoService {
    fn schema(&self) -> ServiceSchema {
        ServiceSchema::builder()
            .method(MethodMetadata::new("Add").param("text", TypeTag::Text))
            .method(
                MethodMetadata::new("Remove")
                    .param("id", TypeTag::Text)
                    .returns(TypeTag::Boolean),
            )
            .event("TodosChanged")
            .property("Todos", TypeTag::Array)
            .build()
    }

    fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        match method {
            "Add" => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                let text = args[0].clone();
                self.todos.lock().push(json!({ "id": id.to_string(), "text": text }));
                self.notify_changed();
                Ok(Value::Null)
            }
            "Remove" => {
                let id = args[0].as_str().unwrap_or_default().to_string();
                let mut todos = self.todos.lock();
                let before = todos.len();
                todos.retain(|t| t["id"] != Value::String(id.clone()));
                let removed = todos.len() != before;
                drop(todos);
                if removed {
                    self.notify_changed();
                }
                Ok(Value::Bool(removed))
            }
            other => Err(webview_bridge::Error::invocation(format!(
                "unhandled method {other}"
            ))),
        }
    }

    fn get_property(&self, property: &str) -> Result<Value> {
        match property {
            "Todos" => Ok(self.todos_value()),
            other => Err(webview_bridge::Error::invocation(format!(
                "unhandled property {other}"
            ))),
        }
    }

    fn attach(&self, emitter: ServiceEmitter) {
        *self.emitter.lock() = Some(emitter);
    }

    fn detach(&self) {
        *self.emitter.lock() = None;
    }
}

/// Countdown timer: an observable scalar property plus a stop event.
#[derive(Default)]
struct TimerService {
    is_running: AtomicBool,
    emitter: Mutex<Option<ServiceEmitter>>,
}

impl TimerService {
    fn set_running(&self, running: bool) {
        self.is_running.store(running, Ordering::Release);
        if let Some(emitter) = self.emitter.lock().as_ref() {
            emitter.notify_property_changed("IsRunning");
        }
    }
}

impl BridgeService for TimerService {
    fn schema(&self) -> ServiceSchema {
        ServiceSchema::builder()
            .method(MethodMetadata::new("Start"))
            .method(MethodMetadata::new("Stop"))
            .event("TimerStopped")
            .property("IsRunning", TypeTag::Boolean)
            .observable()
            .build()
    }

    fn invoke(&self, method: &str, _args: Vec<Value>) -> Result<Value> {
        match method {
            "Start" => {
                self.set_running(true);
                Ok(Value::Null)
            }
            "Stop" => {
                self.set_running(false);
                if let Some(emitter) = self.emitter.lock().as_ref() {
                    emitter.emit_event("TimerStopped", Value::Null);
                }
                Ok(Value::Null)
            }
            other => Err(webview_bridge::Error::invocation(format!(
                "unhandled method {other}"
            ))),
        }
    }

    fn get_property(&self, property: &str) -> Result<Value> {
        match property {
            "IsRunning" => Ok(Value::Bool(self.is_running.load(Ordering::Acquire))),
            other => Err(webview_bridge::Error::invocation(format!(
                "unhandled property {other}"
            ))),
        }
    }

    fn set_property(&self, property: &str, value: Value) -> Result<()> {
        match property {
            "IsRunning" => {
                self.set_running(value.as_bool().unwrap_or(false));
                Ok(())
            }
            other => Err(webview_bridge::Error::invocation(format!(
                "unhandled property {other}"
            ))),
        }
    }

    fn attach(&self, emitter: ServiceEmitter) {
        *self.emitter.lock() = Some(emitter);
    }

    fn detach(&self) {
        *self.emitter.lock() = None;
    }
}

/// Per-discovery counter used by the transient lifetime tests.
#[derive(Default)]
struct CounterService {
    count: Mutex<i64>,
}

impl BridgeService for CounterService {
    fn schema(&self) -> ServiceSchema {
        ServiceSchema::builder()
            .method(MethodMetadata::new("Increment").returns(TypeTag::Integer))
            .property("Count", TypeTag::Integer)
            .build()
    }

    fn invoke(&self, method: &str, _args: Vec<Value>) -> Result<Value> {
        match method {
            "Increment" => {
                let mut count = self.count.lock();
                *count += 1;
                Ok(Value::from(*count))
            }
            other => Err(webview_bridge::Error::invocation(format!(
                "unhandled method {other}"
            ))),
        }
    }

    fn get_property(&self, property: &str) -> Result<Value> {
        match property {
            "Count" => Ok(Value::from(*self.count.lock())),
            other => Err(webview_bridge::Error::invocation(format!(
                "unhandled property {other}"
            ))),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

fn wire() -> (HostBridge, ClientBridge) {
    init_tracing();
    let (host_end, client_end) = transport::pair();
    let host = HostBridge::attach(Arc::new(host_end));
    let client = ClientBridge::attach(Arc::new(client_end));
    (host, client)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn scenario_a_todo_add_reflects_in_collection() {
    let (host, client) = wire();
    host.register("Todo", Arc::new(TodoService::default()))
        .expect("register");

    let todo = client.get_service("Todo").await.expect("get service");

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    todo.subscribe_event("TodosChanged", Arc::new(move |_payload| {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
    .await
    .expect("subscribe");

    todo.call("Add", vec![json!("buy milk")]).await.expect("add");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let todos = todo.get_property("Todos").await.expect("get todos");
    let items = todos.as_array().expect("array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["text"], "buy milk");
}

#[tokio::test]
async fn scenario_b_unknown_method_names_method_and_service() {
    let (host, client) = wire();
    host.register("Todo", Arc::new(TodoService::default()))
        .expect("register");

    let todo = client.get_service("Todo").await.expect("get service");
    let err = todo
        .call("DoesNotExist", vec![])
        .await
        .expect_err("must fail");

    assert!(err.is_remote());
    let text = err.to_string();
    assert!(text.contains("DoesNotExist"), "{text}");
    assert!(text.contains("Todo"), "{text}");
}

#[tokio::test]
async fn scenario_c_concurrent_calls_resolve_their_own_results() {
    let (host, client) = wire();
    host.register("Counter", Arc::new(CounterService::default()))
        .expect("register");

    let counter = client.get_service("Counter").await.expect("get service");

    // Both calls are in flight before either reply is consumed; each
    // future must resolve with its own reply, never a swapped one.
    let (first, second) = tokio::join!(
        counter.call("Increment", vec![]),
        counter.call("Increment", vec![]),
    );

    let mut results = vec![
        first.expect("first").as_i64().expect("int"),
        second.expect("second").as_i64().expect("int"),
    ];
    results.sort_unstable();
    assert_eq!(results, vec![1, 2]);
}

#[tokio::test]
async fn scenario_d_unsubscribed_listener_sees_no_more_events() {
    let (host, client) = wire();
    host.register("Timer", Arc::new(TimerService::default()))
        .expect("register");

    let timer = client.get_service("Timer").await.expect("get service");

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let listener = timer
        .subscribe_event("TimerStopped", Arc::new(move |_payload| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .expect("subscribe");

    timer.call("Stop", vec![]).await.expect("stop");
    sleep(Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    timer
        .unsubscribe_event("TimerStopped", listener)
        .await
        .expect("unsubscribe");

    // The host still forwards the push unconditionally; the client side
    // must filter it out.
    timer.call("Stop", vec![]).await.expect("stop again");
    sleep(Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Properties and Hooks
// ============================================================================

#[tokio::test]
async fn property_change_push_updates_cell_and_matches_host_value() {
    let (host, client) = wire();
    let service = Arc::new(TimerService::default());
    host.register("Timer", Arc::clone(&service) as Arc<dyn BridgeService>)
        .expect("register");

    let timer = client.get_service("Timer").await.expect("get service");
    assert_eq!(timer.property("IsRunning"), Some(Value::Bool(false)));

    let cell = PropertyCell::bind(&timer, "IsRunning").await.expect("bind");
    assert_eq!(cell.get(), Value::Bool(false));

    let mut watch = cell.watch();
    timer.call("Start", vec![]).await.expect("start");

    timeout(Duration::from_secs(1), watch.changed())
        .await
        .expect("change within a tick")
        .expect("watch alive");

    assert_eq!(cell.get(), Value::Bool(true));
    // Byte-for-byte the host-side value at push time.
    assert_eq!(cell.get(), service.get_property("IsRunning").expect("read"));
    // The stub cache refreshed from the same push.
    assert_eq!(timer.property("IsRunning"), Some(Value::Bool(true)));
}

#[tokio::test]
async fn property_cell_writes_through_to_host() {
    let (host, client) = wire();
    let service = Arc::new(TimerService::default());
    host.register("Timer", Arc::clone(&service) as Arc<dyn BridgeService>)
        .expect("register");

    let timer = client.get_service("Timer").await.expect("get service");
    let cell = PropertyCell::bind(&timer, "IsRunning").await.expect("bind");

    let mut watch = cell.watch();
    cell.set(Value::Bool(true)).await.expect("set");

    timeout(Duration::from_secs(1), watch.changed())
        .await
        .expect("echo push")
        .expect("watch alive");

    assert!(service.is_running.load(Ordering::Acquire));
    assert_eq!(cell.get(), Value::Bool(true));
}

#[tokio::test]
async fn collection_mirror_refetches_on_change() {
    let (host, client) = wire();
    host.register("Todo", Arc::new(TodoService::default()))
        .expect("register");

    let todo = client.get_service("Todo").await.expect("get service");
    let mirror = CollectionMirror::bind(&todo, "Todos").await.expect("bind");
    assert_eq!(mirror.get(), json!([]));

    let mut watch = mirror.watch();
    todo.call("Add", vec![json!("buy milk")]).await.expect("add");

    timeout(Duration::from_secs(1), watch.changed())
        .await
        .expect("refresh")
        .expect("watch alive");

    let items = mirror.get();
    assert_eq!(items.as_array().expect("array").len(), 1);
    assert_eq!(items[0]["text"], "buy milk");

    mirror.unbind().await.expect("unbind");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn unregister_twice_is_idempotent() {
    let (host, client) = wire();
    host.register("Todo", Arc::new(TodoService::default()))
        .expect("register");
    let _ = client.get_service("Todo").await.expect("get service");

    assert!(host.unregister("Todo"));
    assert!(!host.unregister("Todo"));
}

#[tokio::test]
async fn unsubscribing_unknown_listener_changes_nothing() {
    let (host, client) = wire();
    host.register("Timer", Arc::new(TimerService::default()))
        .expect("register");

    let timer = client.get_service("Timer").await.expect("get service");

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    timer
        .subscribe_event("TimerStopped", Arc::new(move |_payload| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .expect("subscribe");

    // A listener id nobody holds: succeeds, touches no other subscription.
    timer
        .unsubscribe_event("TimerStopped", ListenerId::generate())
        .await
        .expect("idempotent unsubscribe");

    timer.call("Stop", vec![]).await.expect("stop");
    sleep(Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reject_policy_refuses_duplicate_names() {
    init_tracing();
    let (host_end, client_end) = transport::pair();
    let host = HostBridge::builder()
        .reregister_policy(ReregisterPolicy::Reject)
        .attach(Arc::new(host_end));
    let _client = ClientBridge::attach(Arc::new(client_end));

    host.register("Todo", Arc::new(TodoService::default()))
        .expect("first register");
    let err = host
        .register("Todo", Arc::new(TodoService::default()))
        .expect_err("second register must fail");
    assert!(matches!(err, webview_bridge::Error::ServiceExists { .. }));
}

#[tokio::test]
async fn transient_discovery_mints_independent_instances() -> anyhow::Result<()> {
    let (host, client) = wire();
    host.register_transient("Counter", || {
        Arc::new(CounterService::default()) as Arc<dyn BridgeService>
    })?;

    let first = client.get_service("Counter").await?;
    let second = client.get_service("Counter").await?;

    assert_ne!(first.service_name(), second.service_name());
    assert!(first.registration().instance_id.is_some());

    // State is per-instance.
    assert_eq!(first.call("Increment", vec![]).await?, json!(1));
    assert_eq!(first.call("Increment", vec![]).await?, json!(2));
    assert_eq!(second.call("Increment", vec![]).await?, json!(1));
    Ok(())
}

#[tokio::test]
async fn wait_for_service_sees_late_registration() -> anyhow::Result<()> {
    let (host, client) = wire();

    let late = tokio::spawn({
        let host = host.clone();
        async move {
            sleep(Duration::from_millis(150)).await;
            host.register("Todo", Arc::new(TodoService::default()))
                .expect("register");
        }
    });

    let todo = client.wait_for_service("Todo", Duration::from_secs(2)).await?;
    assert_eq!(todo.service_name(), "Todo");
    late.await?;

    let err = client
        .wait_for_service("Never", Duration::from_millis(200))
        .await
        .expect_err("must time out");
    assert!(err.is_timeout());
    Ok(())
}

#[tokio::test]
async fn ready_fires_once_on_first_announcement() {
    let (host, client) = wire();
    assert!(!client.is_ready());

    let readiness = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&readiness);
    client.on_ready(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    host.register("Todo", Arc::new(TodoService::default()))
        .expect("register");
    sleep(Duration::from_millis(50)).await;

    assert!(client.is_ready());
    assert_eq!(readiness.load(Ordering::SeqCst), 1);

    // Already-ready callbacks run immediately.
    let counter = Arc::clone(&readiness);
    client.on_ready(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(readiness.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn disposed_host_answers_nothing() {
    let (host, client) = wire();
    host.register("Todo", Arc::new(TodoService::default()))
        .expect("register");

    let todo = client.get_service("Todo").await.expect("get service");
    host.dispose();
    host.dispose(); // idempotent
    assert!(host.is_disposed());

    let err = host.register("Again", Arc::new(TodoService::default()));
    assert!(matches!(err, Err(webview_bridge::Error::Disposed)));

    // The call's pending entry is simply never answered; the caller's own
    // timeout is the only way out.
    let outcome = timeout(
        Duration::from_millis(200),
        todo.call("Add", vec![json!("ghost")]),
    )
    .await;
    assert!(outcome.is_err(), "disposed host must not reply");
}
