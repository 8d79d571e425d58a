//! Test utilities for vendex-core
//!
//! In-process mock servers for the two external services Vendex talks to:
//! - `MockClassifierServer`: OpenAI chat completions and Ollama chat APIs
//! - `MockStoreServer`: the REST store (vendor list, batch inserts, embeddings)
//!
//! Both bind to an ephemeral port, record every request and support
//! failure injection.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::classify_mock;

/// A request captured by a mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub apikey: Option<String>,
    pub prefer: Option<String>,
    pub body: Value,
}

impl RecordedRequest {
    fn new(uri: &Uri, headers: &HeaderMap, body: Value) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            authorization: header("authorization"),
            apikey: header("apikey"),
            prefer: header("prefer"),
            body,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Bind an ephemeral port and serve `app` until the returned sender fires
async fn spawn(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

// ========== Classifier ==========

#[derive(Default)]
struct ClassifierState {
    requests: Vec<RecordedRequest>,
    fail_remaining: usize,
}

/// Mock OpenAI / Ollama server
///
/// Answers with the same deterministic classifications as `MockBackend`,
/// reading the description and known-vendor hints back out of the prompt.
pub struct MockClassifierServer {
    addr: SocketAddr,
    state: Arc<Mutex<ClassifierState>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockClassifierServer {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(ClassifierState::default()));
        let app = Router::new()
            .route("/v1/chat/completions", post(handle_chat_completions))
            .route("/api/chat", post(handle_ollama_chat))
            .with_state(state.clone());

        let (addr, shutdown_tx) = spawn(app).await;
        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer the next `n` requests with HTTP 500
    pub fn fail_next(&self, n: usize) {
        lock(&self.state).fail_remaining = n;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockClassifierServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Record the request and produce the classification JSON, or None to fail
fn classify_request(
    state: &Mutex<ClassifierState>,
    uri: &Uri,
    headers: &HeaderMap,
    body: Value,
) -> Option<String> {
    let (system, user) = messages(&body);
    let mut state = lock(state);
    state.requests.push(RecordedRequest::new(uri, headers, body));
    if state.fail_remaining > 0 {
        state.fail_remaining -= 1;
        return None;
    }
    drop(state);

    let description = extract_description(&user);
    let known = extract_known_vendors(&system);
    let classification = classify_mock(&description, &known);
    serde_json::to_string(&classification).ok()
}

async fn handle_chat_completions(
    State(state): State<Arc<Mutex<ClassifierState>>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match classify_request(&state, &uri, &headers, body) {
        Some(content) => Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "mock classifier failure").into_response(),
    }
}

async fn handle_ollama_chat(
    State(state): State<Arc<Mutex<ClassifierState>>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match classify_request(&state, &uri, &headers, body) {
        Some(content) => Json(json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": content},
            "done": true
        }))
        .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "mock classifier failure").into_response(),
    }
}

/// Pull the system and user message contents out of a chat request
fn messages(body: &Value) -> (String, String) {
    let mut system = String::new();
    let mut user = String::new();
    if let Some(messages) = body["messages"].as_array() {
        for message in messages {
            let content = message["content"].as_str().unwrap_or_default().to_string();
            match message["role"].as_str() {
                Some("system") => system = content,
                Some("user") => user = content,
                _ => {}
            }
        }
    }
    (system, user)
}

/// Matches the user section of prompts/extract_vendor.md
fn extract_description(user: &str) -> String {
    const MARKER: &str = "Transaction description: \"";
    user.find(MARKER)
        .map(|start| {
            let rest = &user[start + MARKER.len()..];
            rest.strip_suffix('"').unwrap_or(rest).to_string()
        })
        .unwrap_or_else(|| user.to_string())
}

/// Matches the known-vendor line of prompts/extract_vendor.md
fn extract_known_vendors(system: &str) -> Vec<String> {
    system
        .lines()
        .find(|line| line.starts_with("Known vendors"))
        .and_then(|line| line.split_once("): "))
        .map(|(_, list)| list.split(", ").map(str::to_string).collect())
        .unwrap_or_default()
}

// ========== Store ==========

#[derive(Default)]
struct StoreState {
    requests: Vec<RecordedRequest>,
    vendors: Vec<String>,
    fail_vendor_list: bool,
    /// 1-based batch numbers that should be rejected
    fail_batches: HashSet<usize>,
    fail_embeddings: bool,
    batches_seen: usize,
}

/// Mock REST store
pub struct MockStoreServer {
    addr: SocketAddr,
    state: Arc<Mutex<StoreState>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockStoreServer {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(StoreState::default()));
        let app = Router::new()
            .route("/rest/v1/vendor_categorizations", get(handle_vendor_list))
            .route("/rest/v1/bank_transactions", post(handle_insert))
            .route("/functions/v1/generate-embeddings", post(handle_embeddings))
            .with_state(state.clone());

        let (addr, shutdown_tx) = spawn(app).await;
        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Vendor names returned by the vendor list endpoint
    pub fn set_vendors(&self, vendors: &[&str]) {
        lock(&self.state).vendors = vendors.iter().map(|v| v.to_string()).collect();
    }

    pub fn fail_vendor_list(&self) {
        lock(&self.state).fail_vendor_list = true;
    }

    /// Reject the given 1-based batch number
    pub fn fail_batch(&self, batch: usize) {
        lock(&self.state).fail_batches.insert(batch);
    }

    pub fn fail_embeddings(&self) {
        lock(&self.state).fail_embeddings = true;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Bodies of every insert request, in order
    pub fn batches(&self) -> Vec<Vec<Value>> {
        self.requests_to("/rest/v1/bank_transactions")
            .into_iter()
            .map(|r| r.body.as_array().cloned().unwrap_or_default())
            .collect()
    }

    pub fn embedding_calls(&self) -> Vec<RecordedRequest> {
        self.requests_to("/functions/v1/generate-embeddings")
    }

    fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockStoreServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_vendor_list(
    State(state): State<Arc<Mutex<StoreState>>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    state
        .requests
        .push(RecordedRequest::new(&uri, &headers, Value::Null));
    if state.fail_vendor_list {
        return (StatusCode::SERVICE_UNAVAILABLE, "vendor list unavailable").into_response();
    }
    let rows: Vec<Value> = state
        .vendors
        .iter()
        .map(|v| json!({ "vendor_name": v }))
        .collect();
    Json(Value::Array(rows)).into_response()
}

async fn handle_insert(
    State(state): State<Arc<Mutex<StoreState>>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    state.batches_seen += 1;
    let batch = state.batches_seen;
    state
        .requests
        .push(RecordedRequest::new(&uri, &headers, body.clone()));

    if state.fail_batches.contains(&batch) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "code": "23502",
                "message": format!("mock rejection of batch {}", batch)
            })),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn handle_embeddings(
    State(state): State<Arc<Mutex<StoreState>>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    let limit = body["limit"].as_u64().unwrap_or(0);
    state
        .requests
        .push(RecordedRequest::new(&uri, &headers, body));
    if state.fail_embeddings {
        return (StatusCode::INTERNAL_SERVER_ERROR, "embedding function crashed").into_response();
    }
    Json(json!({
        "results": { "success": limit, "failed": 0, "errors": [] },
        "totalProcessed": limit
    }))
    .into_response()
}
