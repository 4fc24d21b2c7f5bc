//! Mock vendor server for integration tests
//!
//! Serves OpenAI Chat Completions, OpenAI Responses and Anthropic Messages
//! endpoints, replaying one scripted reply per request. The last reply
//! repeats once the script runs out. Embeddings answer every input with a
//! small vector derived from its position.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// SSE events, then the body ends
    Events(Vec<Value>),
    /// SSE events, then the connection stays open without data
    Stall(Vec<Value>),
    /// Plain error response
    Status(u16, String),
}

/// Mock vendor backend
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    request_count: AtomicU32,
    replies: Mutex<VecDeque<MockReply>>,
    bodies: Mutex<Vec<Value>>,
}

impl MockLlm {
    /// Start the mock server with a reply script
    pub async fn start(replies: Vec<MockReply>) -> anyhow::Result<Self> {
        let state = Arc::new(MockLlmState {
            request_count: AtomicU32::new(0),
            replies: Mutex::new(replies.into()),
            bodies: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_stream))
            .route("/v1/responses", routing::post(handle_stream))
            .route("/v1/messages", routing::post(handle_stream))
            .route("/v1/embeddings", routing::post(handle_embeddings))
            .route("/v1/models", routing::get(handle_models))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as a provider
    ///
    /// Includes `/v1` since providers append paths like `/chat/completions`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of streaming requests received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// JSON bodies of the recorded requests, oldest first
    pub fn bodies(&self) -> Vec<Value> {
        self.state.bodies.lock().unwrap().clone()
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Handlers --

async fn handle_stream(State(state): State<Arc<MockLlmState>>, Json(body): Json<Value>) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    state.bodies.lock().unwrap().push(body);

    let reply = {
        let mut replies = state.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    };

    match reply {
        Some(MockReply::Events(events)) => sse_response(sse_frames(&events), false),
        Some(MockReply::Stall(events)) => sse_response(sse_frames(&events), true),
        Some(MockReply::Status(status, message)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({"error": {"message": message, "type": "server_error"}}))).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Vectors `[i, 0.5]` for input `i`, listed in reverse order
async fn handle_embeddings(State(state): State<Arc<MockLlmState>>, Json(body): Json<Value>) -> Json<Value> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let inputs = body["input"].as_array().map_or(0, Vec::len);
    state.bodies.lock().unwrap().push(body);

    let data: Vec<Value> = (0..inputs)
        .rev()
        .map(|index| json!({"object": "embedding", "index": index, "embedding": [index, 0.5]}))
        .collect();

    Json(json!({
        "object": "list",
        "data": data,
        "model": "mock-embedding",
        "usage": {"prompt_tokens": inputs, "total_tokens": inputs}
    }))
}

async fn handle_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [
            {"id": "gpt-4o", "object": "model", "created": 1_700_000_000, "owned_by": "mock"},
            {"id": "gpt-4o-mini", "object": "model", "created": 1_700_000_000, "owned_by": "mock"}
        ]
    }))
}

/// Encode events as SSE frames, naming typed events the way Anthropic does
fn sse_frames(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            Value::String(raw) => format!("data: {raw}\n\n"),
            _ => match event.get("type").and_then(Value::as_str) {
                Some(name) => format!("event: {name}\ndata: {event}\n\n"),
                None => format!("data: {event}\n\n"),
            },
        })
        .collect()
}

fn sse_response(frames: Vec<String>, stall: bool) -> Response {
    let frames = stream::iter(frames.into_iter().map(Ok::<_, Infallible>));
    let body = if stall {
        Body::from_stream(frames.chain(stream::pending()))
    } else {
        Body::from_stream(frames)
    };

    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

// -- Script builders --

/// Chat completion chunks streaming `text`, then usage and `[DONE]`
pub fn completion_text(parts: &[&str]) -> Vec<Value> {
    let mut events: Vec<Value> = parts
        .iter()
        .map(|part| json!({"choices": [{"index": 0, "delta": {"content": part}}]}))
        .collect();
    events.push(json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}));
    events.push(json!({"choices": [], "usage": {"prompt_tokens": 12, "completion_tokens": 4}}));
    events.push(Value::String("[DONE]".to_owned()));
    events
}

/// Chat completion chunks requesting one tool call in two fragments
pub fn completion_tool_call(id: &str, name: &str, arguments: &str) -> Vec<Value> {
    let (head, tail) = arguments.split_at(arguments.len() / 2);
    vec![
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "id": id, "type": "function", "function": {"name": name, "arguments": head}}
        ]}}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": tail}}
        ]}}]}),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
        Value::String("[DONE]".to_owned()),
    ]
}
