//! Pseudo-stream emitter: converts a complete upstream answer into an
//! OpenAI-compatible `chat.completion.chunk` event sequence. The upstream
//! never streams; the incremental delivery is synthesized here purely for
//! wire compatibility with streaming clients.

use crate::config::StreamTuning;
use crate::error::{AppError, AppResult};
use axum::http::StatusCode;
use axum::response::sse::Event;
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// End-of-stream marker clients recognize to stop reading.
pub const DONE_SENTINEL: &str = "[DONE]";

pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn new_completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4())
}

/// Splits `text` into runs of `chunk_size` characters; the final run may be
/// shorter. Counting chars rather than bytes keeps every delta valid UTF-8.
pub(crate) fn partition_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == chunk_size {
            parts.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn content_chunk(id: &str, created: i64, model: &str, delta: &str) -> Value {
    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{ "index": 0, "delta": { "content": delta }, "finish_reason": null }]
    })
}

fn terminal_chunk(id: &str, created: i64, model: &str) -> Value {
    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{ "index": 0, "delta": {}, "finish_reason": "stop" }]
    })
}

/// The full chunk payload sequence for one invocation: one content chunk per
/// partition of `full_text`, then the terminal chunk. The `[DONE]` sentinel is
/// a transport-level event, not a chunk, and is appended by the emitter.
pub(crate) fn chunk_payloads(
    full_text: &str,
    model: &str,
    id: &str,
    created: i64,
    chunk_size: usize,
) -> Vec<Value> {
    let mut payloads: Vec<Value> = partition_text(full_text, chunk_size)
        .iter()
        .map(|delta| content_chunk(id, created, model, delta))
        .collect();
    payloads.push(terminal_chunk(id, created, model));
    payloads
}

/// Emits the event sequence for `full_text` into `tx`, pacing content chunks
/// by `tuning.delay_ms`. A failed send means the receiver is gone (client
/// disconnect); the emitter stops there instead of computing into a closed
/// channel.
pub async fn emit_pseudo_stream(
    full_text: &str,
    model: &str,
    tuning: StreamTuning,
    tx: &mpsc::Sender<Event>,
) -> AppResult<()> {
    let id = new_completion_id();
    let created = now_ts();
    let mut payloads = chunk_payloads(full_text, model, &id, created, tuning.chunk_size);
    let terminal = payloads.pop();
    for payload in payloads {
        send_data(tx, payload).await?;
        if tuning.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(tuning.delay_ms)).await;
        }
    }
    if let Some(terminal) = terminal {
        send_data(tx, terminal).await?;
    }
    tx.send(Event::default().data(DONE_SENTINEL))
        .await
        .map_err(send_failed)?;
    Ok(())
}

/// Spawns the emitter on its own task and hands back the receiving end for an
/// SSE response. On an emitter fault the consumer gets one best-effort error
/// event plus the sentinel; the channel closes on every exit path when the
/// sender drops.
pub fn spawn_pseudo_stream(
    full_text: String,
    model: String,
    tuning: StreamTuning,
) -> mpsc::Receiver<Event> {
    let (tx, rx) = mpsc::channel::<Event>(64);
    tokio::spawn(async move {
        if let Err(err) = emit_pseudo_stream(&full_text, &model, tuning, &tx).await {
            tracing::warn!("pseudo stream interrupted: {}", err.message);
            let fault = json!({
                "error": { "message": format!("stream interrupted: {}", err.message) }
            });
            // The receiver may already be gone; both sends are best effort.
            let _ = tx.send(Event::default().data(fault.to_string())).await;
            let _ = tx.send(Event::default().data(DONE_SENTINEL)).await;
        }
    });
    rx
}

async fn send_data(tx: &mpsc::Sender<Event>, payload: Value) -> AppResult<()> {
    tx.send(Event::default().data(payload.to_string()))
        .await
        .map_err(send_failed)
}

fn send_failed<E: std::fmt::Display>(err: E) -> AppError {
    AppError::new(
        StatusCode::BAD_GATEWAY,
        "stream_send_failed",
        err.to_string(),
    )
}
