use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::stream;
use crate::upstream;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response, Sse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

// Unknown fields (temperature, top_p, ...) are accepted and ignored; the
// upstream takes a bare message string and none of them apply.
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.render()
}

pub async fn list_models(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    state.auth.require_bearer(&headers)?;
    let created = stream::now_ts();
    let data: Vec<Value> = state
        .agents
        .model_names()
        .map(|id| {
            json!({
                "id": id,
                "object": "model",
                "created": created,
                "owned_by": "agentgate"
            })
        })
        .collect();
    Ok(Json(json!({ "object": "list", "data": data })).into_response())
}

pub async fn create_chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    state.auth.require_bearer(&headers)?;

    let req: ChatCompletionRequest = serde_json::from_slice(&body).map_err(|err| {
        AppError::bad_request("invalid_json", format!("request body is not valid JSON: {err}"))
    })?;

    let model = req
        .model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(&state.runtime.default_model)
        .to_string();
    let agent = state.agents.lookup(&model).ok_or_else(|| {
        AppError::not_found(
            "model_not_found",
            format!("model '{model}' is not configured; list available models via GET /v1/models"),
        )
    })?;

    // The upstream is single-turn: only the most recent user message is
    // forwarded, everything before it is discarded.
    let user_message = req
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .ok_or_else(|| {
            AppError::bad_request(
                "missing_user_message",
                "no message with role 'user' found in 'messages'",
            )
        })?;

    let answer = match upstream::invoke_agent(
        &state.http,
        &state.runtime.upstream_url,
        agent,
        &state.runtime.upstream_user_id,
        &user_message,
    )
    .await
    {
        Ok(answer) => {
            metrics::counter!("agentgate_chat_requests_total", "outcome" => "success")
                .increment(1);
            answer
        }
        Err(err) => {
            metrics::counter!("agentgate_chat_requests_total", "outcome" => "upstream_error")
                .increment(1);
            tracing::warn!(model = %model, "upstream call failed: {}", err.message);
            return Err(err.into_app_error());
        }
    };

    if req.stream {
        let rx = stream::spawn_pseudo_stream(answer, model, state.runtime.stream);
        let sse = Sse::new(
            tokio_stream::wrappers::ReceiverStream::new(rx)
                .map(Ok::<_, std::convert::Infallible>),
        );
        let mut resp = sse.into_response();
        resp.headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        return Ok(resp);
    }

    Ok(Json(completion_response(&model, &answer)).into_response())
}

fn completion_response(model: &str, content: &str) -> Value {
    json!({
        "id": stream::new_completion_id(),
        "object": "chat.completion",
        "created": stream::now_ts(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        // The upstream reports no token counts; zeros keep clients happy.
        "usage": { "prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0 }
    })
}

/// Catch-all for unknown paths and unmatched methods. Plain OPTIONS gets the
/// CORS preflight answer; `/v1/` paths are authenticated before anything is
/// revealed about the routing table; everything else is a structured 404.
pub async fn gateway_fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    if uri.path().starts_with("/v1/") {
        if let Err(err) = state.auth.require_bearer(&headers) {
            return err.into_response();
        }
        return AppError::not_found(
            "unknown_endpoint",
            "unknown API endpoint; valid endpoints are GET /v1/models and POST /v1/chat/completions",
        )
        .into_response();
    }
    AppError::not_found(
        "not_found",
        format!("no route for {}; open / for the demo console", uri.path()),
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_response_shape() {
        let resp = completion_response("Sonar Pro", "hello there");
        assert_eq!(resp["object"], "chat.completion");
        assert_eq!(resp["model"], "Sonar Pro");
        assert_eq!(resp["choices"][0]["message"]["content"], "hello there");
        assert_eq!(resp["choices"][0]["finish_reason"], "stop");
        assert_eq!(resp["usage"]["total_tokens"], 0);
        assert!(
            resp["id"]
                .as_str()
                .unwrap()
                .starts_with("chatcmpl-")
        );
    }

    #[test]
    fn chat_request_accepts_unknown_fields_and_defaults() {
        let req: ChatCompletionRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"hi"}],"temperature":0.7}"#,
        )
        .unwrap();
        assert!(req.model.is_none());
        assert!(!req.stream);
        assert_eq!(req.messages.len(), 1);
    }
}
