use crate::config::AgentConfig;
use crate::error::AppError;
use axum::http::StatusCode;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Transport failure before a response arrived.
    Network,
    /// Upstream answered with a non-success status.
    Http,
    /// Upstream answered 2xx but the body lacks a string `response` field.
    Format,
}

#[derive(Debug, Clone)]
pub struct UpstreamCallError {
    pub kind: UpstreamErrorKind,
    pub status: Option<StatusCode>,
    pub message: String,
}

impl UpstreamCallError {
    pub fn new(kind: UpstreamErrorKind, status: Option<StatusCode>, message: String) -> Self {
        Self {
            kind,
            status,
            message,
        }
    }

    pub fn into_app_error(self) -> AppError {
        AppError::bad_gateway(format!("upstream call failed: {}", self.message))
    }
}

/// Session identifiers are fresh per call. The upstream is treated as a
/// stateless single-turn service; no session is ever reused.
pub fn fresh_session_id() -> String {
    format!("session-{}", uuid::Uuid::new_v4())
}

/// Issues exactly one POST to the upstream inference endpoint and extracts
/// the answer text. No retries, no client-side timeout override: a hanging
/// upstream blocks only the calling request task.
pub async fn invoke_agent(
    client: &reqwest::Client,
    url: &str,
    agent: &AgentConfig,
    user_id: &str,
    message: &str,
) -> Result<String, UpstreamCallError> {
    let payload = json!({
        "user_id": user_id,
        "agent_id": agent.agent_id,
        "session_id": fresh_session_id(),
        "message": message,
    });
    let resp = client
        .post(url)
        .header("x-api-key", &agent.api_key)
        .json(&payload)
        .send()
        .await
        .map_err(|err| {
            UpstreamCallError::new(UpstreamErrorKind::Network, None, err.to_string())
        })?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(UpstreamCallError::new(
            UpstreamErrorKind::Http,
            Some(status),
            format!("upstream status {status}: {text}"),
        ));
    }
    let value: Value = resp.json().await.map_err(|err| {
        UpstreamCallError::new(UpstreamErrorKind::Format, Some(status), err.to_string())
    })?;
    match value.get("response").and_then(|v| v.as_str()) {
        Some(answer) => Ok(answer.to_string()),
        None => Err(UpstreamCallError::new(
            UpstreamErrorKind::Format,
            Some(status),
            "upstream body has no string 'response' field".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_never_repeat() {
        let a = fresh_session_id();
        let b = fresh_session_id();
        assert!(a.starts_with("session-"));
        assert_ne!(a, b);
    }

    #[test]
    fn upstream_errors_map_to_bad_gateway() {
        let err = UpstreamCallError::new(
            UpstreamErrorKind::Http,
            Some(StatusCode::INTERNAL_SERVER_ERROR),
            "upstream status 500".to_string(),
        )
        .into_app_error();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_type, "api_error");
        assert!(err.message.contains("upstream"));
    }
}
