use crate::auth::AuthState;
use crate::config::{AgentTable, StreamTuning};
use crate::error::{AppError, AppResult};
use axum::Router;
use axum::http::{HeaderValue, StatusCode, header};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::{Arc, Once, OnceLock};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeConfig>,
    pub agents: Arc<AgentTable>,
    pub auth: AuthState,
    pub http: reqwest::Client,
    pub metrics: PrometheusHandle,
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static METRICS_ERROR: OnceLock<AppError> = OnceLock::new();
static METRICS_INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub listen: String,
    pub metrics_path: String,
    pub gateway_api_key: String,
    pub upstream_url: String,
    pub upstream_user_id: String,
    /// Empty means "first configured agent"; resolved during state loading.
    pub default_model: String,
    pub agents_json: Option<String>,
    pub agents_file: Option<String>,
    pub stream: StreamTuning,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let listen = env_or("AGENTGATE_LISTEN", "0.0.0.0:8080");
        let metrics_path = env_or("AGENTGATE_METRICS_PATH", "/metrics");
        let gateway_api_key = env_or("AGENTGATE_API_KEY", "");
        let upstream_url = env_or(
            "AGENTGATE_UPSTREAM_URL",
            "https://agent-prod.studio.lyzr.ai/v3/inference/chat/",
        );
        let upstream_user_id = env_or("AGENTGATE_USER_ID", "user@agentgate.local");
        let default_model = env_or("AGENTGATE_DEFAULT_MODEL", "");
        let agents_json = non_empty_env("AGENTGATE_AGENTS");
        let agents_file = non_empty_env("AGENTGATE_AGENTS_FILE");
        let chunk_size = non_empty_env("AGENTGATE_CHUNK_SIZE")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(3);
        let delay_ms = non_empty_env("AGENTGATE_CHUNK_DELAY_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5);
        Self {
            listen,
            metrics_path,
            gateway_api_key,
            upstream_url,
            upstream_user_id,
            default_model,
            agents_json,
            agents_file,
            stream: StreamTuning::new(chunk_size, delay_ms),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    non_empty_env(key).unwrap_or_else(|| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub async fn load_state() -> AppResult<AppState> {
    load_state_with_runtime(RuntimeConfig::from_env()).await
}

pub async fn load_state_with_runtime(mut runtime: RuntimeConfig) -> AppResult<AppState> {
    if runtime.gateway_api_key.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "gateway_api_key_missing",
            "no gateway API key configured; set AGENTGATE_API_KEY",
        ));
    }

    let raw_agents = match (&runtime.agents_json, &runtime.agents_file) {
        (Some(raw), _) => raw.clone(),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|err| {
            AppError::new(
                StatusCode::BAD_REQUEST,
                "agents_file_read_failed",
                format!("failed to read {path}: {err}"),
            )
        })?,
        (None, None) => {
            return Err(AppError::new(
                StatusCode::BAD_REQUEST,
                "agents_missing",
                "no agent table configured; set AGENTGATE_AGENTS or AGENTGATE_AGENTS_FILE",
            ));
        }
    };
    let agents = AgentTable::from_json(&raw_agents)
        .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, "agents_invalid", err))?;

    if runtime.default_model.trim().is_empty() {
        runtime.default_model = agents
            .first_model()
            .unwrap_or_default() // table is non-empty by construction
            .to_string();
    } else if agents.lookup(&runtime.default_model).is_none() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "default_model_unknown",
            format!(
                "default model '{}' is not in the agent table",
                runtime.default_model
            ),
        ));
    }

    let http = reqwest::Client::builder()
        .user_agent("agentgate/0.1")
        .build()
        .map_err(|err| {
            AppError::new(
                StatusCode::BAD_REQUEST,
                "http_client_init_failed",
                err.to_string(),
            )
        })?;

    let metrics = init_metrics()?;
    let auth = AuthState::new(&runtime.gateway_api_key);

    Ok(AppState {
        runtime: Arc::new(runtime),
        agents: Arc::new(agents),
        auth,
        http,
        metrics,
    })
}

fn init_metrics() -> AppResult<PrometheusHandle> {
    METRICS_INIT.call_once(|| {
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(err) => {
                let _ = METRICS_ERROR.set(AppError::new(
                    StatusCode::BAD_REQUEST,
                    "metrics_init_failed",
                    err.to_string(),
                ));
            }
        }
    });

    if let Some(err) = METRICS_ERROR.get() {
        return Err(err.clone());
    }
    METRICS_HANDLE.get().cloned().ok_or_else(|| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "metrics_init_failed",
            "metrics recorder not available",
        )
    })
}

pub fn build_app(state: AppState) -> Router {
    let metrics_path = state.runtime.metrics_path.clone();
    Router::<AppState>::new()
        .route(
            "/",
            get(crate::console::console_page).fallback(crate::handlers::gateway_fallback),
        )
        .route(
            "/v1/models",
            get(crate::handlers::list_models).fallback(crate::handlers::gateway_fallback),
        )
        .route(
            "/v1/chat/completions",
            post(crate::handlers::create_chat_completions)
                .fallback(crate::handlers::gateway_fallback),
        )
        .route(
            &metrics_path,
            get(crate::handlers::metrics).fallback(crate::handlers::gateway_fallback),
        )
        .fallback(crate::handlers::gateway_fallback)
        .with_state(state)
        .layer(SetRequestIdLayer::new(
            header::HeaderName::from_static("x-request-id"),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(
            header::HeaderName::from_static("x-request-id"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ))
}
