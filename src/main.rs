use agentgate::error::AppError;
use axum::http::StatusCode;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,agentgate=debug")),
        )
        .json()
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {}", err.message);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let state = agentgate::app::load_state().await?;
    let listener = bind(&state.runtime.listen).await?;
    tracing::info!(listen = %state.runtime.listen, "agentgate listening");
    axum::serve(listener, agentgate::app::build_app(state))
        .await
        .map_err(|err| startup_error("serve_failed", err))
}

async fn bind(listen: &str) -> Result<tokio::net::TcpListener, AppError> {
    let addr: std::net::SocketAddr = listen
        .parse()
        .map_err(|err: std::net::AddrParseError| startup_error("listen_invalid", err))?;
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| startup_error("listen_failed", err))
}

fn startup_error(code: &'static str, err: impl std::fmt::Display) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, code, err.to_string())
}
