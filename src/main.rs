use mcp_sse_server::{build_app, config::Config, logging, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let bind_socket = config.bind_socket()?;
    let state = AppState::with_defaults(config.server_identity())?;
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        server_name = %config.server_name,
        sse_endpoint = "/sse",
        message_endpoint = "/message",
        health_endpoint = "/health",
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
