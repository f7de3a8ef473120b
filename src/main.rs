use anyhow::Context;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use mcp_scout::config::{Settings, Transport};
use mcp_scout::mcp::stdio;
use mcp_scout::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    dotenvy::dotenv().ok();

    // stdout belongs to the stdio transport, so logs always go to stderr.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let settings = Settings::from_env().context("invalid configuration")?;
    let state = AppState::new(&settings).context("failed to initialise MCP Scout")?;
    state.mark_ready();

    match settings.transport {
        Transport::Stdio => {
            tracing::info!("MCP Scout serving on stdio");
            stdio::serve_stdio(state).await?;
        }
        Transport::Http => serve_http(state, settings.port).await?,
    }

    Ok(())
}

async fn serve_http(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = mcp_scout::create_router(state)
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        );

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("MCP Scout listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
