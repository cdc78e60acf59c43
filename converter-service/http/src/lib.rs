use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use converter_configuration::ServerConfig;
use tokio::net::TcpListener;

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

pub use error::{error_mapper, HttpError};
pub use extract::ValidatedJson;
pub use handlers::*;
pub use state::{AppState, Capabilities};

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    // Multipart MP3 uploads arrive in one body; the default 2 MB cap is far too small.
    let body_limit = DefaultBodyLimit::max(config.max_body_bytes);

    Router::new()
        .route("/health", get(health))
        .route("/api/convert", post(convert_audio).get(download_conversion))
        .route("/api/convert/batch", post(convert_batch))
        .route("/api/share", post(create_share).get(get_share))
        .route("/api/share/{id}/download", get(download_share))
        .route("/api/proxy-upload-to-r2", post(proxy_upload))
        .layer(body_limit)
        .with_state(state)
}

pub async fn create_app_routes(state: AppState, config: ServerConfig) -> anyhow::Result<()> {
    let addr = resolve_bind_addr(&config)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;

    serve(listener, build_router(state, &config)).await
}

pub async fn serve(listener: TcpListener, router: Router) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "converter HTTP server listening");

    axum::serve(listener, router)
        .await
        .context("converter HTTP server stopped unexpectedly")
}

fn resolve_bind_addr(config: &ServerConfig) -> anyhow::Result<SocketAddr> {
    let bind = config.bind_address();
    let mut resolved = bind
        .to_socket_addrs()
        .with_context(|| format!("invalid HTTP bind address `{bind}`"))?;

    resolved
        .next()
        .with_context(|| format!("no socket address resolved for `{bind}`"))
}
