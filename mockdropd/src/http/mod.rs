//! Dropbox API v2 surface over the per-tenant stores.
//!
//! Every route is a `POST`. RPC routes take a JSON body; content routes take
//! their argument in the `Dropbox-API-Arg` header and raw bytes as the body.

mod error;
mod handlers;
mod range;
mod wire;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRequestParts};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::routing::post;
use tokio::net::TcpListener;
use tracing::info;

pub use error::{ApiError, Scope};
pub use range::{RangeError, parse_range};

use crate::config::ServerConfig;
use crate::store::Store;
use crate::tenants::Tenants;

/// Largest request body accepted, enough for a 150 MB upload chunk.
const MAX_BODY_BYTES: usize = 160 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    tenants: Arc<Tenants>,
}

/// Store of the caller, selected by the access token.
pub struct Tenant(pub Arc<Store>);

impl FromRequestParts<AppState> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
            .filter(|token| !token.is_empty())
            .ok_or_else(ApiError::unauthorized)?;
        Ok(Tenant(state.tenants.store(token)))
    }
}

pub fn router(tenants: Arc<Tenants>) -> Router {
    Router::new()
        .route("/2/users/get_space_usage", post(handlers::get_space_usage))
        .route("/2/files/create_folder", post(handlers::create_folder))
        .route("/2/files/get_metadata", post(handlers::get_metadata))
        .route("/2/files/list_folder", post(handlers::list_folder))
        .route(
            "/2/files/list_folder/continue",
            post(handlers::list_folder_continue),
        )
        .route("/2/files/delete", post(handlers::delete))
        .route("/2/files/copy", post(handlers::copy))
        .route("/2/files/move", post(handlers::move_item))
        .route("/2/files/upload", post(handlers::upload))
        .route(
            "/2/files/upload_session/start",
            post(handlers::upload_session_start),
        )
        .route(
            "/2/files/upload_session/append",
            post(handlers::upload_session_append),
        )
        .route(
            "/2/files/upload_session/finish",
            post(handlers::upload_session_finish),
        )
        .route("/2/files/download", post(handlers::download))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not found") })
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(AppState { tenants })
}

/// Serves on an already bound listener until the future is dropped.
pub async fn serve_on(listener: TcpListener, tenants: Arc<Tenants>) -> anyhow::Result<()> {
    axum::serve(listener, router(tenants))
        .await
        .context("http server failed")
}

/// Binds `config.addr` and serves until Ctrl-C.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.addr.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, "mock Dropbox server listening");

    let tenants = Arc::new(Tenants::new(config.store));
    axum::serve(listener, router(tenants))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
