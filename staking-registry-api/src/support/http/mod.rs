// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::metrics::handlers::metrics_routes;
use crate::staking_modules::handlers::staking_module_routes;
use crate::support::http::state::AppState;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub(crate) mod models;
pub(crate) mod state;

pub(crate) type AxumJoinHandle = JoinHandle<std::io::Result<()>>;

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/v1", staking_module_routes())
        .merge(metrics_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the listener and serves the API until `shutdown` gets cancelled.
pub(crate) async fn start_http_api(
    bind_address: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<AxumJoinHandle> {
    let listener = TcpListener::bind(bind_address).await?;
    info!("Started HTTP API on http://{}", listener.local_addr()?);

    let router = build_router(state);
    Ok(tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    }))
}
