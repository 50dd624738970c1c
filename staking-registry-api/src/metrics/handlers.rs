// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::support::http::models::{HttpResult, RequestError};
use crate::support::http::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Router;
use prometheus::TEXT_FORMAT;
use tracing::error;

pub(crate) fn metrics_routes() -> Router<AppState> {
    Router::new().route("/metrics", axum::routing::get(prometheus_metrics))
}

async fn prometheus_metrics(State(state): State<AppState>) -> HttpResult<impl IntoResponse> {
    let encoded = state.metrics.encode().map_err(|err| {
        error!("failed to encode metrics: {err}");
        RequestError::internal("failed to encode metrics")
    })?;
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], encoded))
}
