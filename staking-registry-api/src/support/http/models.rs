// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::types::BlockRef;
use crate::staking_modules::models::{Operator, RegistryMeta, StakingModule};
use crate::support::caching::refresher::{CompletedCycle, RefreshOutcome, RefresherState};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Every registry response carries the meta of the snapshot it was read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryResponse<T> {
    pub data: T,
    pub meta: Option<RegistryMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOperators {
    pub module: StakingModule,
    pub operators: Vec<Operator>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub refresher: RefresherState,
    pub last_cycle: Option<CompletedCycle>,

    #[serde(with = "time::serde::rfc3339::option")]
    pub snapshot_updated_at: Option<OffsetDateTime>,
    pub snapshot_block: Option<BlockRef>,
    pub meta: Option<RegistryMeta>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub outcome: RefreshOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Clone)]
pub(crate) struct RequestError {
    pub(crate) inner: ErrorResponse,

    pub(crate) status: StatusCode,
}

impl RequestError {
    pub(crate) fn new<S: Into<String>>(message: S, status: StatusCode) -> Self {
        RequestError {
            inner: ErrorResponse {
                message: message.into(),
            },
            status,
        }
    }

    pub(crate) fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub(crate) fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (self.status, Json(self.inner)).into_response()
    }
}

pub(crate) type HttpResult<T> = Result<T, RequestError>;
