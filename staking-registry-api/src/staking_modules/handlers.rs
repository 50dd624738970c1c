// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::staking_modules::models::StakingModule;
use crate::support::caching::refresher::RefreshOutcome;
use crate::support::http::models::{
    HttpResult, ModuleOperators, RefreshResponse, RegistryResponse, RegistryStatus, RequestError,
};
use crate::support::http::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router};
use tracing::instrument;

pub(crate) fn staking_module_routes() -> Router<AppState> {
    Router::new()
        .route("/modules", axum::routing::get(list_modules))
        .route("/modules/:module_id", axum::routing::get(get_module))
        .route(
            "/modules/:module_id/operators",
            axum::routing::get(module_operators),
        )
        .route("/status", axum::routing::get(registry_status))
        .route("/refresh", axum::routing::post(trigger_refresh))
}

fn module_not_found(module_id: &str) -> RequestError {
    RequestError::not_found(format!("staking module '{module_id}' does not exist"))
}

async fn list_modules(
    State(state): State<AppState>,
) -> Json<RegistryResponse<Vec<StakingModule>>> {
    let registry = state.staking_module_cache.view();

    Json(RegistryResponse {
        data: registry.list_modules(),
        meta: registry.current_meta(),
    })
}

#[instrument(level = tracing::Level::DEBUG, skip(state))]
async fn get_module(
    Path(module_id): Path<String>,
    State(state): State<AppState>,
) -> HttpResult<Json<RegistryResponse<StakingModule>>> {
    let registry = state.staking_module_cache.view();
    let module = registry
        .get_module(&module_id)
        .ok_or_else(|| module_not_found(&module_id))?;

    Ok(Json(RegistryResponse {
        data: module,
        meta: registry.current_meta(),
    }))
}

#[instrument(level = tracing::Level::DEBUG, skip(state))]
async fn module_operators(
    Path(module_id): Path<String>,
    State(state): State<AppState>,
) -> HttpResult<Json<RegistryResponse<ModuleOperators>>> {
    let registry = state.staking_module_cache.view();
    let module = registry
        .get_module(&module_id)
        .ok_or_else(|| module_not_found(&module_id))?;

    Ok(Json(RegistryResponse {
        data: ModuleOperators {
            operators: registry.operators_for_module(&module_id),
            module,
        },
        meta: registry.current_meta(),
    }))
}

async fn registry_status(State(state): State<AppState>) -> Json<RegistryStatus> {
    let registry = state.staking_module_cache.view();

    Json(RegistryStatus {
        refresher: state.refresh_trigger.state(),
        last_cycle: state.refresh_trigger.last_completed(),
        snapshot_updated_at: registry.last_updated(),
        snapshot_block: registry.block(),
        meta: registry.current_meta(),
    })
}

async fn trigger_refresh(
    State(state): State<AppState>,
) -> HttpResult<(StatusCode, Json<RefreshResponse>)> {
    let outcome = state.refresh_trigger.trigger().await;
    let status = match outcome {
        RefreshOutcome::Published | RefreshOutcome::Stale => StatusCode::OK,
        RefreshOutcome::Failed => StatusCode::BAD_GATEWAY,
        RefreshOutcome::Skipped => {
            return Err(RequestError::new(
                "a refresh cycle is already in progress",
                StatusCode::CONFLICT,
            ))
        }
        RefreshOutcome::Stopped => {
            return Err(RequestError::new(
                "the registry refresher is no longer running",
                StatusCode::SERVICE_UNAVAILABLE,
            ))
        }
    };

    Ok((status, Json(RefreshResponse { outcome })))
}

#[cfg(test)]
mod tests {
    use crate::chain::mock::{ChainState, ScriptedChainReader, ScriptedResponse};
    use crate::error::test_helpers::RecordedFatalErrors;
    use crate::metrics::RegistryMetrics;
    use crate::staking_modules::build_refresher;
    use crate::staking_modules::cache::refresher::RegistryReconciler;
    use crate::staking_modules::cache::StakingModuleCache;
    use crate::staking_modules::models::test_helpers::{block, meta, module, operator};
    use crate::staking_modules::models::ModuleType;
    use crate::support::caching::refresher::{
        CacheRefresher, RefreshOutcome, RefreshTrigger, RefresherState,
    };
    use crate::support::caching::watchdog::LivenessWatchdog;
    use crate::support::config;
    use crate::support::http::build_router;
    use crate::support::http::state::AppState;
    use axum_test::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    struct TestFixture {
        server: TestServer,
        reader: ScriptedChainReader,
        refresher: CacheRefresher<RegistryReconciler>,
    }

    fn registry_state(block_number: u64, keys_op_index: u64) -> ScriptedResponse {
        ScriptedResponse::State(
            ChainState::new(block(block_number))
                .with_module(module(1, ModuleType::CuratedOnchainV1))
                .with_module(module(2, ModuleType::CommunityOnchainV1))
                .with_registry(
                    1,
                    vec![operator(0, 10, 4), operator(1, 5, 5)],
                    Some(meta(keys_op_index, block_number)),
                ),
        )
    }

    impl TestFixture {
        fn new(reader: ScriptedChainReader) -> anyhow::Result<Self> {
            let fatal = RecordedFatalErrors::default();
            let cache = StakingModuleCache::new();
            let metrics = RegistryMetrics::new()?;
            let watchdog = LivenessWatchdog::new(Duration::from_secs(3600), fatal.handler());
            let refresher = build_refresher(
                &config::RegistryCache::default(),
                Box::new(reader.clone()),
                &cache,
                &metrics,
                watchdog.handle(),
                fatal.handler(),
            );

            let state = AppState::new(cache, Arc::new(refresher.clone()), metrics);
            Ok(TestFixture {
                server: TestServer::new(build_router(state))?,
                reader,
                refresher,
            })
        }
    }

    #[tokio::test]
    async fn empty_registry_before_first_refresh() -> anyhow::Result<()> {
        let fixture = TestFixture::new(ScriptedChainReader::default())?;

        let response = fixture.server.get("/v1/modules").await;
        response.assert_status_ok();
        response.assert_json(&json!({ "data": [], "meta": null }));

        let response = fixture.server.get("/v1/modules/1").await;
        response.assert_status(StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn modules_are_served_after_manual_refresh() -> anyhow::Result<()> {
        let fixture = TestFixture::new(ScriptedChainReader::new([registry_state(100, 5)]))?;

        let response = fixture.server.post("/v1/refresh").await;
        response.assert_status_ok();
        response.assert_json(&json!({ "outcome": "published" }));

        let modules: Value = fixture.server.get("/v1/modules").await.json();
        assert_eq!(modules["data"].as_array().map(Vec::len), Some(2));
        assert_eq!(modules["meta"]["keys_op_index"], 5);
        assert_eq!(modules["meta"]["block_number"], 100);

        let by_id: Value = fixture.server.get("/v1/modules/1").await.json();
        let address = module(1, ModuleType::CuratedOnchainV1).address.to_string();
        let by_address: Value = fixture
            .server
            .get(&format!("/v1/modules/{address}"))
            .await
            .json();
        assert_eq!(by_id, by_address);
        assert_eq!(by_id["data"]["module_type"], "curated-onchain-v1");

        fixture
            .server
            .get("/v1/modules/7")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn operators_of_a_module() -> anyhow::Result<()> {
        let fixture = TestFixture::new(ScriptedChainReader::new([registry_state(100, 5)]))?;
        fixture.server.post("/v1/refresh").await.assert_status_ok();

        let response: Value = fixture.server.get("/v1/modules/1/operators").await.json();
        assert_eq!(response["data"]["module"]["id"], 1);
        assert_eq!(
            response["data"]["operators"].as_array().map(Vec::len),
            Some(2)
        );
        assert_eq!(response["data"]["operators"][0]["used_signing_keys"], 4);

        let response: Value = fixture.server.get("/v1/modules/2/operators").await.json();
        assert_eq!(response["data"]["operators"], json!([]));

        fixture
            .server
            .get("/v1/modules/3/operators")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn stale_refresh_keeps_serving_the_cached_snapshot() -> anyhow::Result<()> {
        let fixture = TestFixture::new(ScriptedChainReader::new([
            registry_state(100, 5),
            registry_state(99, 4),
        ]))?;

        fixture.server.post("/v1/refresh").await.assert_status_ok();
        let response = fixture.server.post("/v1/refresh").await;
        response.assert_status_ok();
        response.assert_json(&json!({ "outcome": "stale" }));

        let status: Value = fixture.server.get("/v1/status").await.json();
        assert_eq!(status["refresher"], "idle");
        assert_eq!(status["last_cycle"]["outcome"], "stale");
        assert_eq!(status["last_cycle"]["block_number"], 100);
        assert_eq!(status["snapshot_block"]["number"], 100);
        assert_eq!(status["meta"]["keys_op_index"], 5);
        Ok(())
    }

    #[tokio::test]
    async fn failed_refresh_is_reported() -> anyhow::Result<()> {
        let fixture = TestFixture::new(ScriptedChainReader::new([ScriptedResponse::Unavailable]))?;

        let response = fixture.server.post("/v1/refresh").await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        response.assert_json(&json!({ "outcome": "failed" }));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_refresh_is_rejected() -> anyhow::Result<()> {
        let (reader, gate) = ScriptedChainReader::new([registry_state(100, 5)]).gated();
        let fixture = TestFixture::new(reader)?;

        let in_progress = tokio::spawn({
            let refresher = fixture.refresher.clone();
            async move { refresher.trigger().await }
        });
        while fixture.refresher.current_state() != RefresherState::Running {
            tokio::task::yield_now().await;
        }

        let response = fixture.server.post("/v1/refresh").await;
        response.assert_status(StatusCode::CONFLICT);
        response.assert_json(&json!({ "message": "a refresh cycle is already in progress" }));

        gate.add_permits(1);
        assert_eq!(in_progress.await?, RefreshOutcome::Published);
        assert_eq!(fixture.reader.cycles(), 1);

        let status: Value = fixture.server.get("/v1/status").await.json();
        assert_eq!(status["refresher"], "idle");
        assert_eq!(status["last_cycle"]["outcome"], "published");
        Ok(())
    }

    #[tokio::test]
    async fn metrics_are_exposed() -> anyhow::Result<()> {
        let fixture = TestFixture::new(ScriptedChainReader::new([registry_state(100, 5)]))?;
        fixture.server.post("/v1/refresh").await.assert_status_ok();

        let response = fixture.server.get("/metrics").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("staking_registry_last_block_number 100"));
        assert!(body.contains(&format!(
            "staking_registry_refresh_cycles_total{{outcome=\"{}\"}} 1",
            RefreshOutcome::Published
        )));
        Ok(())
    }
}
