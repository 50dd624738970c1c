// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::JsonRpcChainReader;
use crate::error::process_exit_handler;
use crate::metrics::RegistryMetrics;
use crate::staking_modules::build_refresher;
use crate::staking_modules::cache::StakingModuleCache;
use crate::support::caching::watchdog::LivenessWatchdog;
use crate::support::caching::CacheNotification;
use crate::support::cli::{override_config, ConfigOverrides};
use crate::support::config::Config;
use crate::support::http::start_http_api;
use crate::support::http::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(clap::Args, Debug)]
pub(crate) struct Args {
    /// Id of the staking registry API we want to run.
    /// default: "default"
    #[clap(long, default_value = "default", env = "STAKING_REGISTRY_ID")]
    pub(crate) id: String,

    #[clap(flatten)]
    pub(crate) overrides: ConfigOverrides,
}

pub(crate) async fn execute(args: Args) -> anyhow::Result<()> {
    // args (and their env counterparts) take precedence over the config file
    let config = override_config(Config::read_from_default_path(&args.id)?, args.overrides);
    config.validate()?;

    start_staking_registry_api(config).await
}

async fn start_staking_registry_api(config: Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let fatal_handler = process_exit_handler();

    let chain_reader = JsonRpcChainReader::new(
        config.chain.rpc_endpoint.clone(),
        config.chain.staking_router_address,
        config.chain.request_timeout,
    )?;
    info!(
        rpc_endpoint = %config.chain.rpc_endpoint,
        staking_router = %config.chain.staking_router_address,
        "using the staking router"
    );

    let metrics = RegistryMetrics::new()?;
    let staking_module_cache = StakingModuleCache::new();

    let watchdog = LivenessWatchdog::new(
        config.registry_cache.watchdog_timeout,
        fatal_handler.clone(),
    );
    let refresher = build_refresher(
        &config.registry_cache,
        Box::new(chain_reader),
        &staking_module_cache,
        &metrics,
        watchdog.handle(),
        fatal_handler,
    );

    let mut registry_updates = refresher.update_watcher();
    let first_publish = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = first_publish.cancelled() => {}
            published = async {
                registry_updates
                    .wait_for(|update| *update == CacheNotification::Updated)
                    .await
                    .is_ok()
            } => {
                if published {
                    info!("the first registry snapshot has been published")
                }
            }
        }
    });

    let liveness = watchdog.handle();
    let watchdog_task = watchdog.start(shutdown.clone());
    let refresher_task = refresher.start(shutdown.clone());

    let state = AppState::new(staking_module_cache, Arc::new(refresher), metrics);
    let server_task = start_http_api(config.http.bind_address, state, shutdown.clone()).await?;

    wait_for_signal().await;
    info!(
        last_block_number = ?liveness.last_block_number(),
        "Stopping staking registry API"
    );
    shutdown.cancel();

    let shutdown_tasks = async {
        let (refresher, watchdog, server) = tokio::join!(refresher_task, watchdog_task, server_task);
        if let Err(err) = refresher {
            error!("the refresher task has failed: {err}")
        }
        if let Err(err) = watchdog {
            error!("the watchdog task has failed: {err}")
        }
        match server {
            Ok(Err(err)) => error!("the http server has failed: {err}"),
            Err(err) => error!("the http server task has failed: {err}"),
            Ok(Ok(())) => {}
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, shutdown_tasks)
        .await
        .is_err()
    {
        warn!("not all tasks have finished within {SHUTDOWN_GRACE_PERIOD:?}");
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            error!("failed to register the SIGTERM handler: {err}");
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("failed to listen for SIGINT: {err}");
            }
            return;
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                error!("failed to listen for SIGINT: {err}");
            }
            info!("received SIGINT");
        }
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for SIGINT: {err}");
    }
    info!("received SIGINT");
}
