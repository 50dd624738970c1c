// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::ChainReader;
use crate::error::FatalHandler;
use crate::metrics::RegistryMetrics;
use crate::staking_modules::cache::refresher::RegistryReconciler;
use crate::staking_modules::cache::StakingModuleCache;
use crate::support::caching::refresher::CacheRefresher;
use crate::support::caching::watchdog::WatchdogHandle;
use crate::support::config;
use std::sync::Arc;

pub(crate) mod cache;
pub(crate) mod handlers;
pub(crate) mod models;

pub(crate) fn build_refresher(
    config: &config::RegistryCache,
    chain_reader: Box<dyn ChainReader>,
    cache: &StakingModuleCache,
    metrics: &RegistryMetrics,
    watchdog: WatchdogHandle,
    fatal_handler: FatalHandler,
) -> CacheRefresher<RegistryReconciler> {
    let reconciler = RegistryReconciler::new(
        chain_reader,
        cache.clone(),
        metrics.clone(),
        config.max_concurrent_fetches,
    );

    let cycle_metrics = metrics.clone();
    CacheRefresher::builder(reconciler, config.refresh_interval, fatal_handler)
        .named("staking-module-cache-refresher")
        .with_watchdog(watchdog)
        .with_outcome_observer(Arc::new(move |outcome| cycle_metrics.record_cycle(outcome)))
        .build()
}
