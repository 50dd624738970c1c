// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::metrics::RegistryMetrics;
use crate::staking_modules::cache::StakingModuleCache;
use crate::support::caching::refresher::RefreshTrigger;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) staking_module_cache: StakingModuleCache,
    pub(crate) refresh_trigger: Arc<dyn RefreshTrigger>,
    pub(crate) metrics: RegistryMetrics,
}

impl AppState {
    pub(crate) fn new(
        staking_module_cache: StakingModuleCache,
        refresh_trigger: Arc<dyn RefreshTrigger>,
        metrics: RegistryMetrics,
    ) -> Self {
        AppState {
            staking_module_cache,
            refresh_trigger,
            metrics,
        }
    }
}
