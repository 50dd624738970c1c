// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::types::BlockRef;
use crate::staking_modules::models::{Operator, RegistryMeta, StakingModule};
use crate::support::caching::{Cache, SharedCache};
use std::sync::Arc;
use time::OffsetDateTime;

pub(crate) mod data;
pub(crate) mod refresher;

pub(crate) use data::RegistrySnapshot;

/// Holds the most recently published [`RegistrySnapshot`].
#[derive(Clone, Default)]
pub struct StakingModuleCache {
    inner: SharedCache<RegistrySnapshot>,
}

impl StakingModuleCache {
    pub(crate) fn new() -> Self {
        StakingModuleCache::default()
    }

    pub(crate) fn snapshot(&self) -> Option<Arc<Cache<RegistrySnapshot>>> {
        self.inner.get().ok()
    }

    pub(crate) fn publish(&self, snapshot: RegistrySnapshot) {
        self.inner.update(snapshot)
    }

    /// Pins the current snapshot, so that all queries made through the returned view agree with each other
    /// even if a new snapshot gets published in the meantime.
    pub fn view(&self) -> RegistryView {
        RegistryView(self.snapshot())
    }
}

/// Query surface over a single published snapshot.
/// Before the first publish every query answers with nothing.
#[derive(Clone)]
pub struct RegistryView(Option<Arc<Cache<RegistrySnapshot>>>);

impl RegistryView {
    pub fn list_modules(&self) -> Vec<StakingModule> {
        self.0
            .as_ref()
            .map(|snapshot| snapshot.modules.clone())
            .unwrap_or_default()
    }

    /// Looks the module up by its numeric id or by its address.
    pub fn get_module(&self, identifier: &str) -> Option<StakingModule> {
        self.0.as_ref()?.module(identifier).cloned()
    }

    pub fn current_meta(&self) -> Option<RegistryMeta> {
        self.0.as_ref()?.meta().copied()
    }

    /// Operators of the module, or an empty list if the module is unknown or not reconciled.
    pub fn operators_for_module(&self, identifier: &str) -> Vec<Operator> {
        let Some(snapshot) = &self.0 else {
            return Vec::new();
        };
        snapshot
            .module(identifier)
            .and_then(|module| snapshot.registry(module.id))
            .map(|registry| registry.operators.clone())
            .unwrap_or_default()
    }

    pub fn block(&self) -> Option<BlockRef> {
        self.0.as_ref().map(|snapshot| snapshot.block)
    }

    pub fn last_updated(&self) -> Option<OffsetDateTime> {
        self.0.as_ref().map(|snapshot| snapshot.timestamp())
    }
}
