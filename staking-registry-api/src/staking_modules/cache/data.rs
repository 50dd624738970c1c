// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::types::BlockRef;
use crate::staking_modules::models::{ModuleId, Operator, RegistryMeta, StakingModule};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleRegistry {
    pub operators: Vec<Operator>,
    pub meta: Option<RegistryMeta>,
}

/// One internally consistent view of the registry, entirely read at `block`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub block: BlockRef,
    pub modules: Vec<StakingModule>,

    // only modules requiring key reconciliation have an entry
    pub registries: BTreeMap<ModuleId, ModuleRegistry>,
}

impl RegistrySnapshot {
    /// Meta of the lowest-id module that reported one.
    pub fn meta(&self) -> Option<&RegistryMeta> {
        self.registries
            .values()
            .find_map(|registry| registry.meta.as_ref())
    }

    pub fn module(&self, identifier: &str) -> Option<&StakingModule> {
        self.modules
            .iter()
            .find(|module| module.matches_identifier(identifier))
    }

    pub fn registry(&self, module_id: ModuleId) -> Option<&ModuleRegistry> {
        self.registries.get(&module_id)
    }

    pub fn operators_count(&self) -> usize {
        self.registries
            .values()
            .map(|registry| registry.operators.len())
            .sum()
    }

    /// Whether this snapshot reflects chain state strictly older than `other`.
    /// Falls back to the pinned blocks when either side has no registry meta.
    pub fn is_older_than(&self, other: &RegistrySnapshot) -> bool {
        match (self.meta(), other.meta()) {
            (Some(ours), Some(theirs)) => ours.is_older_than(theirs),
            _ => self.block.number < other.block.number,
        }
    }
}
