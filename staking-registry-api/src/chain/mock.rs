// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

#![allow(clippy::unwrap_used)]

use crate::chain::error::ChainReaderError;
use crate::chain::types::BlockRef;
use crate::chain::ChainReader;
use crate::staking_modules::models::{ModuleId, Operator, RegistryMeta, StakingModule};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Clone, Debug)]
pub(crate) struct ChainState {
    pub(crate) block: BlockRef,
    pub(crate) modules: Vec<StakingModule>,
    pub(crate) registries: HashMap<ModuleId, (Vec<Operator>, Option<RegistryMeta>)>,
    pub(crate) failing_registries: HashSet<ModuleId>,
}

impl ChainState {
    pub(crate) fn new(block: BlockRef) -> Self {
        ChainState {
            block,
            modules: Vec::new(),
            registries: HashMap::new(),
            failing_registries: HashSet::new(),
        }
    }

    pub(crate) fn with_module(mut self, module: StakingModule) -> Self {
        self.modules.push(module);
        self
    }

    pub(crate) fn with_registry(
        mut self,
        module_id: ModuleId,
        operators: Vec<Operator>,
        meta: Option<RegistryMeta>,
    ) -> Self {
        self.registries.insert(module_id, (operators, meta));
        self
    }

    /// Reading the registry of `module_id` fails as if the node gave up on the call.
    pub(crate) fn with_failing_registry(mut self, module_id: ModuleId) -> Self {
        self.failing_registries.insert(module_id);
        self
    }
}

#[derive(Clone, Debug)]
pub(crate) enum ScriptedResponse {
    State(ChainState),
    Unavailable,
    UnknownModuleType { module_id: ModuleId },
}

/// [`ChainReader`] replaying a predefined sequence of chain states, one per refresh cycle.
/// Once the script is exhausted, the last returned state keeps being served.
#[derive(Clone, Default)]
pub(crate) struct ScriptedChainReader {
    inner: Arc<ScriptedInner>,
}

#[derive(Default)]
struct ScriptedInner {
    script: Mutex<VecDeque<ScriptedResponse>>,
    current: Mutex<Option<ScriptedResponse>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    cycles: AtomicUsize,
}

impl ScriptedChainReader {
    pub(crate) fn new(script: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        let reader = ScriptedChainReader::default();
        *reader.inner.script.lock().unwrap() = script.into_iter().collect();
        reader
    }

    pub(crate) fn push(&self, response: ScriptedResponse) {
        self.inner.script.lock().unwrap().push_back(response)
    }

    /// Makes every subsequent cycle wait for a permit before resolving the block reference.
    pub(crate) fn gated(self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        *self.inner.gate.lock().unwrap() = Some(gate.clone());
        (self, gate)
    }

    /// Number of cycles that have started resolving the block reference.
    pub(crate) fn cycles(&self) -> usize {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    fn current_state(&self) -> Result<ChainState, ChainReaderError> {
        match self.inner.current.lock().unwrap().clone() {
            Some(ScriptedResponse::State(state)) => Ok(state),
            _ => Err(ChainReaderError::Timeout {
                method: "scripted".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ChainReader for ScriptedChainReader {
    async fn current_block_ref(&self) -> Result<BlockRef, ChainReaderError> {
        self.inner.cycles.fetch_add(1, Ordering::SeqCst);

        let gate = self.inner.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let next = self.inner.script.lock().unwrap().pop_front();
        let mut current = self.inner.current.lock().unwrap();
        if let Some(next) = next {
            *current = Some(next);
        }

        match current.as_ref() {
            Some(ScriptedResponse::State(state)) => Ok(state.block),
            Some(ScriptedResponse::UnknownModuleType { .. }) => {
                Ok(crate::staking_modules::models::test_helpers::block(1))
            }
            _ => Err(ChainReaderError::Timeout {
                method: "eth_getBlockByNumber".to_string(),
            }),
        }
    }

    async fn fetch_modules(&self, _: &BlockRef) -> Result<Vec<StakingModule>, ChainReaderError> {
        let current = self.inner.current.lock().unwrap().clone();
        if let Some(ScriptedResponse::UnknownModuleType { module_id }) = current {
            return Err(ChainReaderError::UnknownModuleType {
                module_id,
                raw_type: "unknown-offchain-v9".to_string(),
            });
        }
        Ok(self.current_state()?.modules)
    }

    async fn fetch_operators_with_meta(
        &self,
        module: &StakingModule,
        _: &BlockRef,
    ) -> Result<(Vec<Operator>, Option<RegistryMeta>), ChainReaderError> {
        let mut state = self.current_state()?;
        if state.failing_registries.contains(&module.id) {
            return Err(ChainReaderError::Rpc {
                method: "eth_call".to_string(),
                code: -32000,
                message: "request timed out".to_string(),
            });
        }
        Ok(state.registries.remove(&module.id).unwrap_or_default())
    }
}
