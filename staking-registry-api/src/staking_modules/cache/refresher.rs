// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::error::ChainReaderError;
use crate::chain::types::BlockRef;
use crate::chain::ChainReader;
use crate::error::FatalError;
use crate::metrics::RegistryMetrics;
use crate::staking_modules::cache::data::{ModuleRegistry, RegistrySnapshot};
use crate::staking_modules::cache::StakingModuleCache;
use crate::staking_modules::models::{ModuleId, StakingModule};
use crate::support::caching::refresher::{CacheUpdater, UpdateOutcome};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to resolve the latest block: {source}")]
    BlockUnavailable {
        #[source]
        source: ChainReaderError,
    },

    #[error("failed to read staking modules at block {block_number}: {source}")]
    ModulesUnavailable {
        block_number: u64,
        #[source]
        source: ChainReaderError,
    },

    #[error("failed to read operators of staking module {module_id} at block {block_number}: {source}")]
    OperatorsUnavailable {
        module_id: ModuleId,
        block_number: u64,
        #[source]
        source: ChainReaderError,
    },
}

impl ReconcileError {
    fn chain_error(&self) -> &ChainReaderError {
        match self {
            ReconcileError::BlockUnavailable { source }
            | ReconcileError::ModulesUnavailable { source, .. }
            | ReconcileError::OperatorsUnavailable { source, .. } => source,
        }
    }
}

/// Builds a fresh [`RegistrySnapshot`] pinned to a single block and publishes it into the cache,
/// unless it turns out to be older than what is already there.
pub struct RegistryReconciler {
    chain_reader: Box<dyn ChainReader>,
    cache: StakingModuleCache,
    metrics: RegistryMetrics,
    max_concurrent_fetches: usize,
}

impl RegistryReconciler {
    pub(crate) fn new(
        chain_reader: Box<dyn ChainReader>,
        cache: StakingModuleCache,
        metrics: RegistryMetrics,
        max_concurrent_fetches: usize,
    ) -> Self {
        RegistryReconciler {
            chain_reader,
            cache,
            metrics,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
        }
    }

    async fn fetch_registry(
        &self,
        module: &StakingModule,
        block: BlockRef,
    ) -> Result<(ModuleId, ModuleRegistry), ReconcileError> {
        let (operators, meta) = self
            .chain_reader
            .fetch_operators_with_meta(module, &block)
            .await
            .map_err(|source| ReconcileError::OperatorsUnavailable {
                module_id: module.id,
                block_number: block.number,
                source,
            })?;
        debug!(
            module_id = module.id,
            operators = operators.len(),
            "fetched module registry"
        );
        Ok((module.id, ModuleRegistry { operators, meta }))
    }

    async fn fetch_registries(
        &self,
        modules: &[StakingModule],
        block: BlockRef,
    ) -> Result<BTreeMap<ModuleId, ModuleRegistry>, ReconcileError> {
        let fetches: Vec<BoxFuture<'_, _>> = modules
            .iter()
            .filter(|module| module.module_type.requires_key_reconciliation())
            .map(|module| self.fetch_registry(module, block).boxed())
            .collect();

        // the first failure resolves the whole gather; results of fetches still in flight are dropped
        stream::iter(fetches)
            .buffer_unordered(self.max_concurrent_fetches)
            .try_collect()
            .await
    }

    async fn refresh(&self) -> Result<UpdateOutcome, ReconcileError> {
        let block = self
            .chain_reader
            .current_block_ref()
            .await
            .map_err(|source| ReconcileError::BlockUnavailable { source })?;

        let modules = self
            .chain_reader
            .fetch_modules(&block)
            .await
            .map_err(|source| ReconcileError::ModulesUnavailable {
                block_number: block.number,
                source,
            })?;

        let registries = self.fetch_registries(&modules, block).await?;
        let fetched = RegistrySnapshot {
            block,
            modules,
            registries,
        };

        if let Some(cached) = self.cache.snapshot() {
            if fetched.is_older_than(&cached) {
                warn!(
                    cached_block = cached.meta().map(|meta| meta.block_number).unwrap_or(cached.block.number),
                    fetched_block = fetched.meta().map(|meta| meta.block_number).unwrap_or(block.number),
                    "fetched registry state is older than the cached one, keeping the cached snapshot"
                );
                self.metrics.record_snapshot(&cached, cached.timestamp());
                return Ok(UpdateOutcome::Stale {
                    block_number: cached.block.number,
                });
            }
        }

        info!(
            block_number = block.number,
            "Updating staking module cache. There are {} modules and {} operators",
            fetched.modules.len(),
            fetched.operators_count(),
        );
        self.cache.publish(fetched);

        if let Some(published) = self.cache.snapshot() {
            self.metrics
                .record_snapshot(&published, published.timestamp());
        }

        Ok(UpdateOutcome::Published {
            block_number: block.number,
        })
    }
}

#[async_trait]
impl CacheUpdater for RegistryReconciler {
    type Error = ReconcileError;

    async fn try_update(&self) -> Result<UpdateOutcome, Self::Error> {
        self.refresh().await
    }

    fn fatal(error: &Self::Error) -> Option<FatalError> {
        match error.chain_error() {
            source if source.is_unavailable() => None,
            ChainReaderError::UnknownModuleType {
                module_id,
                raw_type,
            } => Some(FatalError::UnknownModuleType {
                module_id: *module_id,
                raw_type: raw_type.clone(),
            }),
            _ => None,
        }
    }
}
