// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::error::ChainReaderError;
use crate::chain::types::BlockRef;
use crate::staking_modules::models::{Operator, RegistryMeta, StakingModule};
use async_trait::async_trait;

pub(crate) mod abi;
pub(crate) mod error;
pub(crate) mod rpc;
pub(crate) mod types;

#[cfg(test)]
pub(crate) mod mock;

pub(crate) use rpc::JsonRpcChainReader;

/// Read-only access to the on-chain staking registry.
///
/// All calls are idempotent for a fixed block reference.
#[async_trait]
pub(crate) trait ChainReader: Send + Sync {
    async fn current_block_ref(&self) -> Result<BlockRef, ChainReaderError>;

    /// Fails with [`ChainReaderError::UnknownModuleType`] if any module declares a type
    /// outside of [`ModuleType`](crate::staking_modules::models::ModuleType).
    async fn fetch_modules(&self, block: &BlockRef) -> Result<Vec<StakingModule>, ChainReaderError>;

    async fn fetch_operators_with_meta(
        &self,
        module: &StakingModule,
        block: &BlockRef,
    ) -> Result<(Vec<Operator>, Option<RegistryMeta>), ChainReaderError>;
}
