// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::types::{Address, BlockHash, BlockRef};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub type ModuleId = u32;
pub type OperatorIndex = u64;

/// The closed set of module types this service knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum ModuleType {
    #[serde(rename = "curated-onchain-v1")]
    #[strum(serialize = "curated-onchain-v1")]
    CuratedOnchainV1,

    #[serde(rename = "community-onchain-v1")]
    #[strum(serialize = "community-onchain-v1")]
    CommunityOnchainV1,
}

impl ModuleType {
    /// Modules of this type expose the node operators registry interface
    /// and get their operators reconciled on every refresh.
    pub fn requires_key_reconciliation(&self) -> bool {
        matches!(self, ModuleType::CuratedOnchainV1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModuleStatus {
    Active,
    DepositsPaused,
    Stopped,
}

impl TryFrom<u8> for ModuleStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ModuleStatus::Active),
            1 => Ok(ModuleStatus::DepositsPaused),
            2 => Ok(ModuleStatus::Stopped),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingModule {
    pub id: ModuleId,
    pub address: Address,

    /// Module fee, in basis points.
    pub staking_module_fee: u16,

    /// Treasury fee, in basis points.
    pub treasury_fee: u16,

    /// Target share of the total stake, in basis points.
    pub target_share: u16,
    pub status: ModuleStatus,
    pub name: String,
    pub module_type: ModuleType,
    pub last_deposit_at: u64,
    pub last_deposit_block: u64,
    pub exited_validators_count: u64,
}

impl StakingModule {
    /// Identifiers arrive from callers either as the numeric module id or as the module address.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        if let Ok(id) = identifier.parse::<ModuleId>() {
            if id == self.id {
                return true;
            }
        }
        self.address.matches_str(identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub index: OperatorIndex,
    pub active: bool,
    pub name: String,
    pub reward_address: Address,
    pub staking_limit: u64,
    pub stopped_validators: u64,
    pub total_signing_keys: u64,
    pub used_signing_keys: u64,
}

impl Operator {
    pub fn unused_signing_keys(&self) -> u64 {
        self.total_signing_keys
            .saturating_sub(self.used_signing_keys)
    }
}

/// Identifies the version of the on-chain registry state a snapshot reflects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMeta {
    pub keys_op_index: u64,
    pub block_number: u64,
    pub block_hash: BlockHash,
    pub timestamp: u64,
}

impl RegistryMeta {
    pub fn at_block(keys_op_index: u64, block: &BlockRef) -> Self {
        RegistryMeta {
            keys_op_index,
            block_number: block.number,
            block_hash: block.hash,
            timestamp: block.timestamp,
        }
    }

    /// Whether this meta describes state strictly older than `other`.
    pub fn is_older_than(&self, other: &RegistryMeta) -> bool {
        self.block_number < other.block_number
    }
}


#[cfg(test)]
mod tests {
    use super::test_helpers::module;
    use super::*;

    #[test]
    fn module_type_parsing() {
        assert_eq!(
            "curated-onchain-v1".parse::<ModuleType>(),
            Ok(ModuleType::CuratedOnchainV1)
        );
        assert_eq!(
            "community-onchain-v1".parse::<ModuleType>(),
            Ok(ModuleType::CommunityOnchainV1)
        );
        assert!("something-else-v9".parse::<ModuleType>().is_err());
        assert_eq!(
            ModuleType::CuratedOnchainV1.to_string(),
            "curated-onchain-v1"
        );
    }

    #[test]
    fn module_identifier_matching() {
        let module = module(1, ModuleType::CuratedOnchainV1);
        assert!(module.matches_identifier("1"));
        assert!(module.matches_identifier(&module.address.to_string()));
        assert!(module.matches_identifier(&module.address.to_string().to_uppercase()[2..]));
        assert!(!module.matches_identifier("2"));
        assert!(!module.matches_identifier("0x01"));
        assert!(!module.matches_identifier("foo"));
    }

    #[test]
    fn module_status_conversion() {
        assert_eq!(ModuleStatus::try_from(1), Ok(ModuleStatus::DepositsPaused));
        assert_eq!(ModuleStatus::try_from(3), Err(3));
    }
}
