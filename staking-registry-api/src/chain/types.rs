// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

pub const ADDRESS_LENGTH: usize = 20;
pub const HASH_LENGTH: usize = 32;

#[derive(Debug, Error, PartialEq)]
pub enum HexParseError {
    #[error("'{raw}' is not a valid hex string: {source}")]
    MalformedHex {
        raw: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

fn decode_fixed<const N: usize>(raw: &str) -> Result<[u8; N], HexParseError> {
    let stripped = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);

    let bytes = hex::decode(stripped).map_err(|source| HexParseError::MalformedHex {
        raw: raw.to_string(),
        source,
    })?;

    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| HexParseError::InvalidLength {
            expected: N,
            got: bytes.len(),
        })
}

/// An on-chain account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bytes)
    }

    /// Checks whether the provided string refers to this address, ignoring the case of the hex digits
    /// and the presence of the `0x` prefix.
    pub fn matches_str(&self, raw: &str) -> bool {
        raw.parse::<Address>().map(|a| a == *self).unwrap_or(false)
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(Address)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockHash([u8; HASH_LENGTH]);

impl BlockHash {
    #[cfg(test)]
    pub const fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        BlockHash(bytes)
    }
}

impl FromStr for BlockHash {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(BlockHash)
    }
}

impl Display for BlockHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Reference to a single block that every read of a refresh cycle gets pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub number: u64,
    pub hash: BlockHash,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parsing_ignores_prefix_and_case() -> anyhow::Result<()> {
        let lower: Address = "0xfddf38947afb03c621c71b06c9c70bce73f12999".parse()?;
        let mixed: Address = "0xFdDf38947aFB03C621C71b06C9C70bce73f12999".parse()?;
        let bare: Address = "fddf38947afb03c621c71b06c9c70bce73f12999".parse()?;

        assert_eq!(lower, mixed);
        assert_eq!(lower, bare);
        assert_eq!(
            lower.to_string(),
            "0xfddf38947afb03c621c71b06c9c70bce73f12999"
        );
        assert!(lower.matches_str("0xFDDF38947AFB03C621C71B06C9C70BCE73F12999"));
        assert!(!lower.matches_str("1"));
        Ok(())
    }

    #[test]
    fn address_with_invalid_length_is_rejected() {
        let res = "0xfddf38947afb".parse::<Address>();
        assert_eq!(
            res,
            Err(HexParseError::InvalidLength {
                expected: ADDRESS_LENGTH,
                got: 6
            })
        );
        assert!("0xnothex".parse::<Address>().is_err());
    }
}
