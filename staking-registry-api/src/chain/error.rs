// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::abi::AbiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainReaderError {
    #[error("failed to reach the chain rpc endpoint: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    #[error("the rpc request '{method}' has timed out")]
    Timeout { method: String },

    #[error("the rpc endpoint returned an error for '{method}': {code} - {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("the rpc endpoint returned malformed data for '{context}': {reason}")]
    MalformedResponse { context: String, reason: String },

    #[error("failed to decode the contract call result for '{context}': {source}")]
    Decoding {
        context: String,
        #[source]
        source: AbiError,
    },

    #[error("staking module {module_id} declared an unknown module type '{raw_type}'")]
    UnknownModuleType { module_id: u32, raw_type: String },
}

impl ChainReaderError {
    pub(crate) fn malformed(context: impl Into<String>, reason: impl ToString) -> Self {
        ChainReaderError::MalformedResponse {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decoding(context: impl Into<String>, source: AbiError) -> Self {
        ChainReaderError::Decoding {
            context: context.into(),
            source,
        }
    }

    /// Whether this is a transient failure of the chain or its transport that the next scheduled
    /// refresh is expected to recover from.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, ChainReaderError::UnknownModuleType { .. })
    }
}
