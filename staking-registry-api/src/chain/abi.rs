// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

//! Just enough of the contract ABI to issue the read-only calls we need and decode their results.
//! Everything operates on 32-byte words; dynamic values (strings, arrays, tuples containing them)
//! are located through offsets stored in the head of their enclosing value.

use crate::chain::types::{Address, ADDRESS_LENGTH};
use thiserror::Error;

pub(crate) const WORD: usize = 32;

pub(crate) type Selector = [u8; 4];

// StakingRouter
pub(crate) const GET_STAKING_MODULES: Selector = [0x61, 0x83, 0x21, 0x4d];

// staking module (IStakingModule)
pub(crate) const GET_TYPE: Selector = [0x15, 0xda, 0xe0, 0x3e];
pub(crate) const GET_NONCE: Selector = [0xd0, 0x87, 0xd2, 0x88];

// node operators registry
pub(crate) const GET_NODE_OPERATORS_COUNT: Selector = [0xa7, 0x0c, 0x70, 0xe4];
pub(crate) const GET_NODE_OPERATOR: Selector = [0x9a, 0x56, 0x98, 0x3c];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("attempted to read {len} bytes at offset {offset}, but only {available} are available")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("the value at offset {offset} does not fit in the target integer type")]
    Overflow { offset: usize },

    #[error("the value at offset {offset} is not a valid boolean")]
    InvalidBool { offset: usize },

    #[error("the value at offset {offset} is not a valid address")]
    InvalidAddress { offset: usize },

    #[error("the string at offset {offset} is not valid utf8")]
    InvalidUtf8 { offset: usize },
}

pub(crate) enum Token {
    Uint(u64),
    Bool(bool),
}

impl Token {
    fn to_word(&self) -> [u8; WORD] {
        let mut word = [0u8; WORD];
        match self {
            Token::Uint(value) => word[WORD - 8..].copy_from_slice(&value.to_be_bytes()),
            Token::Bool(value) => word[WORD - 1] = u8::from(*value),
        }
        word
    }
}

/// Produces `0x`-prefixed calldata for a call with only static arguments.
pub(crate) fn encode_call(selector: Selector, args: &[Token]) -> String {
    let mut data = Vec::with_capacity(selector.len() + args.len() * WORD);
    data.extend_from_slice(&selector);
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    format!("0x{}", hex::encode(data))
}

#[derive(Clone, Copy)]
pub(crate) struct AbiDecoder<'a> {
    data: &'a [u8],
}

impl<'a> AbiDecoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        AbiDecoder { data }
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], AbiError> {
        let out_of_bounds = || AbiError::OutOfBounds {
            offset,
            len,
            available: self.data.len(),
        };
        let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
        self.data.get(offset..end).ok_or_else(out_of_bounds)
    }

    fn word_at(&self, offset: usize) -> Result<&'a [u8], AbiError> {
        self.slice(offset, WORD)
    }

    /// Returns a decoder whose offsets are relative to `offset` within this one.
    pub(crate) fn nested(&self, offset: usize) -> Result<AbiDecoder<'a>, AbiError> {
        let len = self.data.len().checked_sub(offset).ok_or(AbiError::OutOfBounds {
            offset,
            len: 0,
            available: self.data.len(),
        })?;
        Ok(AbiDecoder {
            data: self.slice(offset, len)?,
        })
    }

    pub(crate) fn uint_at(&self, offset: usize) -> Result<u64, AbiError> {
        let word = self.word_at(offset)?;
        let (high, low) = word.split_at(WORD - 8);
        if high.iter().any(|b| *b != 0) {
            return Err(AbiError::Overflow { offset });
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(low);
        Ok(u64::from_be_bytes(bytes))
    }

    pub(crate) fn small_uint_at<T: TryFrom<u64>>(&self, offset: usize) -> Result<T, AbiError> {
        T::try_from(self.uint_at(offset)?).map_err(|_| AbiError::Overflow { offset })
    }

    pub(crate) fn offset_at(&self, offset: usize) -> Result<usize, AbiError> {
        self.small_uint_at(offset)
    }

    pub(crate) fn bool_at(&self, offset: usize) -> Result<bool, AbiError> {
        match self.uint_at(offset) {
            Ok(0) => Ok(false),
            Ok(1) => Ok(true),
            _ => Err(AbiError::InvalidBool { offset }),
        }
    }

    pub(crate) fn address_at(&self, offset: usize) -> Result<Address, AbiError> {
        let word = self.word_at(offset)?;
        let (padding, raw) = word.split_at(WORD - ADDRESS_LENGTH);
        if padding.iter().any(|b| *b != 0) {
            return Err(AbiError::InvalidAddress { offset });
        }
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(raw);
        Ok(Address::new(bytes))
    }

    /// Decodes a right-padded `bytes32` holding a short string, e.g. a module type identifier.
    pub(crate) fn bytes32_string_at(&self, offset: usize) -> Result<String, AbiError> {
        let word = self.word_at(offset)?;
        let end = word.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1);
        String::from_utf8(word[..end].to_vec()).map_err(|_| AbiError::InvalidUtf8 { offset })
    }

    /// Decodes a dynamic `string` whose location is stored in the head word at `head_offset`.
    pub(crate) fn string_at(&self, head_offset: usize) -> Result<String, AbiError> {
        let start = self.offset_at(head_offset)?;
        let len: usize = self.small_uint_at(start)?;
        let raw = self.slice(start + WORD, len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| AbiError::InvalidUtf8 { offset: start })
    }

    /// Resolves a dynamic array whose location is stored in the head word at `head_offset`.
    /// Returns the number of elements along with a decoder positioned at the first element.
    pub(crate) fn array_at(&self, head_offset: usize) -> Result<(usize, AbiDecoder<'a>), AbiError> {
        let start = self.offset_at(head_offset)?;
        let len = self.small_uint_at(start)?;
        Ok((len, self.nested(start + WORD)?))
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::WORD;

    pub(crate) fn uint(value: u64) -> Vec<u8> {
        let mut word = vec![0u8; WORD];
        word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
        word
    }

    pub(crate) fn address(bytes: [u8; 20]) -> Vec<u8> {
        let mut word = vec![0u8; WORD - 20];
        word.extend_from_slice(&bytes);
        word
    }

    pub(crate) fn bytes32_string(value: &str) -> Vec<u8> {
        let mut word = value.as_bytes().to_vec();
        word.resize(WORD, 0);
        word
    }

    /// Length-prefixed, right-padded string payload (without the head offset pointing to it).
    pub(crate) fn string_tail(value: &str) -> Vec<u8> {
        let mut out = uint(value.len() as u64);
        let mut body = value.as_bytes().to_vec();
        let padded = body.len().div_ceil(WORD) * WORD;
        body.resize(padded, 0);
        out.extend(body);
        out
    }
}
