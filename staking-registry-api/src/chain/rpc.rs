// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::abi::{
    encode_call, AbiDecoder, AbiError, Token, GET_NODE_OPERATOR, GET_NODE_OPERATORS_COUNT,
    GET_NONCE, GET_STAKING_MODULES, GET_TYPE, WORD,
};
use crate::chain::error::ChainReaderError;
use crate::chain::types::{Address, BlockRef};
use crate::chain::ChainReader;
use crate::staking_modules::models::{
    ModuleStatus, ModuleType, Operator, RegistryMeta, StakingModule,
};
use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

// how many `getNodeOperator` calls of a single module are allowed to be in flight at once
const OPERATOR_FETCH_CONCURRENCY: usize = 16;

#[derive(Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcBlockHeader {
    number: String,
    hash: String,
    timestamp: String,
}

impl RpcBlockHeader {
    fn try_into_block_ref(self) -> Result<BlockRef, ChainReaderError> {
        Ok(BlockRef {
            number: parse_quantity("block.number", &self.number)?,
            hash: self
                .hash
                .parse()
                .map_err(|err| ChainReaderError::malformed("block.hash", err))?,
            timestamp: parse_quantity("block.timestamp", &self.timestamp)?,
        })
    }
}

fn strip_hex_prefix(raw: &str) -> &str {
    raw.strip_prefix("0x").unwrap_or(raw)
}

fn parse_quantity(context: &str, raw: &str) -> Result<u64, ChainReaderError> {
    u64::from_str_radix(strip_hex_prefix(raw), 16)
        .map_err(|err| ChainReaderError::malformed(context, err))
}

/// Module data as returned by the staking router, before its type has been resolved.
struct RouterModuleEntry {
    id: u32,
    address: Address,
    staking_module_fee: u16,
    treasury_fee: u16,
    target_share: u16,
    status: u8,
    name: String,
    last_deposit_at: u64,
    last_deposit_block: u64,
    exited_validators_count: u64,
}

impl RouterModuleEntry {
    fn decode(tuple: AbiDecoder<'_>) -> Result<Self, AbiError> {
        Ok(RouterModuleEntry {
            id: tuple.small_uint_at(0)?,
            address: tuple.address_at(WORD)?,
            staking_module_fee: tuple.small_uint_at(2 * WORD)?,
            treasury_fee: tuple.small_uint_at(3 * WORD)?,
            target_share: tuple.small_uint_at(4 * WORD)?,
            status: tuple.small_uint_at(5 * WORD)?,
            name: tuple.string_at(6 * WORD)?,
            last_deposit_at: tuple.uint_at(7 * WORD)?,
            last_deposit_block: tuple.uint_at(8 * WORD)?,
            exited_validators_count: tuple.uint_at(9 * WORD)?,
        })
    }

    fn into_module(self, module_type: ModuleType) -> Result<StakingModule, ChainReaderError> {
        let status = ModuleStatus::try_from(self.status).map_err(|raw| {
            ChainReaderError::malformed(
                format!("module {} status", self.id),
                format!("unknown module status {raw}"),
            )
        })?;

        Ok(StakingModule {
            id: self.id,
            address: self.address,
            staking_module_fee: self.staking_module_fee,
            treasury_fee: self.treasury_fee,
            target_share: self.target_share,
            status,
            name: self.name,
            module_type,
            last_deposit_at: self.last_deposit_at,
            last_deposit_block: self.last_deposit_block,
            exited_validators_count: self.exited_validators_count,
        })
    }
}

// decodes the result of `getStakingModules()`, i.e. a dynamic array of dynamic tuples
fn decode_router_modules(data: &[u8]) -> Result<Vec<RouterModuleEntry>, AbiError> {
    let (len, elements) = AbiDecoder::new(data).array_at(0)?;
    (0..len)
        .map(|i| {
            let tuple_offset = elements.offset_at(i * WORD)?;
            RouterModuleEntry::decode(elements.nested(tuple_offset)?)
        })
        .collect()
}

// decodes the result of `getNodeOperator(uint256,bool)`
fn decode_operator(index: u64, data: &[u8]) -> Result<Operator, AbiError> {
    let decoder = AbiDecoder::new(data);
    Ok(Operator {
        index,
        active: decoder.bool_at(0)?,
        name: decoder.string_at(WORD)?,
        reward_address: decoder.address_at(2 * WORD)?,
        staking_limit: decoder.uint_at(3 * WORD)?,
        stopped_validators: decoder.uint_at(4 * WORD)?,
        total_signing_keys: decoder.uint_at(5 * WORD)?,
        used_signing_keys: decoder.uint_at(6 * WORD)?,
    })
}

/// [`ChainReader`] backed by a standard execution-layer JSON-RPC endpoint.
pub(crate) struct JsonRpcChainReader {
    client: reqwest::Client,
    endpoint: Url,
    staking_router: Address,
    request_id: AtomicU64,
}

impl JsonRpcChainReader {
    pub(crate) fn new(
        endpoint: Url,
        staking_router: Address,
        request_timeout: Duration,
    ) -> Result<Self, ChainReaderError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(JsonRpcChainReader {
            client,
            endpoint,
            staking_router,
            request_id: AtomicU64::new(1),
        })
    }

    async fn request<P, T>(&self, method: &str, params: P) -> Result<T, ChainReaderError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        trace!("sending rpc request {id}: {method}");

        let map_transport = |source: reqwest::Error| {
            if source.is_timeout() {
                ChainReaderError::Timeout {
                    method: method.to_string(),
                }
            } else {
                ChainReaderError::Transport { source }
            }
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(self.endpoint.clone())
            .json(&JsonRpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(map_transport)?
            .json()
            .await
            .map_err(map_transport)?;

        if let Some(err) = response.error {
            return Err(ChainReaderError::Rpc {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        response.result.ok_or_else(|| {
            ChainReaderError::malformed(method, "the response contained neither result nor error")
        })
    }

    async fn call(
        &self,
        to: Address,
        calldata: String,
        block: &BlockRef,
    ) -> Result<Vec<u8>, ChainReaderError> {
        // pin the call to the exact block (EIP-1898) so a reorg can't mix state between calls
        let params = json!([
            { "to": to.to_string(), "data": calldata },
            { "blockHash": block.hash.to_string() },
        ]);
        let raw: String = self.request("eth_call", params).await?;
        hex::decode(strip_hex_prefix(&raw)).map_err(|err| ChainReaderError::malformed("eth_call", err))
    }

    async fn module_type(
        &self,
        entry: &RouterModuleEntry,
        block: &BlockRef,
    ) -> Result<ModuleType, ChainReaderError> {
        let context = format!("module {} getType", entry.id);
        let data = self
            .call(entry.address, encode_call(GET_TYPE, &[]), block)
            .await?;
        let raw_type = AbiDecoder::new(&data)
            .bytes32_string_at(0)
            .map_err(|err| ChainReaderError::decoding(&context, err))?;

        raw_type
            .parse()
            .map_err(|_| ChainReaderError::UnknownModuleType {
                module_id: entry.id,
                raw_type,
            })
    }

    async fn operators_count(
        &self,
        module: &StakingModule,
        block: &BlockRef,
    ) -> Result<u64, ChainReaderError> {
        let data = self
            .call(module.address, encode_call(GET_NODE_OPERATORS_COUNT, &[]), block)
            .await?;
        AbiDecoder::new(&data).uint_at(0).map_err(|err| {
            ChainReaderError::decoding(format!("module {} getNodeOperatorsCount", module.id), err)
        })
    }

    async fn operator(
        &self,
        module: &StakingModule,
        index: u64,
        block: &BlockRef,
    ) -> Result<Operator, ChainReaderError> {
        let calldata = encode_call(GET_NODE_OPERATOR, &[Token::Uint(index), Token::Bool(true)]);
        let data = self.call(module.address, calldata, block).await?;
        decode_operator(index, &data).map_err(|err| {
            ChainReaderError::decoding(
                format!("module {} getNodeOperator({index})", module.id),
                err,
            )
        })
    }

    async fn keys_op_index(
        &self,
        module: &StakingModule,
        block: &BlockRef,
    ) -> Result<u64, ChainReaderError> {
        let data = self
            .call(module.address, encode_call(GET_NONCE, &[]), block)
            .await?;
        AbiDecoder::new(&data)
            .uint_at(0)
            .map_err(|err| ChainReaderError::decoding(format!("module {} getNonce", module.id), err))
    }
}

#[async_trait]
impl ChainReader for JsonRpcChainReader {
    async fn current_block_ref(&self) -> Result<BlockRef, ChainReaderError> {
        let header: RpcBlockHeader = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        header.try_into_block_ref()
    }

    async fn fetch_modules(&self, block: &BlockRef) -> Result<Vec<StakingModule>, ChainReaderError> {
        let data = self
            .call(
                self.staking_router,
                encode_call(GET_STAKING_MODULES, &[]),
                block,
            )
            .await?;
        let entries = decode_router_modules(&data)
            .map_err(|err| ChainReaderError::decoding("getStakingModules", err))?;
        debug!(
            "the staking router reported {} modules at block {}",
            entries.len(),
            block.number
        );

        let module_types = futures::future::try_join_all(
            entries.iter().map(|entry| self.module_type(entry, block)),
        )
        .await?;

        entries
            .into_iter()
            .zip(module_types)
            .map(|(entry, module_type)| entry.into_module(module_type))
            .collect()
    }

    async fn fetch_operators_with_meta(
        &self,
        module: &StakingModule,
        block: &BlockRef,
    ) -> Result<(Vec<Operator>, Option<RegistryMeta>), ChainReaderError> {
        let keys_op_index = self.keys_op_index(module, block).await?;
        let count = self.operators_count(module, block).await?;

        let operators = stream::iter(0..count)
            .map(|index| self.operator(module, index, block))
            .buffered(OPERATOR_FETCH_CONCURRENCY)
            .try_collect::<Vec<_>>()
            .await?;

        Ok((operators, Some(RegistryMeta::at_block(keys_op_index, block))))
    }
}
