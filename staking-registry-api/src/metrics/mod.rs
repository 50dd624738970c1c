// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::staking_modules::cache::data::RegistrySnapshot;
use crate::support::caching::refresher::RefreshOutcome;
use prometheus::{
    Encoder as _, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

pub(crate) mod handlers;

const NAMESPACE: &str = "staking_registry";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to register or encode metrics: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("encoded metrics are not valid utf8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

struct MetricsInner {
    registry: Registry,
    last_update_timestamp: IntGauge,
    last_block_number: IntGauge,
    module_keys_op_index: IntGaugeVec,
    operator_keys: IntGaugeVec,
    refresh_cycles: IntCounterVec,
}

#[derive(Clone)]
pub struct RegistryMetrics {
    inner: Arc<MetricsInner>,
}

fn gauge_value(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl RegistryMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let last_update_timestamp = IntGauge::with_opts(
            Opts::new(
                "last_update_timestamp_seconds",
                "unix timestamp of the currently cached registry snapshot",
            )
            .namespace(NAMESPACE),
        )?;
        let last_block_number = IntGauge::with_opts(
            Opts::new(
                "last_block_number",
                "block number the currently cached registry snapshot was read at",
            )
            .namespace(NAMESPACE),
        )?;
        let module_keys_op_index = IntGaugeVec::new(
            Opts::new(
                "module_keys_op_index",
                "keys operation index (nonce) of every reconciled staking module",
            )
            .namespace(NAMESPACE),
            &["module_id"],
        )?;
        let operator_keys = IntGaugeVec::new(
            Opts::new(
                "operator_keys",
                "signing keys of every operator, split into used and unused",
            )
            .namespace(NAMESPACE),
            &["module_id", "operator_index", "used"],
        )?;
        let refresh_cycles = IntCounterVec::new(
            Opts::new("refresh_cycles_total", "refresh cycles by their outcome")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;

        registry.register(Box::new(last_update_timestamp.clone()))?;
        registry.register(Box::new(last_block_number.clone()))?;
        registry.register(Box::new(module_keys_op_index.clone()))?;
        registry.register(Box::new(operator_keys.clone()))?;
        registry.register(Box::new(refresh_cycles.clone()))?;

        Ok(RegistryMetrics {
            inner: Arc::new(MetricsInner {
                registry,
                last_update_timestamp,
                last_block_number,
                module_keys_op_index,
                operator_keys,
                refresh_cycles,
            }),
        })
    }

    /// Rebuilds every snapshot-derived metric from scratch, so nothing that disappeared
    /// from the registry keeps being reported.
    pub(crate) fn record_snapshot(&self, snapshot: &RegistrySnapshot, updated_at: OffsetDateTime) {
        let inner = &self.inner;
        inner
            .last_update_timestamp
            .set(updated_at.unix_timestamp());
        inner
            .last_block_number
            .set(gauge_value(snapshot.block.number));

        inner.module_keys_op_index.reset();
        inner.operator_keys.reset();

        for (module_id, registry) in &snapshot.registries {
            let module_id = module_id.to_string();
            if let Some(meta) = &registry.meta {
                inner
                    .module_keys_op_index
                    .with_label_values(&[module_id.as_str()])
                    .set(gauge_value(meta.keys_op_index));
            }

            for operator in &registry.operators {
                let index = operator.index.to_string();
                inner
                    .operator_keys
                    .with_label_values(&[module_id.as_str(), index.as_str(), "true"])
                    .set(gauge_value(operator.used_signing_keys));
                inner
                    .operator_keys
                    .with_label_values(&[module_id.as_str(), index.as_str(), "false"])
                    .set(gauge_value(operator.unused_signing_keys()));
            }
        }
    }

    pub(crate) fn record_cycle(&self, outcome: RefreshOutcome) {
        let label: &'static str = outcome.into();
        self.inner
            .refresh_cycles
            .with_label_values(&[label])
            .inc()
    }

    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = vec![];
        TextEncoder::new().encode(&self.inner.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
