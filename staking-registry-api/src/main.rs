// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::support::cli::Cli;
use crate::support::logging::setup_tracing_logger;
use clap::Parser;

mod chain;
mod error;
mod metrics;
pub(crate) mod staking_modules;
pub(crate) mod support;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    setup_tracing_logger()?;

    args.execute().await
}
