// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::chain::types::Address;
use crate::support::config::Config;
use clap::{Parser, Subcommand};
use humantime_serde::re::humantime;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

pub(crate) mod init;
pub(crate) mod run;

#[derive(Parser, Debug)]
#[clap(version, about)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub(crate) command: Commands,
}

impl Cli {
    pub(crate) async fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Init(args) => init::execute(args),
            Commands::Run(args) => run::execute(*args).await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Initialise a new configuration file for the staking registry API
    Init(init::Args),

    /// Run the staking registry API with provided configuration optionally overriding set parameters
    Run(Box<run::Args>),
}

/// Values that can be set on the command line (or via environment) on top of the config file.
#[derive(clap::Args, Debug)]
pub(crate) struct ConfigOverrides {
    /// JSON-RPC endpoint of the execution layer node.
    /// default: None - config value will be used instead
    #[clap(long, env = "STAKING_REGISTRY_RPC_ENDPOINT")]
    pub(crate) rpc_endpoint: Option<Url>,

    /// Address of the staking router contract.
    /// default: None - config value will be used instead
    #[clap(long, env = "STAKING_REGISTRY_STAKING_ROUTER_ADDRESS")]
    pub(crate) staking_router_address: Option<Address>,

    /// Timeout of a single JSON-RPC request, e.g. "30s".
    /// default: None - config value will be used instead
    #[clap(long, value_parser = humantime::parse_duration, env = "STAKING_REGISTRY_REQUEST_TIMEOUT")]
    pub(crate) request_timeout: Option<Duration>,

    /// Interval between scheduled registry refreshes, e.g. "30s".
    /// default: None - config value will be used instead
    #[clap(long, value_parser = humantime::parse_duration, env = "STAKING_REGISTRY_REFRESH_INTERVAL")]
    pub(crate) refresh_interval: Option<Duration>,

    /// Maximum time without a completed refresh before the process terminates, e.g. "30m".
    /// default: None - config value will be used instead
    #[clap(long, value_parser = humantime::parse_duration, env = "STAKING_REGISTRY_WATCHDOG_TIMEOUT")]
    pub(crate) watchdog_timeout: Option<Duration>,

    /// Maximum number of module registries fetched concurrently.
    /// default: None - config value will be used instead
    #[clap(long, env = "STAKING_REGISTRY_MAX_CONCURRENT_FETCHES")]
    pub(crate) max_concurrent_fetches: Option<usize>,

    /// Socket address the HTTP API binds to.
    /// default: None - config value will be used instead
    #[clap(long, env = "STAKING_REGISTRY_BIND_ADDRESS")]
    pub(crate) bind_address: Option<SocketAddr>,
}

pub(crate) fn override_config(config: Config, args: ConfigOverrides) -> Config {
    config
        .with_optional(Config::with_rpc_endpoint, args.rpc_endpoint)
        .with_optional(
            Config::with_staking_router_address,
            args.staking_router_address,
        )
        .with_optional(Config::with_request_timeout, args.request_timeout)
        .with_optional(Config::with_refresh_interval, args.refresh_interval)
        .with_optional(Config::with_watchdog_timeout, args.watchdog_timeout)
        .with_optional(
            Config::with_max_concurrent_fetches,
            args.max_concurrent_fetches,
        )
        .with_optional(Config::with_bind_address, args.bind_address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_take_precedence() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "staking-registry-api",
            "run",
            "--id",
            "mainnet",
            "--refresh-interval",
            "1m",
            "--staking-router-address",
            "0x00000000000000000000000000000000000000aa",
        ])?;
        let Commands::Run(args) = cli.command else {
            anyhow::bail!("expected the run command");
        };
        assert_eq!(args.id, "mainnet");

        let config = override_config(Config::new("mainnet"), args.overrides);
        assert_eq!(
            config.registry_cache.refresh_interval,
            Duration::from_secs(60)
        );
        assert_eq!(
            config.chain.staking_router_address.to_string(),
            "0x00000000000000000000000000000000000000aa"
        );
        assert_eq!(config.http, Config::new("x").http);
        Ok(())
    }
}
