// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::support::cli::{override_config, ConfigOverrides};
use crate::support::config::Config;
use anyhow::bail;

#[derive(clap::Args, Debug)]
pub(crate) struct Args {
    /// Id of the staking registry API we want to initialise.
    /// default: "default"
    #[clap(long, default_value = "default", env = "STAKING_REGISTRY_ID")]
    pub(crate) id: String,

    #[clap(flatten)]
    pub(crate) overrides: ConfigOverrides,
}

pub(crate) fn execute(args: Args) -> anyhow::Result<()> {
    eprintln!("initialising staking-registry-api...");

    let config = override_config(Config::new(&args.id), args.overrides);
    let config_path = config.default_location()?;
    if config_path.exists() {
        bail!(
            "there already exists a configuration file at '{}'. If you intend to replace it, you need to manually remove it first",
            config_path.display()
        )
    }

    config.validate()?;
    config.save_to_default_location()?;

    eprintln!("saved the configuration file to {}", config_path.display());
    Ok(())
}
