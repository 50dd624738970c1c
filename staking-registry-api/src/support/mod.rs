// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

pub(crate) mod caching;
pub(crate) mod cli;
pub(crate) mod config;
pub(crate) mod http;
pub(crate) mod logging;
