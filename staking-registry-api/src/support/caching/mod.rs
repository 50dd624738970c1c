// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

pub(crate) mod cache;
pub(crate) mod refresher;
pub(crate) mod watchdog;

pub(crate) use cache::{Cache, SharedCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheNotification {
    Start,
    Updated,
}
