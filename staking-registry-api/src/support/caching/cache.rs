// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use arc_swap::ArcSwapOption;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
#[error("the cache item has not been initialised")]
pub struct UninitialisedCache;

/// Single atomically replaced value.
///
/// Readers get an `Arc` to whatever value was current when they asked and never block the
/// writer; a writer replaces the whole value in one swap, so no reader can ever observe a
/// partially updated item.
pub struct SharedCache<T>(Arc<ArcSwapOption<Cache<T>>>);

impl<T> Clone for SharedCache<T> {
    fn clone(&self) -> Self {
        SharedCache(Arc::clone(&self.0))
    }
}

impl<T> Default for SharedCache<T> {
    fn default() -> Self {
        SharedCache(Arc::new(ArcSwapOption::empty()))
    }
}

impl<T> SharedCache<T> {
    pub(crate) fn update(&self, value: T) {
        self.0.store(Some(Arc::new(Cache::new(value))))
    }

    pub(crate) fn get(&self) -> Result<Arc<Cache<T>>, UninitialisedCache> {
        self.0.load_full().ok_or(UninitialisedCache)
    }
}

pub struct Cache<T> {
    value: T,
    as_at: OffsetDateTime,
}

impl<T> Cache<T> {
    pub(crate) fn new(value: T) -> Self {
        Cache {
            value,
            as_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.as_at
    }
}

impl<T> Deref for Cache<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialised_cache_returns_error() {
        let cache: SharedCache<u32> = SharedCache::default();
        assert!(cache.get().is_err());
    }

    #[test]
    fn readers_keep_their_value_across_updates() -> anyhow::Result<()> {
        let cache = SharedCache::default();
        cache.update(vec![1, 2, 3]);

        let before = cache.get()?;
        cache.update(vec![4]);
        let after = cache.get()?;

        assert_eq!(**before, vec![1, 2, 3]);
        assert_eq!(**after, vec![4]);
        assert!(after.timestamp() >= before.timestamp());
        Ok(())
    }
}
