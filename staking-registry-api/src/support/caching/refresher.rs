// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::error::{FatalError, FatalHandler};
use crate::support::caching::watchdog::WatchdogHandle;
use crate::support::caching::CacheNotification;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{Display, IntoStaticStr};
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Result of a single update attempt that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateOutcome {
    /// A new value has been published.
    Published { block_number: u64 },

    /// The source returned data older than what is already cached; nothing was published.
    /// `block_number` is the block of the value that stays cached.
    Stale { block_number: u64 },
}

impl UpdateOutcome {
    fn block_number(&self) -> u64 {
        match self {
            UpdateOutcome::Published { block_number } | UpdateOutcome::Stale { block_number } => {
                *block_number
            }
        }
    }
}

#[async_trait]
pub(crate) trait CacheUpdater: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn try_update(&self) -> Result<UpdateOutcome, Self::Error>;

    /// Returns the fatal condition behind `error`, if any.
    /// Any other error is treated as transient and retried on the next trigger.
    fn fatal(error: &Self::Error) -> Option<FatalError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefreshOutcome {
    Published,
    Stale,
    Failed,

    /// Another cycle was already running; this trigger has been dropped.
    Skipped,

    /// The refresher is no longer accepting triggers.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum RefresherState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl From<u8> for RefresherState {
    fn from(value: u8) -> Self {
        match value {
            0 => RefresherState::Idle,
            1 => RefresherState::Running,
            _ => RefresherState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletedCycle {
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub block_number: u64,
    pub outcome: RefreshOutcome,
}

pub(crate) type OutcomeObserver = Arc<dyn Fn(RefreshOutcome) + Send + Sync>;

/// Entry point for triggering refreshes from outside the refresher task.
#[async_trait]
pub(crate) trait RefreshTrigger: Send + Sync {
    async fn trigger(&self) -> RefreshOutcome;

    fn state(&self) -> RefresherState;

    fn last_completed(&self) -> Option<CompletedCycle>;
}

struct RefresherInner<U> {
    name: String,
    updater: U,
    refreshing_interval: Duration,
    state: AtomicU8,
    last_completed: ArcSwapOption<CompletedCycle>,
    watchdog: Option<WatchdogHandle>,
    fatal_handler: FatalHandler,
    outcome_observer: Option<OutcomeObserver>,
    refresh_notification_sender: watch::Sender<CacheNotification>,
}

/// Holds the `Running` state for the duration of a single cycle.
struct RunningGuard<'a> {
    state: &'a AtomicU8,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        // a refresher stopped mid-cycle must stay stopped
        let _ = self.state.compare_exchange(
            RefresherState::Running as u8,
            RefresherState::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl<U> RefresherInner<U> {
    fn try_begin(&self) -> Result<RunningGuard<'_>, RefresherState> {
        self.state
            .compare_exchange(
                RefresherState::Idle as u8,
                RefresherState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| RunningGuard { state: &self.state })
            .map_err(RefresherState::from)
    }
}

/// Periodically refreshes a cache through its [`CacheUpdater`], making sure that at most one
/// update is ever in progress regardless of how many triggers overlap.
pub(crate) struct CacheRefresher<U> {
    inner: Arc<RefresherInner<U>>,
}

impl<U> Clone for CacheRefresher<U> {
    fn clone(&self) -> Self {
        CacheRefresher {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct CacheRefresherBuilder<U> {
    name: String,
    updater: U,
    refreshing_interval: Duration,
    watchdog: Option<WatchdogHandle>,
    fatal_handler: FatalHandler,
    outcome_observer: Option<OutcomeObserver>,
}

impl<U> CacheRefresherBuilder<U> {
    #[must_use]
    pub(crate) fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub(crate) fn with_watchdog(mut self, watchdog: WatchdogHandle) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    #[must_use]
    pub(crate) fn with_outcome_observer(mut self, observer: OutcomeObserver) -> Self {
        self.outcome_observer = Some(observer);
        self
    }

    pub(crate) fn build(self) -> CacheRefresher<U> {
        let (refresh_notification_sender, _) = watch::channel(CacheNotification::Start);
        CacheRefresher {
            inner: Arc::new(RefresherInner {
                name: self.name,
                updater: self.updater,
                refreshing_interval: self.refreshing_interval,
                state: AtomicU8::new(RefresherState::Idle as u8),
                last_completed: ArcSwapOption::empty(),
                watchdog: self.watchdog,
                fatal_handler: self.fatal_handler,
                outcome_observer: self.outcome_observer,
                refresh_notification_sender,
            }),
        }
    }
}

impl<U> CacheRefresher<U>
where
    U: CacheUpdater,
{
    pub(crate) fn builder(
        updater: U,
        refreshing_interval: Duration,
        fatal_handler: FatalHandler,
    ) -> CacheRefresherBuilder<U> {
        CacheRefresherBuilder {
            name: "GenericCacheRefresher".to_string(),
            updater,
            refreshing_interval,
            watchdog: None,
            fatal_handler,
            outcome_observer: None,
        }
    }

    pub(crate) fn update_watcher(&self) -> watch::Receiver<CacheNotification> {
        self.inner.refresh_notification_sender.subscribe()
    }

    pub(crate) fn current_state(&self) -> RefresherState {
        RefresherState::from(self.inner.state.load(Ordering::Acquire))
    }

    pub(crate) fn last_completed(&self) -> Option<CompletedCycle> {
        self.inner.last_completed.load_full().map(|cycle| *cycle)
    }

    /// Moves the refresher into its terminal state. Any in-progress cycle finishes normally,
    /// but every further trigger is rejected.
    pub(crate) fn stop(&self) {
        self.inner
            .state
            .store(RefresherState::Stopped as u8, Ordering::Release)
    }

    /// Runs a single refresh cycle, unless one is already in progress.
    pub(crate) async fn refresh(&self) -> RefreshOutcome {
        let outcome = match self.inner.try_begin() {
            Ok(_running) => self.run_cycle().await,
            Err(RefresherState::Stopped) => {
                trace!("{}: refresher is stopped, ignoring trigger", self.inner.name);
                RefreshOutcome::Stopped
            }
            Err(_) => {
                debug!(
                    "{}: a refresh is already in progress, dropping trigger",
                    self.inner.name
                );
                RefreshOutcome::Skipped
            }
        };

        if let Some(observer) = &self.inner.outcome_observer {
            observer(outcome)
        }
        outcome
    }

    async fn run_cycle(&self) -> RefreshOutcome {
        let name = &self.inner.name;

        let update = match self.inner.updater.try_update().await {
            Ok(update) => update,
            Err(err) => {
                if let Some(fatal) = U::fatal(&err) {
                    error!("{name}: encountered a fatal error: {err}");
                    self.stop();
                    (self.inner.fatal_handler)(fatal);
                    return RefreshOutcome::Stopped;
                }
                warn!("{name}: failed to refresh the cache: {err}");
                return RefreshOutcome::Failed;
            }
        };

        let outcome = match update {
            UpdateOutcome::Published { .. } => {
                self.inner
                    .refresh_notification_sender
                    .send_replace(CacheNotification::Updated);
                RefreshOutcome::Published
            }
            UpdateOutcome::Stale { .. } => RefreshOutcome::Stale,
        };

        // both published and stale cycles prove the chain is being read
        let block_number = update.block_number();
        if let Some(watchdog) = &self.inner.watchdog {
            watchdog.rearm(block_number)
        }
        self.inner
            .last_completed
            .store(Some(Arc::new(CompletedCycle {
                finished_at: OffsetDateTime::now_utc(),
                block_number,
                outcome,
            })));

        info!(block_number, %outcome, "{name}: refresh cycle completed");
        outcome
    }

    /// Refreshes immediately and then on every interval tick until cancelled or stopped.
    /// Ticks missed while a cycle is in progress are dropped rather than queued.
    pub(crate) async fn run(&self, shutdown: CancellationToken) {
        let name = self.inner.name.clone();
        let mut refresh_interval = interval(self.inner.refreshing_interval);
        refresh_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    trace!("{name}: received shutdown");
                    break
                }
                // the first tick completes immediately which gives us the startup refresh
                _ = refresh_interval.tick() => {
                    let started = Instant::now();
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            trace!("{name}: received shutdown");
                            break
                        }
                        outcome = self.refresh() => {
                            if outcome == RefreshOutcome::Stopped {
                                break
                            }
                        }
                    }
                    // an overrunning cycle must not be followed by a catch-up tick
                    if started.elapsed() >= self.inner.refreshing_interval {
                        refresh_interval.reset();
                    }
                }
            }
        }

        self.stop();
        info!("{name}: exiting");
    }

    pub(crate) fn start(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let refresher = self.clone();
        tokio::spawn(async move { refresher.run(shutdown).await })
    }
}

#[async_trait]
impl<U> RefreshTrigger for CacheRefresher<U>
where
    U: CacheUpdater,
{
    async fn trigger(&self) -> RefreshOutcome {
        // detach the cycle so a caller going away cannot abandon it halfway
        let refresher = self.clone();
        match tokio::spawn(async move { refresher.refresh().await }).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("{}: manual refresh task failed: {err}", self.inner.name);
                RefreshOutcome::Failed
            }
        }
    }

    fn state(&self) -> RefresherState {
        self.current_state()
    }

    fn last_completed(&self) -> Option<CompletedCycle> {
        CacheRefresher::last_completed(self)
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    #[derive(Debug, thiserror::Error)]
    pub(crate) enum ScriptedError {
        #[error("transient failure")]
        Transient,
        #[error("fatal failure")]
        Fatal,
    }

    /// Updater replaying scripted results. Each update waits for a permit from `gate` if one is set
    /// and keeps track of how many updates were in progress at once.
    #[derive(Default)]
    pub(crate) struct ScriptedUpdater {
        pub(crate) script: Mutex<VecDeque<Result<UpdateOutcome, ScriptedError>>>,
        pub(crate) gate: Option<Arc<Semaphore>>,
        pub(crate) calls: AtomicUsize,
        pub(crate) in_flight: AtomicUsize,
        pub(crate) max_in_flight: AtomicUsize,
    }

    impl ScriptedUpdater {
        pub(crate) fn new(
            script: impl IntoIterator<Item = Result<UpdateOutcome, ScriptedError>>,
        ) -> Self {
            ScriptedUpdater {
                script: Mutex::new(script.into_iter().collect()),
                ..Default::default()
            }
        }

        pub(crate) fn gated(mut self) -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            self.gate = Some(gate.clone());
            (self, gate)
        }
    }

    #[async_trait]
    impl CacheUpdater for ScriptedUpdater {
        type Error = ScriptedError;

        async fn try_update(&self) -> Result<UpdateOutcome, Self::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(UpdateOutcome::Stale { block_number: 0 }))
        }

        fn fatal(error: &Self::Error) -> Option<FatalError> {
            match error {
                ScriptedError::Transient => None,
                ScriptedError::Fatal => Some(FatalError::UnknownModuleType {
                    module_id: 42,
                    raw_type: "scripted".to_string(),
                }),
            }
        }
    }
}
