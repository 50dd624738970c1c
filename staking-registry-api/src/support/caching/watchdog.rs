// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::error::{FatalError, FatalHandler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    last_block_number: Option<u64>,
}

/// Cheap handle used by the refresher to push the watchdog deadline forward.
#[derive(Clone)]
pub(crate) struct WatchdogHandle {
    timeout: Duration,
    deadline: Arc<watch::Sender<Deadline>>,
}

impl WatchdogHandle {
    /// Replaces the pending deadline with `now + timeout`.
    /// The previous deadline is discarded in the same step and can no longer fire.
    pub(crate) fn rearm(&self, block_number: u64) {
        self.deadline.send_replace(Deadline {
            at: Instant::now() + self.timeout,
            last_block_number: Some(block_number),
        });
    }

    pub(crate) fn last_block_number(&self) -> Option<u64> {
        self.deadline.borrow().last_block_number
    }
}

/// Terminates the process through the fatal handler if it is not re-armed within `timeout`.
pub(crate) struct LivenessWatchdog {
    timeout: Duration,
    deadline: Arc<watch::Sender<Deadline>>,
    fatal_handler: FatalHandler,
}

impl LivenessWatchdog {
    /// Creates a watchdog that is already armed, so a hang in the very first cycle is caught too.
    pub(crate) fn new(timeout: Duration, fatal_handler: FatalHandler) -> Self {
        let (deadline, _) = watch::channel(Deadline {
            at: Instant::now() + timeout,
            last_block_number: None,
        });
        LivenessWatchdog {
            timeout,
            deadline: Arc::new(deadline),
            fatal_handler,
        }
    }

    pub(crate) fn handle(&self) -> WatchdogHandle {
        WatchdogHandle {
            timeout: self.timeout,
            deadline: Arc::clone(&self.deadline),
        }
    }

    pub(crate) async fn run(self, shutdown: CancellationToken) {
        let mut deadline_rx = self.deadline.subscribe();

        loop {
            let deadline = *deadline_rx.borrow_and_update();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    trace!("LivenessWatchdog: received shutdown");
                    break
                }
                Ok(_) = deadline_rx.changed() => {
                    trace!(last_block_number = ?deadline_rx.borrow().last_block_number, "watchdog re-armed");
                }
                _ = time::sleep_until(deadline.at) => {
                    (self.fatal_handler)(FatalError::LivenessTimeout {
                        timeout: self.timeout,
                        last_block_number: deadline.last_block_number,
                    });
                    break
                }
            }
        }
        debug!("LivenessWatchdog: exiting");
    }

    pub(crate) fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::test_helpers::RecordedFatalErrors;

    const TIMEOUT: Duration = Duration::from_secs(30 * 60);

    #[tokio::test(start_paused = true)]
    async fn fires_when_never_rearmed() {
        let fatal = RecordedFatalErrors::default();
        let watchdog = LivenessWatchdog::new(TIMEOUT, fatal.handler());
        let task = watchdog.start(CancellationToken::new());

        time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        assert!(fatal.all().is_empty());

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            fatal.all(),
            vec![FatalError::LivenessTimeout {
                timeout: TIMEOUT,
                last_block_number: None
            }]
        );
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_postpones_the_deadline() {
        let fatal = RecordedFatalErrors::default();
        let watchdog = LivenessWatchdog::new(TIMEOUT, fatal.handler());
        let handle = watchdog.handle();
        watchdog.start(CancellationToken::new());

        // keep completing cycles well past the original deadline
        for block in 100..110 {
            time::sleep(TIMEOUT / 2).await;
            handle.rearm(block);
        }
        assert!(fatal.all().is_empty());
        assert_eq!(handle.last_block_number(), Some(109));

        time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(
            fatal.all(),
            vec![FatalError::LivenessTimeout {
                timeout: TIMEOUT,
                last_block_number: Some(109)
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disarms() {
        let fatal = RecordedFatalErrors::default();
        let shutdown = CancellationToken::new();
        let task = LivenessWatchdog::new(TIMEOUT, fatal.handler()).start(shutdown.clone());

        shutdown.cancel();
        task.await.unwrap();

        time::sleep(TIMEOUT * 2).await;
        assert!(fatal.all().is_empty());
    }
}
