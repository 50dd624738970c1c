// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use crate::staking_modules::models::ModuleId;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Conditions after which the process must not keep running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error("staking module {module_id} declares unknown module type '{raw_type}'")]
    UnknownModuleType { module_id: ModuleId, raw_type: String },

    #[error(
        "no refresh cycle has completed within {timeout:?} (last known block: {last_block_number:?})"
    )]
    LivenessTimeout {
        timeout: Duration,
        last_block_number: Option<u64>,
    },
}

impl FatalError {
    /// Exit codes differ so a supervisor can tell schema drift apart from a frozen process.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::UnknownModuleType { .. } => 65,
            FatalError::LivenessTimeout { .. } => 75,
        }
    }
}

pub(crate) type FatalHandler = Arc<dyn Fn(FatalError) + Send + Sync>;

pub(crate) fn process_exit_handler() -> FatalHandler {
    Arc::new(|err: FatalError| {
        match &err {
            FatalError::UnknownModuleType {
                module_id,
                raw_type,
            } => error!(
                module_id,
                raw_type = raw_type.as_str(),
                "terminating: {err}"
            ),
            FatalError::LivenessTimeout {
                timeout,
                last_block_number,
            } => error!(
                last_block_number = ?last_block_number,
                timeout = ?timeout,
                "terminating: {err}"
            ),
        }

        // the only place the process is allowed to terminate on its own
        #[allow(clippy::exit)]
        std::process::exit(err.exit_code())
    })
}

#[cfg(test)]
pub(crate) mod test_helpers {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    pub(crate) struct RecordedFatalErrors(Arc<Mutex<Vec<FatalError>>>);

    impl RecordedFatalErrors {
        pub(crate) fn handler(&self) -> FatalHandler {
            let recorded = self.0.clone();
            Arc::new(move |err| recorded.lock().unwrap().push(err))
        }

        pub(crate) fn all(&self) -> Vec<FatalError> {
            self.0.lock().unwrap().clone()
        }
    }
}
