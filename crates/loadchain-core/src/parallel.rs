use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ComposeError, Result};

/// The `parallel` option as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParallelOption {
    Toggle(bool),
    /// Explicit worker count. Kept signed so that bad input is rejected
    /// instead of failing to parse.
    Workers(i64),
}

/// Whether a parallel-worker stage is inserted, and with how many workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelDecision {
    pub enabled: bool,
    /// `None` leaves the worker count to the executor's default
    pub worker_count: Option<usize>,
}

impl ParallelDecision {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == Some(0) {
            return Err(ComposeError::invalid("parallel worker count must be positive"));
        }
        Ok(())
    }
}

/// Parallel workers are only used for production builds the user opted into
pub fn decide(production: bool, option: Option<&ParallelOption>) -> Result<ParallelDecision> {
    let (requested, worker_count) = match option {
        None | Some(ParallelOption::Toggle(false)) => (false, None),
        Some(ParallelOption::Toggle(true)) => (true, None),
        Some(ParallelOption::Workers(n)) if *n > 0 => {
            let count = usize::try_from(*n).map_err(|_| {
                ComposeError::invalid(format!("parallel worker count {} is too large", n))
            })?;
            (true, Some(count))
        }
        Some(ParallelOption::Workers(n)) => {
            return Err(ComposeError::invalid(format!(
                "parallel must be a boolean or a positive integer, got {}",
                n
            )));
        }
    };

    let decision = ParallelDecision {
        enabled: production && requested,
        worker_count,
    };
    debug!(
        "Parallel decision: enabled={}, workers={:?}",
        decision.enabled, decision.worker_count
    );
    Ok(decision)
}
