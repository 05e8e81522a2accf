// ABOUTME: Error types for chart discovery, upgrade, test and rollback.
// ABOUTME: Invariant violations are kept apart so callers can treat them as fatal.

use crate::exec::ExecError;

use super::status::ChartStatus;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error(transparent)]
    Command(#[from] ExecError),

    #[error("failed to resolve values for chart {chart}: {reason}")]
    Values { chart: String, reason: String },

    #[error("unreadable status for job {release}: {reason}")]
    JobStatus { release: String, reason: String },

    #[error("tried to upgrade {0} which is not enabled for continuous deployment")]
    NotEnabled(String),

    #[error("tried to {action} {chart} which had status {from}")]
    InvalidTransition {
        chart: String,
        from: ChartStatus,
        action: &'static str,
    },
}

impl ChartError {
    /// Programming errors, as opposed to failures of the outside world.
    pub fn is_invariant(&self) -> bool {
        matches!(
            self,
            ChartError::NotEnabled(_) | ChartError::InvalidTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChartError>;
