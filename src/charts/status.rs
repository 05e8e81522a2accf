// ABOUTME: Per-chart deployment status.
// ABOUTME: READY -> UPGRADING -> UPGRADED|UPGRADEFAILED -> ROLLINGBACK -> ROLLEDBACK, or CANTROLLBACK.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartStatus {
    Ready,
    Upgrading,
    Upgraded,
    UpgradeFailed,
    RollingBack,
    RolledBack,
    CantRollback,
}

impl ChartStatus {
    /// Rollback is only defined after an upgrade was attempted.
    pub fn can_roll_back(self) -> bool {
        matches!(self, ChartStatus::Upgraded | ChartStatus::UpgradeFailed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChartStatus::Ready => "READY",
            ChartStatus::Upgrading => "UPGRADING",
            ChartStatus::Upgraded => "UPGRADED",
            ChartStatus::UpgradeFailed => "UPGRADEFAILED",
            ChartStatus::RollingBack => "ROLLINGBACK",
            ChartStatus::RolledBack => "ROLLEDBACK",
            ChartStatus::CantRollback => "CANTROLLBACK",
        }
    }
}

impl fmt::Display for ChartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
