//! Step outcomes and the process exit-code contract.

use std::process::ExitCode;

/// Final status of a preflight run.
///
/// The numeric mapping is part of the external contract and must not change:
/// callers script against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// All checks passed or were downgraded to warnings; host ready.
    Ready,
    /// A fatal precondition failed.
    Failed,
    /// The virtualization feature was just enabled; restart before re-running.
    RestartRequired,
}

impl ExitStatus {
    /// Process exit code for this status.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Ready => 0,
            Self::Failed => 1,
            Self::RestartRequired => 2,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Outcome of a single preflight step.
///
/// Steps write their own transcript lines as they execute; the message
/// carried here mirrors the decisive line so the runner can reduce the
/// ordered outcomes without re-logging. `Warn` marks any non-fatal
/// degradation, whatever severity the step logged it at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Step passed.
    Continue,
    /// Step degraded but non-fatal; the run continues.
    Warn(String),
    /// Step failed; the run stops with this status.
    Fatal(ExitStatus, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(ExitStatus::Ready.code(), 0);
        assert_eq!(ExitStatus::Failed.code(), 1);
        assert_eq!(ExitStatus::RestartRequired.code(), 2);
    }
}
