use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Lifecycle of one pipeline execution: `Running` moves exactly once to
/// `Completed` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Error,
}

impl ExecutionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether moving from `self` to `next` is a legal step. Re-applying the
    /// current status is accepted so duplicate writes stay idempotent.
    #[must_use]
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        self == next || (self == Self::Running && next.is_terminal())
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(Error::Validation(format!("unknown execution status '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use ExecutionStatus::*;
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Error));
        assert!(Completed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Error));
        assert!(!Error.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Running));
    }

    #[test]
    fn test_round_trip_text() {
        assert_eq!("error".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::Error);
        assert!("success".parse::<ExecutionStatus>().is_err());
    }
}
