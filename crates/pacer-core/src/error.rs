//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A phase entry was rejected while building a schedule.
    #[error("Invalid schedule: {reason}")]
    InvalidSchedule { reason: String },

    /// Custom phases were requested but none were supplied.
    #[error("Invalid schedule: custom schedule requires at least one phase")]
    EmptySchedule,

    /// The current phase cannot be skipped.
    #[error("Phase {phase} is not skippable")]
    PhaseNotSkippable { phase: String },
}

impl DomainError {
    /// Creates an invalid schedule error from any displayable reason.
    pub fn invalid_schedule(reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        let err = DomainError::invalid_schedule("phase 1: duration must be positive (got 0)");
        assert_eq!(
            err.to_string(),
            "Invalid schedule: phase 1: duration must be positive (got 0)"
        );

        assert_eq!(
            DomainError::EmptySchedule.to_string(),
            "Invalid schedule: custom schedule requires at least one phase"
        );

        let err = DomainError::PhaseNotSkippable {
            phase: "coding".to_string(),
        };
        assert_eq!(err.to_string(), "Phase coding is not skippable");
    }
}
