//! Typed error hierarchy for the nsengine core.
//!
//! Only two kinds of failure ever reach a caller of the orchestrator:
//! - `ConfigurationError`: bad phase numbers or missing start parameters
//! - `OperationError::StateViolation`: an entry point called in the wrong state
//!
//! Model failures and command failures are absorbed and recorded as data.

use thiserror::Error;

use crate::orchestrator::OrchestratorState;

/// Invalid configuration or start parameters. Never mutates state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Phase {0} is out of range (valid phases are 0-6)")]
    PhaseOutOfRange(usize),

    #[error("A target domain is required to start an operation")]
    MissingTarget,

    #[error("Model credentials are required to start an operation")]
    MissingCredentials,

    #[error("Failed to initialize model backend: {0}")]
    Backend(String),
}

/// Hard failures surfaced by the orchestrator entry points.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Cannot {operation} while {state}")]
    StateViolation {
        operation: &'static str,
        state: OrchestratorState,
    },
}

/// Failure of a single generation attempt. Converted into a fail-soft
/// `Generation` inside the command generation service.
#[derive(Debug, Error)]
pub(crate) enum GenerationFailure {
    #[error("model call timed out after {0} seconds")]
    Timeout(u64),

    #[error("{0:#}")]
    Model(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_phase_out_of_range_carries_phase() {
        let err = ConfigurationError::PhaseOutOfRange(9);
        assert!(matches!(err, ConfigurationError::PhaseOutOfRange(9)));
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn operation_error_converts_from_configuration_error() {
        let err: OperationError = ConfigurationError::MissingTarget.into();
        match &err {
            OperationError::Configuration(ConfigurationError::MissingTarget) => {}
            _ => panic!("Expected Configuration(MissingTarget)"),
        }
    }

    #[test]
    fn state_violation_names_operation_and_state() {
        let err = OperationError::StateViolation {
            operation: "approve",
            state: OrchestratorState::Idle,
        };
        let msg = err.to_string();
        assert!(msg.contains("approve"));
        assert!(msg.contains("idle"));
    }

    #[test]
    fn generation_failure_timeout_mentions_seconds() {
        let err = GenerationFailure::Timeout(120);
        assert!(err.to_string().contains("120 seconds"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConfigurationError::MissingCredentials);
        assert_std_error(&OperationError::StateViolation {
            operation: "reject",
            state: OrchestratorState::AwaitingGeneration,
        });
        assert_std_error(&GenerationFailure::Timeout(1));
    }
}
