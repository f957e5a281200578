//! The phase state machine and the data it owns.

pub mod machine;
pub mod state;

pub use machine::Orchestrator;
pub use state::{Finding, FindingOutcome, LogEntry, OperationState, PhaseResult, PhaseStatus};

use crate::doctrine::PhaseDefinition;

/// Where the orchestrator is in its lifecycle.
///
/// `Executing` and `PhaseComplete` only exist inside `approve`; callers see
/// them through `PhaseObserver` callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrchestratorState {
    #[default]
    Idle,
    AwaitingGeneration,
    AwaitingApproval,
    Executing,
    PhaseComplete,
    OperationComplete,
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::AwaitingGeneration => "awaiting generation",
            OrchestratorState::AwaitingApproval => "awaiting approval",
            OrchestratorState::Executing => "executing",
            OrchestratorState::PhaseComplete => "phase complete",
            OrchestratorState::OperationComplete => "operation complete",
        };
        f.write_str(s)
    }
}

/// Progress callbacks fired while a phase executes.
///
/// Every method has an empty default so observers only implement what they
/// render.
pub trait PhaseObserver: Send + Sync {
    fn phase_started(&self, _phase: &PhaseDefinition, _total_commands: usize) {}

    /// `index` is 1-based.
    fn command_started(&self, _index: usize, _total: usize, _command: &str) {}

    /// Fired after the finding has been appended to the active result.
    fn command_finished(&self, _index: usize, _total: usize, _finding: &Finding) {}

    fn phase_completed(&self, _result: &PhaseResult) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PhaseObserver for NoopObserver {}
