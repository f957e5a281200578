//! The supervised phase loop.
//!
//! `Orchestrator` is the only writer of `OperationState`. It exposes five
//! mutating entry points (`start_operation`, `request_generation`,
//! `approve`, `reject`, `reset`) and read accessors. Every entry point called
//! in the wrong state returns `StateViolation` and leaves the state untouched.

use std::sync::Arc;
use std::time::Duration;

use crate::doctrine::{self, PhaseDefinition};
use crate::errors::{ConfigurationError, OperationError};
use crate::executor::{CommandExecutor, ExecutionOutcome, Substitutions};
use crate::generate::{CommandGenerator, DEFAULT_GENERATION_TIMEOUT_SECS, GenerationContext};
use crate::llm::{Credentials, ModelBackend};

use super::state::{FindingOutcome, OperationState, PhaseResult};
use super::{NoopObserver, OrchestratorState, PhaseObserver};

const LOG_PREVIEW_CHARS: usize = 50;

pub struct Orchestrator {
    backend: Arc<dyn ModelBackend>,
    executor: Arc<dyn CommandExecutor>,
    generation_timeout: Duration,
    /// Present from `start_operation` until `reset`
    generator: Option<CommandGenerator>,
    state: OrchestratorState,
    operation: OperationState,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ModelBackend>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            backend,
            executor,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            generator: None,
            state: OrchestratorState::Idle,
            operation: OperationState::default(),
        }
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn operation(&self) -> &OperationState {
        &self.operation
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Doctrine for the phase that runs next, `None` once all phases are done.
    pub fn current_phase_definition(&self) -> Option<&'static PhaseDefinition> {
        doctrine::lookup(self.operation.current_phase).ok()
    }

    /// Begin a new operation. Allowed from any state; replaces any previous run.
    pub fn start_operation(
        &mut self,
        target: &str,
        credentials: &Credentials,
    ) -> Result<(), OperationError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ConfigurationError::MissingTarget.into());
        }
        if credentials.is_blank() {
            return Err(ConfigurationError::MissingCredentials.into());
        }

        let client = self
            .backend
            .connect(credentials)
            .map_err(|e| ConfigurationError::Backend(format!("{:#}", e)))?;

        self.generator = Some(CommandGenerator::new(client, self.generation_timeout));
        self.operation = OperationState::started(target);
        self.operation
            .log(format!("Operation initiated against {}", target));
        self.state = OrchestratorState::AwaitingGeneration;

        tracing::info!(domain = %target, backend = self.backend.name(), "operation started");
        Ok(())
    }

    /// Ask the model for the current phase's plan and park it for approval.
    pub async fn request_generation(&mut self) -> Result<(), OperationError> {
        if self.state != OrchestratorState::AwaitingGeneration {
            return Err(self.violation("request generation"));
        }
        let Some(generator) = self.generator.as_ref() else {
            return Err(self.violation("request generation"));
        };

        let phase = self.operation.current_phase;
        let context =
            GenerationContext::new(&self.operation.phase_results, &self.operation.target, phase);
        let generation = generator
            .generate(phase, &self.operation.target, &context)
            .await?;

        if generation.is_failure() {
            self.operation
                .log(format!("Command generation failed for phase {}", phase));
        } else {
            self.operation.log(format!(
                "Generated {} commands for phase {}",
                generation.commands.len(),
                phase
            ));
        }

        self.operation.pending_reasoning = generation.reasoning;
        self.operation.pending_commands = generation.commands;
        self.operation.pending_expected_outcome = generation.expected_outcome;
        self.state = OrchestratorState::AwaitingApproval;
        Ok(())
    }

    pub async fn approve(&mut self) -> Result<PhaseResult, OperationError> {
        self.approve_with(&NoopObserver).await
    }

    /// Run the pending commands in order, score the phase and advance.
    ///
    /// Returns a copy of the finalized result.
    pub async fn approve_with(
        &mut self,
        observer: &dyn PhaseObserver,
    ) -> Result<PhaseResult, OperationError> {
        if self.state != OrchestratorState::AwaitingApproval {
            return Err(self.violation("approve"));
        }
        if self.operation.pending_commands.is_empty() {
            return Err(self.violation("approve an empty command list"));
        }
        let phase_number = self.operation.current_phase;
        let definition = doctrine::lookup(phase_number)?;

        self.state = OrchestratorState::Executing;
        let commands = self.operation.pending_commands.clone();
        let total = commands.len();
        let substitutions = Substitutions::for_target(&self.operation.target);

        self.operation.active_phase = Some(PhaseResult::begin(
            phase_number,
            definition.name,
            &self.operation.pending_reasoning,
        ));
        observer.phase_started(definition, total);
        tracing::info!(phase = phase_number, commands = total, "executing phase");

        for (i, command) in commands.iter().enumerate() {
            let index = i + 1;
            self.operation.log(format!(
                "Executing command {}/{}: {}...",
                index,
                total,
                preview(command)
            ));
            observer.command_started(index, total, command);

            let outcome = self.executor.run(command, &substitutions).await;
            tracing::debug!(
                index,
                exit_code = outcome.exit_code,
                stdout_bytes = outcome.stdout.len(),
                "command finished"
            );

            if let Some(active) = self.operation.active_phase.as_mut() {
                let finding = active.record(command, finding_outcome(outcome));
                observer.command_finished(index, total, finding);
            }
        }

        self.state = OrchestratorState::PhaseComplete;
        let mut result = self.operation.active_phase.take().unwrap_or_else(|| {
            PhaseResult::begin(
                phase_number,
                definition.name,
                &self.operation.pending_reasoning,
            )
        });
        result.finalize();

        self.operation.log(format!(
            "Phase {} completed with {:.1}% confidence",
            phase_number,
            result.confidence_score * 100.0
        ));
        self.operation
            .phase_results
            .insert(phase_number, result.clone());
        self.operation.current_phase += 1;
        self.operation.clear_pending();
        observer.phase_completed(&result);

        tracing::info!(
            phase = phase_number,
            confidence = result.confidence_score,
            "phase completed"
        );

        if self.operation.is_complete() {
            self.operation.log("Operation complete");
            self.state = OrchestratorState::OperationComplete;
            tracing::info!("operation complete");
        } else {
            self.state = OrchestratorState::AwaitingGeneration;
        }
        Ok(result)
    }

    /// Discard the pending plan so a fresh one can be generated.
    pub fn reject(&mut self) -> Result<(), OperationError> {
        if self.state != OrchestratorState::AwaitingApproval {
            return Err(self.violation("reject"));
        }
        self.operation.clear_pending();
        self.operation.log(format!(
            "Phase {} commands rejected, awaiting regeneration",
            self.operation.current_phase
        ));
        self.state = OrchestratorState::AwaitingGeneration;
        Ok(())
    }

    /// Drop everything, including the model client, and return to idle.
    pub fn reset(&mut self) {
        self.operation = OperationState::default();
        self.generator = None;
        self.state = OrchestratorState::Idle;
        tracing::debug!("orchestrator reset");
    }

    fn violation(&self, operation: &'static str) -> OperationError {
        tracing::warn!(operation, state = %self.state, "rejected call in wrong state");
        OperationError::StateViolation {
            operation,
            state: self.state,
        }
    }
}

fn finding_outcome(outcome: ExecutionOutcome) -> FindingOutcome {
    if outcome.succeeded() {
        FindingOutcome::Success {
            output: outcome.stdout,
        }
    } else {
        FindingOutcome::Failed {
            error: outcome.stderr,
            exit_code: outcome.exit_code,
        }
    }
}

fn preview(command: &str) -> String {
    command.chars().take(LOG_PREVIEW_CHARS).collect()
}
