//! Command generation for a single phase.
//!
//! Builds the doctrine prompt, submits it to the model under a timeout and
//! parses the three-section response. Model failures never propagate: they
//! come back as a `Generation` with no commands and the error in `reasoning`.

pub mod parser;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use crate::doctrine;
use crate::errors::{ConfigurationError, GenerationFailure};
use crate::llm::ModelClient;

pub use parser::{ParsedResponse, parse_response};
pub use prompt::{GenerationContext, build_prompt};

pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

const ERROR_REASONING_PREFIX: &str = "AI Generation Error: ";
const ERROR_EXPECTED_OUTCOME: &str = "Failed to generate commands";

/// Reasoning, commands and expected outcome proposed for one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub reasoning: String,
    pub commands: Vec<String>,
    pub expected_outcome: String,
}

impl Generation {
    fn from_failure(failure: &GenerationFailure) -> Self {
        Self {
            reasoning: format!("{}{}", ERROR_REASONING_PREFIX, failure),
            commands: Vec::new(),
            expected_outcome: ERROR_EXPECTED_OUTCOME.to_string(),
        }
    }

    /// True when this generation carries a model failure instead of a plan.
    pub fn is_failure(&self) -> bool {
        self.commands.is_empty() && self.reasoning.starts_with(ERROR_REASONING_PREFIX)
    }
}

impl From<ParsedResponse> for Generation {
    fn from(parsed: ParsedResponse) -> Self {
        Self {
            reasoning: parsed.reasoning_or_placeholder(),
            expected_outcome: parsed.expected_outcome_or_placeholder(),
            commands: parsed.commands,
        }
    }
}

pub struct CommandGenerator {
    client: Arc<dyn ModelClient>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(client: Arc<dyn ModelClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Generate a plan for `phase_number`. Only an out-of-range phase is an error.
    pub async fn generate(
        &self,
        phase_number: usize,
        target: &str,
        context: &GenerationContext,
    ) -> Result<Generation, ConfigurationError> {
        let phase = doctrine::lookup(phase_number)?;
        let prompt = build_prompt(phase, target, context);

        tracing::debug!(
            phase = phase_number,
            prompt_chars = prompt.len(),
            "requesting command generation"
        );

        match self.submit(&prompt).await {
            Ok(text) => {
                tracing::debug!(phase = phase_number, response_chars = text.len(), "model responded");
                let generation = Generation::from(parse_response(&text));
                tracing::info!(
                    phase = phase_number,
                    commands = generation.commands.len(),
                    "generation parsed"
                );
                Ok(generation)
            }
            Err(failure) => {
                tracing::warn!(phase = phase_number, error = %failure, "command generation failed");
                Ok(Generation::from_failure(&failure))
            }
        }
    }

    async fn submit(&self, prompt: &str) -> Result<String, GenerationFailure> {
        match tokio::time::timeout(self.timeout, self.client.submit(prompt)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(GenerationFailure::Model(e)),
            Err(_) => Err(GenerationFailure::Timeout(self.timeout.as_secs())),
        }
    }
}
