//! Prompt construction for phase command generation.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::doctrine::PhaseDefinition;
use crate::orchestrator::state::PhaseResult;

use super::parser::{COMMANDS_MARKER, EXPECTED_OUTCOME_MARKER, REASONING_MARKER};

/// Snapshot of everything learned so far, embedded in the prompt as JSON.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationContext {
    pub previous_phases: BTreeMap<String, PhaseResult>,
    pub target: String,
    pub current_phase: usize,
}

impl GenerationContext {
    pub fn new(
        phase_results: &BTreeMap<usize, PhaseResult>,
        target: &str,
        current_phase: usize,
    ) -> Self {
        Self {
            previous_phases: phase_results
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            target: target.to_string(),
            current_phase,
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| format!("{{\"error\": \"context serialization failed: {}\"}}", e))
    }
}

/// Build the single prompt sent to the model for one phase.
pub fn build_prompt(phase: &PhaseDefinition, target: &str, context: &GenerationContext) -> String {
    let objectives = phase
        .objectives
        .iter()
        .enumerate()
        .map(|(i, obj)| format!("{}. {}", i + 1, obj))
        .collect::<Vec<_>>()
        .join("\n");

    let techniques = phase
        .technique_categories
        .iter()
        .map(|t| format!("- {}", t))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a reconnaissance analyst executing Phase {number}: {name} against target {target}.

## DOCTRINE
{objectives}

## AUTHORIZED TECHNIQUES (PASSIVE ONLY)
{techniques}

## CONTEXT FROM PREVIOUS PHASES
{context}

## MISSION
Produce tactical reasoning and exact shell commands that achieve every phase objective.

## RULES
1. ALL TECHNIQUES MUST BE PASSIVE - no active DNS queries, port scans, or direct HTTP requests to the target
2. Use public data sources only: Certificate Transparency logs, passive DNS datasets, WHOIS history, public archives
3. Every command must be complete, non-interactive and executable on a single line
4. Use {{TARGET}} or {{DOMAIN}} wherever the target domain belongs; it is substituted before execution
5. Do not wrap commands in Markdown code fences; lines starting with # are ignored
6. Focus on evidence collection and correlation with earlier phases

## RESPONSE FORMAT
{reasoning_marker}
[Tactical reasoning for this phase]
{commands_marker}
[Shell commands, one per line]
{outcome_marker}
[Expected intelligence outcomes]
"#,
        number = phase.phase_number,
        name = phase.name,
        target = target,
        objectives = objectives,
        techniques = techniques,
        context = context.to_json(),
        reasoning_marker = REASONING_MARKER,
        commands_marker = COMMANDS_MARKER,
        outcome_marker = EXPECTED_OUTCOME_MARKER,
    )
}
