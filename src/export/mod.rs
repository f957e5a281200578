//! Structured and narrative exports of an operation.
//!
//! `to_structured_document` and `to_report` are pure functions of
//! `OperationState`; they read no clock, so exporting the same state twice
//! gives identical output. `write_exports` is the only part that touches the
//! filesystem.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::doctrine::PHASE_COUNT;
use crate::orchestrator::state::{FindingOutcome, LogEntry, OperationState, PhaseResult};

const REPORT_WRAP_WIDTH: usize = 100;
const REASONING_EXCERPT_CHARS: usize = 600;

/// On-disk shape of the structured document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ExportDocument {
    operation_id: Option<Uuid>,
    target_domain: String,
    operation_start_time: Option<DateTime<Utc>>,
    current_phase: usize,
    operation_complete: bool,
    overall_confidence: Option<f64>,
    /// serde_json writes the integer keys as strings ("0".."6")
    phase_results: BTreeMap<usize, PhaseResult>,
    namespace_map: Vec<NamespaceEntry>,
    operation_log: Vec<LogEntry>,
    #[serde(default)]
    pending_reasoning: String,
    #[serde(default)]
    pending_commands: Vec<String>,
    #[serde(default)]
    pending_expected_outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NamespaceEntry {
    phase_number: usize,
    phase_name: String,
    label: String,
    command: String,
    status: String,
}

impl From<&OperationState> for ExportDocument {
    fn from(state: &OperationState) -> Self {
        let namespace_map = state
            .namespace_map()
            .into_iter()
            .map(|(phase_number, phase_name, finding)| NamespaceEntry {
                phase_number,
                phase_name: phase_name.to_string(),
                label: finding.label.clone(),
                command: finding.command.clone(),
                status: outcome_status(&finding.outcome).to_string(),
            })
            .collect();

        Self {
            operation_id: state.operation_id,
            target_domain: state.target.clone(),
            operation_start_time: state.start_time,
            current_phase: state.current_phase,
            operation_complete: state.is_complete(),
            overall_confidence: state.overall_confidence(),
            phase_results: state.phase_results.clone(),
            namespace_map,
            operation_log: state.operation_log.clone(),
            pending_reasoning: state.pending_reasoning.clone(),
            pending_commands: state.pending_commands.clone(),
            pending_expected_outcome: state.pending_expected_outcome.clone(),
        }
    }
}

fn outcome_status(outcome: &FindingOutcome) -> &'static str {
    match outcome {
        FindingOutcome::Success { .. } => "success",
        FindingOutcome::Failed { .. } => "failed",
    }
}

/// Full machine-readable snapshot of `state`.
pub fn to_structured_document(state: &OperationState) -> Result<Value> {
    serde_json::to_value(ExportDocument::from(state))
        .context("Failed to build structured export document")
}

/// Rebuild a read-only snapshot from an exported document.
pub fn state_from_document(document: &Value) -> Result<OperationState> {
    let doc: ExportDocument = serde_json::from_value(document.clone())
        .context("Document is not an nsengine export")?;

    if doc.current_phase > PHASE_COUNT {
        anyhow::bail!(
            "Document current_phase {} exceeds {}",
            doc.current_phase,
            PHASE_COUNT
        );
    }

    Ok(OperationState {
        operation_id: doc.operation_id,
        target: doc.target_domain,
        current_phase: doc.current_phase,
        phase_results: doc.phase_results,
        active_phase: None,
        pending_reasoning: doc.pending_reasoning,
        pending_commands: doc.pending_commands,
        pending_expected_outcome: doc.pending_expected_outcome,
        operation_log: doc.operation_log,
        start_time: doc.operation_start_time,
    })
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Human-readable Markdown report.
pub fn to_report(state: &OperationState) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# NSENGINE OPERATION REPORT\n");
    let _ = writeln!(out, "**Target Domain:** {}", state.target);
    if let Some(id) = state.operation_id {
        let _ = writeln!(out, "**Operation ID:** {}", id);
    }
    let start = state
        .start_time
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "not started".to_string());
    let _ = writeln!(out, "**Operation Start:** {}", start);
    if let Some(secs) = state.elapsed_secs() {
        let _ = writeln!(out, "**Operation Duration:** {:.1} seconds", secs);
    }

    let _ = writeln!(out, "\n## EXECUTIVE SUMMARY\n");
    let _ = writeln!(
        out,
        "Operation completed {} of {} phases of intelligence gathering.",
        state.phase_results.len(),
        PHASE_COUNT
    );
    if let Some(confidence) = state.overall_confidence() {
        let _ = writeln!(out, "Overall confidence: {}", format_percent(confidence));
    }
    let total_commands: usize = state
        .phase_results
        .values()
        .map(|r| r.commands_executed.len())
        .sum();
    let total_successes: usize = state.phase_results.values().map(|r| r.success_count()).sum();
    let _ = writeln!(
        out,
        "Commands executed: {} ({} succeeded)",
        total_commands, total_successes
    );
    if state.is_complete() {
        let _ = writeln!(out, "Status: operation complete");
    } else {
        let _ = writeln!(out, "Status: in progress (next phase {})", state.current_phase);
    }

    let _ = writeln!(out, "\n## PHASE RESULTS");
    if state.phase_results.is_empty() {
        let _ = writeln!(out, "\nNo phases completed.");
    }
    for (phase_num, result) in &state.phase_results {
        write_phase_section(&mut out, *phase_num, result);
    }

    let _ = writeln!(out, "\n## OPERATION LOG\n");
    for entry in &state.operation_log {
        let _ = writeln!(out, "[{}] {}", format_timestamp(&entry.timestamp), entry.message);
    }

    let _ = writeln!(out, "\n---");
    let _ = writeln!(out, "Generated by nsengine {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "Classification: RESTRICTED - Passive Reconnaissance Only");
    out
}

fn write_phase_section(out: &mut String, phase_num: usize, result: &PhaseResult) {
    let _ = writeln!(out, "\n### Phase {}: {}", phase_num, result.phase_name);
    let _ = writeln!(out, "- **Status:** {}", result.status);
    let _ = writeln!(
        out,
        "- **Confidence Score:** {}",
        format_percent(result.confidence_score)
    );
    if let Some(secs) = result.duration_secs() {
        let _ = writeln!(out, "- **Duration:** {:.1} seconds", secs);
    }
    let _ = writeln!(out, "- **Commands Executed:** {}", result.commands_executed.len());

    if !result.reasoning.trim().is_empty() {
        let _ = writeln!(out, "\n**Reasoning:**\n");
        let text = excerpt(result.reasoning.trim(), REASONING_EXCERPT_CHARS);
        for line in textwrap::wrap(&text, REPORT_WRAP_WIDTH) {
            let _ = writeln!(out, "> {}", line);
        }
    }

    let _ = writeln!(out, "\n**Key Findings:**\n");
    if result.findings.is_empty() {
        let _ = writeln!(out, "- none");
    }
    for finding in &result.findings {
        match &finding.outcome {
            FindingOutcome::Success { .. } => {
                let _ = writeln!(out, "- {}: SUCCESS `{}`", finding.label, finding.command);
            }
            FindingOutcome::Failed { error, exit_code } => {
                let error = error.trim();
                let error = if error.is_empty() { "Unknown error" } else { error };
                let _ = writeln!(
                    out,
                    "- {}: FAILED (exit {}) - {}",
                    finding.label,
                    exit_code,
                    excerpt(error, 200).replace('\n', " ")
                );
            }
        }
    }
}

/// Paths written by `write_exports`.
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub document: PathBuf,
    pub report: PathBuf,
}

/// Filesystem-safe rendering of a target for file names.
fn file_stem(target: &str) -> String {
    let cleaned: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "operation".to_string()
    } else {
        cleaned
    }
}

/// Write `nsengine_<target>_<timestamp>.json` and `.md` into `dir`.
pub fn write_exports(state: &OperationState, dir: &Path) -> Result<ExportPaths> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let base = format!(
        "nsengine_{}_{}",
        file_stem(&state.target),
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    let document_path = dir.join(format!("{}.json", base));
    let report_path = dir.join(format!("{}.md", base));

    let document = to_structured_document(state)?;
    let json = serde_json::to_string_pretty(&document).context("Failed to serialize document")?;
    fs::write(&document_path, json)
        .with_context(|| format!("Failed to write {}", document_path.display()))?;
    fs::write(&report_path, to_report(state))
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    tracing::info!(
        document = %document_path.display(),
        report = %report_path.display(),
        "exported operation"
    );
    Ok(ExportPaths {
        document: document_path,
        report: report_path,
    })
}
