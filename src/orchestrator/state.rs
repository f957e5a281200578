use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::doctrine::PHASE_COUNT;

/// Lifecycle status of a phase result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Failed,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseStatus::Pending => write!(f, "PENDING"),
            PhaseStatus::Active => write!(f, "ACTIVE"),
            PhaseStatus::Completed => write!(f, "COMPLETED"),
            PhaseStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Outcome of one executed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FindingOutcome {
    Success { output: String },
    Failed { error: String, exit_code: i32 },
}

/// The recorded outcome of one command within a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// `command_<n>`, 1-based in execution order
    pub label: String,
    pub command: String,
    #[serde(flatten)]
    pub outcome: FindingOutcome,
}

impl Finding {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FindingOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_number: usize,
    pub phase_name: String,
    pub status: PhaseStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub commands_executed: Vec<String>,
    pub findings: Vec<Finding>,
    pub confidence_score: f64,
    pub reasoning: String,
}

impl PhaseResult {
    /// Start a new ACTIVE result for a phase.
    pub fn begin(phase_number: usize, phase_name: &str, reasoning: &str) -> Self {
        Self {
            phase_number,
            phase_name: phase_name.to_string(),
            status: PhaseStatus::Active,
            start_time: Utc::now(),
            end_time: None,
            commands_executed: Vec::new(),
            findings: Vec::new(),
            confidence_score: 0.0,
            reasoning: reasoning.to_string(),
        }
    }

    /// Record one finished command.
    pub fn record(&mut self, command: &str, outcome: FindingOutcome) -> &Finding {
        self.commands_executed.push(command.to_string());
        self.findings.push(Finding {
            label: format!("command_{}", self.findings.len() + 1),
            command: command.to_string(),
            outcome,
        });
        // just pushed
        &self.findings[self.findings.len() - 1]
    }

    pub fn success_count(&self) -> usize {
        self.findings.iter().filter(|f| f.is_success()).count()
    }

    /// Fraction of executed commands that succeeded; 0.0 when none ran.
    pub fn compute_confidence(&self) -> f64 {
        if self.commands_executed.is_empty() {
            0.0
        } else {
            self.success_count() as f64 / self.commands_executed.len() as f64
        }
    }

    /// Mark the phase COMPLETED and score it.
    pub fn finalize(&mut self) {
        self.end_time = Some(Utc::now());
        self.status = PhaseStatus::Completed;
        self.confidence_score = self.compute_confidence();
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Everything one supervised run knows. Owned by a single `Orchestrator`;
/// everyone else sees it through `&OperationState`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationState {
    #[serde(default)]
    pub operation_id: Option<Uuid>,
    pub target: String,
    pub current_phase: usize,
    /// Completed phases keyed by phase number
    pub phase_results: BTreeMap<usize, PhaseResult>,
    /// The result being filled in while commands run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_phase: Option<PhaseResult>,
    #[serde(default)]
    pub pending_reasoning: String,
    #[serde(default)]
    pub pending_commands: Vec<String>,
    #[serde(default)]
    pub pending_expected_outcome: String,
    pub operation_log: Vec<LogEntry>,
    pub start_time: Option<DateTime<Utc>>,
}

impl OperationState {
    /// Fresh state for a new operation against `target`.
    pub fn started(target: &str) -> Self {
        Self {
            operation_id: Some(Uuid::new_v4()),
            target: target.to_string(),
            start_time: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.operation_log.push(LogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    pub fn clear_pending(&mut self) {
        self.pending_reasoning.clear();
        self.pending_commands.clear();
        self.pending_expected_outcome.clear();
    }

    pub fn is_complete(&self) -> bool {
        self.current_phase >= PHASE_COUNT
    }

    /// Mean confidence across completed phases.
    pub fn overall_confidence(&self) -> Option<f64> {
        if self.phase_results.is_empty() {
            return None;
        }
        let total: f64 = self
            .phase_results
            .values()
            .map(|r| r.confidence_score)
            .sum();
        Some(total / self.phase_results.len() as f64)
    }

    /// Latest instant recorded anywhere in the state.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        let log_last = self.operation_log.last().map(|e| e.timestamp);
        let phase_last = self.phase_results.values().filter_map(|r| r.end_time).max();
        log_last.max(phase_last).or(self.start_time)
    }

    /// Seconds between operation start and the latest recorded activity.
    pub fn elapsed_secs(&self) -> Option<f64> {
        let start = self.start_time?;
        let last = self.last_activity()?;
        Some((last - start).num_milliseconds().max(0) as f64 / 1000.0)
    }

    /// Cross-phase view of every finding, in execution order.
    pub fn namespace_map(&self) -> Vec<(usize, &str, &Finding)> {
        self.phase_results
            .values()
            .flat_map(|r| {
                r.findings
                    .iter()
                    .map(move |f| (r.phase_number, r.phase_name.as_str(), f))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(output: &str) -> FindingOutcome {
        FindingOutcome::Success {
            output: output.to_string(),
        }
    }

    fn failed(error: &str) -> FindingOutcome {
        FindingOutcome::Failed {
            error: error.to_string(),
            exit_code: 1,
        }
    }

    #[test]
    fn test_record_labels_in_order() {
        let mut result = PhaseResult::begin(0, "Event Horizon Framing", "why");
        result.record("whois x", success("ok"));
        result.record("dig x", failed("boom"));

        assert_eq!(result.status, PhaseStatus::Active);
        assert_eq!(result.commands_executed, vec!["whois x", "dig x"]);
        assert_eq!(result.findings[0].label, "command_1");
        assert_eq!(result.findings[1].label, "command_2");
        assert!(result.findings[0].is_success());
        assert!(!result.findings[1].is_success());
    }

    #[test]
    fn test_confidence_half() {
        let mut result = PhaseResult::begin(0, "p", "");
        result.record("a", success(""));
        result.record("b", failed(""));
        result.finalize();
        assert_eq!(result.status, PhaseStatus::Completed);
        assert!(result.end_time.is_some());
        assert_eq!(result.confidence_score, 0.5);
    }

    #[test]
    fn test_confidence_empty_is_zero() {
        let mut result = PhaseResult::begin(3, "p", "");
        result.finalize();
        assert_eq!(result.confidence_score, 0.0);
    }

    #[test]
    fn test_confidence_one_iff_all_success() {
        let mut all_ok = PhaseResult::begin(1, "p", "");
        all_ok.record("a", success(""));
        all_ok.record("b", success(""));
        all_ok.finalize();
        assert_eq!(all_ok.confidence_score, 1.0);

        let mut one_bad = PhaseResult::begin(1, "p", "");
        one_bad.record("a", success(""));
        one_bad.record("b", success(""));
        one_bad.record("c", failed(""));
        one_bad.finalize();
        assert!(one_bad.confidence_score < 1.0);
        assert!(one_bad.confidence_score > 0.0);
    }

    #[test]
    fn test_finding_serializes_with_status_tag() {
        let mut result = PhaseResult::begin(0, "p", "");
        result.record("dig x", failed("nope"));
        let json = serde_json::to_value(&result.findings[0]).unwrap();
        assert_eq!(json["label"], "command_1");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "nope");
        assert_eq!(json["exit_code"], 1);
    }

    #[test]
    fn test_phase_status_serializes_uppercase() {
        let json = serde_json::to_string(&PhaseStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        assert_eq!(PhaseStatus::Active.to_string(), "ACTIVE");
    }

    #[test]
    fn test_default_state_is_empty() {
        let state = OperationState::default();
        assert_eq!(state.current_phase, 0);
        assert!(state.phase_results.is_empty());
        assert!(state.operation_log.is_empty());
        assert!(state.overall_confidence().is_none());
        assert!(!state.is_complete());
    }

    #[test]
    fn test_overall_confidence_and_namespace_map() {
        let mut state = OperationState::started("example.test");
        for (p, ok) in [(0, true), (1, false)] {
            let mut r = PhaseResult::begin(p, "p", "");
            r.record("cmd", if ok { success("x") } else { failed("y") });
            r.finalize();
            state.phase_results.insert(p, r);
        }
        assert_eq!(state.overall_confidence(), Some(0.5));

        let map = state.namespace_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].0, 0);
        assert_eq!(map[1].0, 1);
        assert!(map[0].2.is_success());
    }

    #[test]
    fn test_clear_pending() {
        let mut state = OperationState::started("t");
        state.pending_reasoning = "r".into();
        state.pending_commands = vec!["a".into()];
        state.pending_expected_outcome = "o".into();
        state.clear_pending();
        assert!(state.pending_reasoning.is_empty());
        assert!(state.pending_commands.is_empty());
        assert!(state.pending_expected_outcome.is_empty());
    }
}
