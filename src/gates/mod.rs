use crate::orchestrator::OperationState;
use crate::policy::PolicyReport;
use crate::ui::OrchestratorUI;
use anyhow::Result;
use dialoguer::{Select, theme::ColorfulTheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Approve,
    Reject,
    Export,
    Abort,
}

/// Menu entries offered when there is something to run.
const PLAN_OPTIONS: &[(&str, GateDecision, bool)] = &[
    ("Approve and execute these commands", GateDecision::Approve, false),
    (
        "Approve, and auto-approve remaining unflagged phases (--yes)",
        GateDecision::Approve,
        true,
    ),
    ("Reject and regenerate", GateDecision::Reject, false),
    ("Export results so far", GateDecision::Export, false),
    ("Abort operation", GateDecision::Abort, false),
];

/// Menu entries offered when generation produced no commands.
const EMPTY_OPTIONS: &[(&str, GateDecision, bool)] = &[
    ("Regenerate commands", GateDecision::Reject, false),
    ("Export results so far", GateDecision::Export, false),
    ("Abort operation", GateDecision::Abort, false),
];

/// Empty plans `--yes` will regenerate in a row before asking the operator.
pub const AUTO_REGENERATE_LIMIT: usize = 3;

pub struct ApprovalGate {
    pub auto_approve: bool,
    /// False when nobody can answer a prompt (stderr is not a terminal)
    interactive: bool,
    regenerations: usize,
}

impl ApprovalGate {
    pub fn new(auto_approve: bool) -> Self {
        Self {
            auto_approve,
            interactive: console::user_attended_stderr(),
            regenerations: 0,
        }
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Show the pending plan and return the operator's decision.
    pub fn review(
        &mut self,
        operation: &OperationState,
        report: &PolicyReport,
        ui: &OrchestratorUI,
    ) -> Result<GateDecision> {
        ui.print_pending_plan(operation, report);

        let has_commands = !operation.pending_commands.is_empty();
        if let Some(decision) = self.auto_decision(has_commands, report) {
            let label = match decision {
                GateDecision::Approve => "Auto-approved".to_string(),
                _ => format!(
                    "Empty plan, regenerating {}/{}",
                    self.regenerations, AUTO_REGENERATE_LIMIT
                ),
            };
            ui.print_line(format!("  {} (--yes flag)", console::style(label).dim()));
            return Ok(decision);
        }
        if self.auto_approve && has_commands {
            ui.print_warning("Auto-approval withheld: policy flagged commands in this plan");
        }
        if !self.interactive {
            ui.print_warning("No terminal available for approval, aborting operation");
            return Ok(GateDecision::Abort);
        }

        let options = if has_commands {
            PLAN_OPTIONS
        } else {
            EMPTY_OPTIONS
        };
        let labels: Vec<&str> = options.iter().map(|(label, _, _)| *label).collect();

        let selection = ui.suspend(|| {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Proceed with this phase?")
                .items(&labels)
                .default(0)
                .interact()
        })?;

        Ok(self.apply_selection(options, selection))
    }

    /// `--yes` approves a non-empty plan the policy did not flag, and
    /// regenerates an empty one up to `AUTO_REGENERATE_LIMIT` times in a row.
    fn auto_decision(&mut self, has_commands: bool, report: &PolicyReport) -> Option<GateDecision> {
        if !self.auto_approve {
            return None;
        }
        if has_commands {
            if !report.is_clean() {
                return None;
            }
            self.regenerations = 0;
            return Some(GateDecision::Approve);
        }
        if self.regenerations < AUTO_REGENERATE_LIMIT {
            self.regenerations += 1;
            return Some(GateDecision::Reject);
        }
        None
    }

    fn apply_selection(
        &mut self,
        options: &[(&str, GateDecision, bool)],
        selection: usize,
    ) -> GateDecision {
        match options.get(selection) {
            Some((_, decision, enables_auto)) => {
                if *enables_auto {
                    self.auto_approve = true;
                }
                *decision
            }
            None => GateDecision::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyFlag;

    fn flagged() -> PolicyReport {
        PolicyReport {
            flags: vec![PolicyFlag {
                index: 0,
                command: "nmap x".into(),
                rule: "active-scanner".into(),
            }],
        }
    }

    #[test]
    fn test_auto_approve_requires_clean_non_empty_plan() {
        let mut gate = ApprovalGate::new(true);
        assert_eq!(
            gate.auto_decision(true, &PolicyReport::default()),
            Some(GateDecision::Approve)
        );
        assert_eq!(gate.auto_decision(true, &flagged()), None);
    }

    #[test]
    fn test_no_auto_approve_without_flag() {
        let mut gate = ApprovalGate::new(false);
        assert_eq!(gate.auto_decision(true, &PolicyReport::default()), None);
        assert_eq!(gate.auto_decision(false, &PolicyReport::default()), None);
    }

    #[test]
    fn test_auto_regenerates_empty_plan_a_bounded_number_of_times() {
        let mut gate = ApprovalGate::new(true);
        let clean = PolicyReport::default();
        for _ in 0..AUTO_REGENERATE_LIMIT {
            assert_eq!(gate.auto_decision(false, &clean), Some(GateDecision::Reject));
        }
        assert_eq!(gate.auto_decision(false, &clean), None);

        // An approved plan starts the count again.
        assert_eq!(gate.auto_decision(true, &clean), Some(GateDecision::Approve));
        assert_eq!(gate.auto_decision(false, &clean), Some(GateDecision::Reject));
    }

    fn pending(commands: &[&str]) -> OperationState {
        OperationState {
            target: "example.com".into(),
            pending_reasoning: "R".into(),
            pending_commands: commands.iter().map(|c| c.to_string()).collect(),
            ..OperationState::default()
        }
    }

    #[test]
    fn test_review_without_terminal_aborts_instead_of_prompting() {
        let ui = OrchestratorUI::new(false);

        let mut gate = ApprovalGate::new(false).with_interactive(false);
        let decision = gate
            .review(&pending(&["whois {TARGET}"]), &PolicyReport::default(), &ui)
            .unwrap();
        assert_eq!(decision, GateDecision::Abort);

        let mut gate = ApprovalGate::new(true).with_interactive(false);
        let decision = gate.review(&pending(&["nmap x"]), &flagged(), &ui).unwrap();
        assert_eq!(decision, GateDecision::Abort);
    }

    #[test]
    fn test_review_with_yes_regenerates_then_aborts_without_terminal() {
        let ui = OrchestratorUI::new(false);
        let mut gate = ApprovalGate::new(true).with_interactive(false);
        let empty = pending(&[]);
        let clean = PolicyReport::default();

        for _ in 0..AUTO_REGENERATE_LIMIT {
            assert_eq!(gate.review(&empty, &clean, &ui).unwrap(), GateDecision::Reject);
        }
        assert_eq!(gate.review(&empty, &clean, &ui).unwrap(), GateDecision::Abort);
    }

    #[test]
    fn test_selection_mapping() {
        let mut gate = ApprovalGate::new(false);
        assert_eq!(gate.apply_selection(PLAN_OPTIONS, 0), GateDecision::Approve);
        assert!(!gate.auto_approve);
        assert_eq!(gate.apply_selection(PLAN_OPTIONS, 2), GateDecision::Reject);
        assert_eq!(gate.apply_selection(PLAN_OPTIONS, 3), GateDecision::Export);
        assert_eq!(gate.apply_selection(PLAN_OPTIONS, 4), GateDecision::Abort);
        assert_eq!(gate.apply_selection(EMPTY_OPTIONS, 0), GateDecision::Reject);
        assert_eq!(gate.apply_selection(EMPTY_OPTIONS, 9), GateDecision::Abort);
    }

    #[test]
    fn test_yes_to_all_enables_auto_approve() {
        let mut gate = ApprovalGate::new(false);
        assert_eq!(gate.apply_selection(PLAN_OPTIONS, 1), GateDecision::Approve);
        assert!(gate.auto_approve);
    }

    #[test]
    fn test_empty_plan_cannot_be_approved() {
        assert!(
            EMPTY_OPTIONS
                .iter()
                .all(|(_, decision, _)| *decision != GateDecision::Approve)
        );
    }
}
