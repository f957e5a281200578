use crate::doctrine::{PHASE_COUNT, PhaseDefinition};
use crate::export::ExportPaths;
use crate::orchestrator::{Finding, FindingOutcome, OperationState, PhaseObserver, PhaseResult};
use crate::policy::PolicyReport;
use crate::ui::icons::{
    CHECK, CLOCK, COMMAND, CROSS, MAP, OUTCOME, REASONING, REPORT, SHIELD, SPARKLE, TARGET,
    WARNING,
};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

const DEFAULT_WIDTH: usize = 100;
const OUTPUT_PREVIEW_CHARS: usize = 200;

/// Terminal UI for a supervised operation, rendered via `indicatif`.
///
/// Two bars are stacked vertically:
/// - Phase bar: how many of the seven phases have completed
/// - Activity bar: spinner for generation and per-command progress
///
/// Implements `PhaseObserver` so `Orchestrator::approve_with` drives it
/// directly while commands run.
pub struct OrchestratorUI {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    activity_bar: ProgressBar,
    verbose: bool,
}

impl OrchestratorUI {
    /// Create the UI and add both bars to the multiplex renderer.
    ///
    /// `verbose` additionally prints command output previews as each
    /// command finishes.
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let phase_bar = multi.add(ProgressBar::new(PHASE_COUNT as u64));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("  Phases");

        let activity_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let activity_bar = multi.add(ProgressBar::new_spinner());
        activity_bar.set_style(activity_style);
        activity_bar.set_prefix("Activity");

        Self {
            multi,
            phase_bar,
            activity_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    pub fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Run `f` with the bars hidden, for interactive prompts.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.multi.suspend(f)
    }

    pub fn print_separator(&self) {
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
    }

    pub fn print_banner(&self, target: &str, backend: &str, model: &str) {
        self.print_line("");
        self.print_separator();
        self.print_line(format!(
            "{} {}",
            style("nsengine").cyan().bold(),
            style("human-supervised reconnaissance").dim()
        ));
        self.print_separator();
        self.print_line(format!("{}{}  {}", TARGET, style("Target:").dim(), style(target).yellow().bold()));
        self.print_line(format!("   {}   {} ({})", style("Model:").dim(), model, backend));
        self.print_line("");
    }

    /// Header shown before a phase's plan is requested.
    pub fn print_phase_header(&self, phase: &PhaseDefinition) {
        self.phase_bar.set_message(format!(
            "{}: {}",
            style(phase.phase_number).yellow(),
            phase.name
        ));

        self.print_line("");
        self.print_separator();
        self.print_line(format!(
            "{} Phase {}: {}",
            style("▶").green().bold(),
            style(phase.phase_number).yellow().bold(),
            phase.name
        ));
        self.print_separator();
        for objective in phase.objectives {
            self.print_line(format!("  {} {}", style("•").dim(), objective));
        }
        self.print_line("");
    }

    pub fn start_generation(&self, phase: &PhaseDefinition) {
        self.activity_bar.set_message(format!(
            "Generating commands for phase {} {}",
            style(phase.phase_number).cyan(),
            style("(waiting for model)").dim()
        ));
        self.activity_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    pub fn finish_generation(&self, command_count: usize) {
        self.activity_bar.disable_steady_tick();
        self.activity_bar
            .set_message(format!("{} commands proposed", style(command_count).cyan()));
    }

    /// Show the pending reasoning, commands and expected outcome.
    pub fn print_pending_plan(&self, operation: &OperationState, report: &PolicyReport) {
        let width = terminal_width().saturating_sub(6).max(40);

        self.print_line(format!("{}{}", REASONING, style("Reasoning").bold().underlined()));
        for line in textwrap::wrap(&operation.pending_reasoning, width) {
            self.print_line(format!("   {}", line));
        }
        self.print_line("");

        self.print_line(format!("{}{}", COMMAND, style("Commands").bold().underlined()));
        if operation.pending_commands.is_empty() {
            self.print_line(format!("   {}", style("No commands generated").red()));
        }
        for (i, command) in operation.pending_commands.iter().enumerate() {
            let marker = if report.is_flagged(i) {
                style("!").red().bold()
            } else {
                style(" ").dim()
            };
            self.print_line(format!(
                "  {}{} {}",
                marker,
                style(format!("{:>2}.", i + 1)).dim(),
                style(command).green()
            ));
        }
        self.print_line("");

        self.print_line(format!("{}{}", OUTCOME, style("Expected outcome").bold().underlined()));
        for line in textwrap::wrap(&operation.pending_expected_outcome, width) {
            self.print_line(format!("   {}", style(line).dim()));
        }
        self.print_line("");

        if !report.is_clean() {
            self.print_line(format!(
                "{}{}",
                SHIELD,
                style(format!("{} command(s) flagged by policy", report.flags.len()))
                    .yellow()
                    .bold()
            ));
            for flag in &report.flags {
                self.print_line(format!(
                    "   {} #{} {}",
                    style(&flag.rule).yellow(),
                    flag.index + 1,
                    style(&flag.command).dim()
                ));
            }
            self.print_line("");
        }
    }

    pub fn print_warning(&self, msg: &str) {
        self.print_line(format!("{}{}", WARNING, style(msg).yellow()));
    }

    pub fn print_error(&self, msg: &str) {
        self.print_line(format!("{}{}", CROSS, style(msg).red()));
    }

    pub fn print_exports(&self, paths: &ExportPaths) {
        self.print_line(format!(
            "{}Exported {}",
            REPORT,
            style(paths.document.display()).cyan()
        ));
        self.print_line(format!(
            "{}Exported {}",
            REPORT,
            style(paths.report.display()).cyan()
        ));
    }

    /// Final summary: per-phase confidence, overall score and the namespace map.
    pub fn print_final_results(&self, operation: &OperationState) {
        self.phase_bar.finish_with_message("all phases complete");
        self.activity_bar.finish_and_clear();

        self.print_line("");
        self.print_separator();
        self.print_line(format!(
            "{} Operation against {} complete",
            SPARKLE,
            style(&operation.target).yellow().bold()
        ));
        self.print_separator();

        for result in operation.phase_results.values() {
            self.print_line(format!(
                "  Phase {} {:<32} {}",
                style(result.phase_number).yellow(),
                result.phase_name,
                styled_confidence(result.confidence_score)
            ));
        }
        if let Some(overall) = operation.overall_confidence() {
            self.print_line(format!("  {:<40} {}", style("Overall").bold(), styled_confidence(overall)));
        }
        if let Some(secs) = operation.elapsed_secs() {
            self.print_line(format!("{}{:.1} seconds", CLOCK, secs));
        }

        let map = operation.namespace_map();
        if !map.is_empty() {
            self.print_line("");
            self.print_line(format!("{}{}", MAP, style("Namespace map").bold().underlined()));
            for (phase_number, _, finding) in map {
                let icon = if finding.is_success() { CHECK } else { CROSS };
                self.print_line(format!(
                    "  {}{} {} {}",
                    icon,
                    style(format!("P{}", phase_number)).dim(),
                    style(&finding.label).dim(),
                    finding.command
                ));
            }
        }
        self.print_line("");
    }

    pub fn finish(&self) {
        self.activity_bar.finish_and_clear();
        self.phase_bar.abandon();
    }
}

impl PhaseObserver for OrchestratorUI {
    fn phase_started(&self, phase: &PhaseDefinition, total_commands: usize) {
        self.activity_bar.set_message(format!(
            "Phase {}: running {} commands",
            style(phase.phase_number).cyan(),
            total_commands
        ));
        self.activity_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    fn command_started(&self, index: usize, total: usize, command: &str) {
        self.activity_bar.set_message(format!(
            "Command {}/{} {}",
            style(index).cyan(),
            total,
            style(preview(command, 60)).dim()
        ));
    }

    fn command_finished(&self, index: usize, total: usize, finding: &Finding) {
        match &finding.outcome {
            FindingOutcome::Success { output } => {
                self.print_line(format!(
                    "    {}{}/{} {}",
                    CHECK,
                    index,
                    total,
                    style(&finding.command).green()
                ));
                if self.verbose && !output.trim().is_empty() {
                    self.print_line(format!(
                        "       {}",
                        style(preview(output.trim(), OUTPUT_PREVIEW_CHARS)).dim()
                    ));
                }
            }
            FindingOutcome::Failed { error, exit_code } => {
                self.print_line(format!(
                    "    {}{}/{} {} {}",
                    CROSS,
                    index,
                    total,
                    style(&finding.command).red(),
                    style(format!("(exit {})", exit_code)).dim()
                ));
                if !error.trim().is_empty() {
                    self.print_line(format!(
                        "       {}",
                        style(preview(error.trim(), OUTPUT_PREVIEW_CHARS)).red().dim()
                    ));
                }
            }
        }
    }

    fn phase_completed(&self, result: &PhaseResult) {
        self.activity_bar.disable_steady_tick();
        self.activity_bar.set_message("idle");
        self.phase_bar.inc(1);
        self.print_line(format!(
            "\n{} Phase {} complete: {}/{} succeeded, confidence {}\n",
            SPARKLE,
            style(result.phase_number).green().bold(),
            result.success_count(),
            result.commands_executed.len(),
            styled_confidence(result.confidence_score)
        ));
    }
}

fn styled_confidence(score: f64) -> console::StyledObject<String> {
    let text = format!("{:.1}%", score * 100.0);
    if score >= 0.75 {
        style(text).green().bold()
    } else if score >= 0.4 {
        style(text).yellow().bold()
    } else {
        style(text).red().bold()
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(DEFAULT_WIDTH)
}
