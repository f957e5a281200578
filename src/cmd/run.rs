//! The supervised operation loop: `nsengine run --target <domain>`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nsengine::export::write_exports;
use nsengine::gates::{ApprovalGate, GateDecision};
use nsengine::orchestrator::{Orchestrator, OrchestratorState};
use nsengine::policy::CommandPolicy;
use nsengine::ui::OrchestratorUI;

use super::super::Cli;

/// How the phase loop ended when it did not fail.
enum LoopEnd {
    Completed,
    Aborted,
}

pub async fn run_operation(
    cli: &Cli,
    project_dir: PathBuf,
    target: &str,
    api_key: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    use nsengine::config::EngineConfig;

    let config =
        EngineConfig::with_cli_args(project_dir, cli.verbose, cli.yes, api_key, output_dir)?;
    let credentials = config.credentials().context(
        "No API key provided. Pass --api-key or set NSENGINE_API_KEY / GEMINI_API_KEY",
    )?;
    let backend = config.model_backend()?;
    let policy = config.command_policy()?;
    let executor = Arc::new(config.shell_executor());
    let output_dir = config.output_dir();

    let mut orchestrator =
        Orchestrator::new(backend, executor).with_generation_timeout(config.generation_timeout());
    orchestrator.start_operation(target, &credentials)?;

    let ui = OrchestratorUI::new(cli.verbose);
    ui.print_banner(
        &orchestrator.operation().target,
        orchestrator.backend_name(),
        &config.model_name(),
    );
    for warning in config.validate() {
        ui.print_warning(&warning);
    }
    if !policy.is_enabled() {
        ui.print_warning("Command policy disabled: plans are not screened");
    }

    let mut gate = ApprovalGate::new(cli.yes);

    match drive_phases(&mut orchestrator, &policy, &mut gate, &ui, &output_dir).await {
        Ok(LoopEnd::Completed) => {
            ui.print_final_results(orchestrator.operation());
            let paths = write_exports(orchestrator.operation(), &output_dir)?;
            ui.print_exports(&paths);
            Ok(())
        }
        Ok(LoopEnd::Aborted) => {
            ui.print_warning("Operation aborted");
            export_partial(&orchestrator, &ui, &output_dir)?;
            ui.finish();
            Ok(())
        }
        Err(e) => {
            ui.print_error(&format!("Operation stopped: {:#}", e));
            // Completed phases are still worth keeping; the original error wins.
            if let Err(export_err) = export_partial(&orchestrator, &ui, &output_dir) {
                ui.print_error(&format!("{:#}", export_err));
            }
            ui.finish();
            Err(e)
        }
    }
}

/// Generate, review and execute until every phase is done or the operator aborts.
async fn drive_phases(
    orchestrator: &mut Orchestrator,
    policy: &CommandPolicy,
    gate: &mut ApprovalGate,
    ui: &OrchestratorUI,
    output_dir: &Path,
) -> Result<LoopEnd> {
    let mut header_shown: Option<usize> = None;

    while orchestrator.state() != OrchestratorState::OperationComplete {
        let Some(phase) = orchestrator.current_phase_definition() else {
            break;
        };
        if header_shown != Some(phase.phase_number) {
            ui.print_phase_header(phase);
            header_shown = Some(phase.phase_number);
        }

        ui.start_generation(phase);
        orchestrator.request_generation().await?;
        ui.finish_generation(orchestrator.operation().pending_commands.len());

        let report = policy.screen(&orchestrator.operation().pending_commands);

        loop {
            match gate.review(orchestrator.operation(), &report, ui)? {
                GateDecision::Approve => {
                    orchestrator.approve_with(ui).await?;
                    break;
                }
                GateDecision::Reject => {
                    orchestrator.reject()?;
                    break;
                }
                GateDecision::Export => {
                    let paths = write_exports(orchestrator.operation(), output_dir)?;
                    ui.print_exports(&paths);
                }
                GateDecision::Abort => return Ok(LoopEnd::Aborted),
            }
        }
    }

    Ok(LoopEnd::Completed)
}

/// Export whatever phases finished; nothing is written before the first one.
fn export_partial(orchestrator: &Orchestrator, ui: &OrchestratorUI, output_dir: &Path) -> Result<()> {
    if orchestrator.operation().phase_results.is_empty() {
        return Ok(());
    }
    let paths = write_exports(orchestrator.operation(), output_dir)?;
    ui.print_exports(&paths);
    Ok(())
}
