//! Integration tests for nsengine
//!
//! These drive the compiled binary end to end.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use nsengine::export::to_structured_document;
use nsengine::orchestrator::{FindingOutcome, OperationState, PhaseResult};

/// Helper to create an nsengine Command with no ambient credentials
fn nsengine() -> Command {
    let mut cmd = cargo_bin_cmd!("nsengine");
    cmd.env_remove("NSENGINE_API_KEY")
        .env_remove("GEMINI_API_KEY")
        .env_remove("NSENGINE_MODEL")
        .env_remove("RUST_LOG");
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn write_config(dir: &Path, content: &str) {
    let config_dir = dir.join(".nsengine");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("nsengine.toml"), content).unwrap();
}

/// A one-phase operation, exported the way `run` exports it.
fn sample_document() -> serde_json::Value {
    let mut state = OperationState::started("example.com");
    let mut result = PhaseResult::begin(0, "Event Horizon Framing", "Map registrar behavior first.");
    result.record(
        "whois example.com",
        FindingOutcome::Success {
            output: "Registrar: Example".into(),
        },
    );
    result.record(
        "dig example.com NS",
        FindingOutcome::Failed {
            error: String::new(),
            exit_code: 9,
        },
    );
    result.finalize();
    state.phase_results.insert(0, result);
    state.current_phase = 1;
    state.log("Phase 0 completed with 50.0% confidence");
    to_structured_document(&state).unwrap()
}

fn files_with_extension(dir: &Path, ext: &str) -> Vec<std::path::PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|x| x == ext))
        .collect()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_nsengine_help() {
        nsengine()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("phases"));
    }

    #[test]
    fn test_nsengine_version() {
        nsengine()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_run_requires_target() {
        nsengine().arg("run").assert().failure();
    }
}

// =============================================================================
// Phases
// =============================================================================

mod phases {
    use super::*;

    #[test]
    fn test_phases_lists_all_seven() {
        nsengine()
            .arg("phases")
            .assert()
            .success()
            .stdout(predicate::str::contains("Phase 0:"))
            .stdout(predicate::str::contains("Event Horizon Framing"))
            .stdout(predicate::str::contains("Phase 6:"));
    }

    #[test]
    fn test_phases_json() {
        let output = nsengine().args(["phases", "--json"]).output().unwrap();
        assert!(output.status.success());

        let phases: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let list = phases.as_array().unwrap();
        assert_eq!(list.len(), 7);
        for (i, phase) in list.iter().enumerate() {
            assert_eq!(phase["phase_number"], i);
            assert!(!phase["objectives"].as_array().unwrap().is_empty());
        }
    }
}

// =============================================================================
// Config
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        nsengine()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No nsengine.toml found"))
            .stdout(predicate::str::contains("provider = \"gemini\""))
            .stdout(predicate::str::contains("credentials = missing"));
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = create_temp_project();

        nsengine()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created nsengine.toml"));

        let path = dir.path().join(".nsengine/nsengine.toml");
        assert!(path.exists());
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("[model]"));
        assert!(content.contains("[policy]"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = create_temp_project();
        write_config(dir.path(), "[export]\noutput_dir = \"custom\"\n");

        nsengine()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let content = fs::read_to_string(dir.path().join(".nsengine/nsengine.toml")).unwrap();
        assert!(content.contains("custom"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        write_config(
            dir.path(),
            "[model]\nprovider = \"command\"\n\n[policy]\ndeny = [\"(unclosed\"]\n",
        );

        nsengine()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("model.command is not set"))
            .stdout(predicate::str::contains("Invalid policy.deny pattern"));
    }

    #[test]
    fn test_config_validate_clean() {
        let dir = create_temp_project();

        nsengine()
            .current_dir(dir.path())
            .arg("config")
            .arg("init")
            .assert()
            .success();

        nsengine()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_config_show_with_project_dir_flag() {
        let dir = create_temp_project();
        write_config(dir.path(), "[execution]\nshell = \"bash\"\n");

        nsengine()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("shell = \"bash\""));
    }
}

// =============================================================================
// Report
// =============================================================================

mod report {
    use super::*;

    #[test]
    fn test_report_to_stdout() {
        let dir = create_temp_project();
        let doc_path = dir.path().join("op.json");
        fs::write(&doc_path, sample_document().to_string()).unwrap();

        nsengine()
            .arg("report")
            .arg(&doc_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("# NSENGINE OPERATION REPORT"))
            .stdout(predicate::str::contains("example.com"))
            .stdout(predicate::str::contains("Event Horizon Framing"))
            .stdout(predicate::str::contains("command_1: SUCCESS"))
            .stdout(predicate::str::contains("command_2: FAILED (exit 9)"))
            .stdout(predicate::str::contains("Unknown error"));
    }

    #[test]
    fn test_report_to_file() {
        let dir = create_temp_project();
        let doc_path = dir.path().join("op.json");
        let out_path = dir.path().join("op.md");
        fs::write(&doc_path, sample_document().to_string()).unwrap();

        nsengine()
            .arg("report")
            .arg(&doc_path)
            .arg("--output")
            .arg(&out_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Wrote report"));

        let report = fs::read_to_string(out_path).unwrap();
        assert!(report.contains("50.0%"));
        assert!(report.contains("Classification: RESTRICTED"));
    }

    #[test]
    fn test_report_rejects_foreign_json() {
        let dir = create_temp_project();
        let doc_path = dir.path().join("other.json");
        fs::write(&doc_path, r#"{"hello": "world"}"#).unwrap();

        nsengine()
            .arg("report")
            .arg(&doc_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("not an nsengine export"));
    }

    #[test]
    fn test_report_missing_file() {
        nsengine()
            .args(["report", "/nonexistent/op.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read"));
    }
}

// =============================================================================
// Run
// =============================================================================

mod run {
    use super::*;

    const SCRIPTED_MODEL: &str = "cat >/dev/null; printf '%s\\n' \
        '---REASONING---' 'Passive lookups only.' \
        '---COMMANDS---' 'echo {TARGET}' 'exit 3' \
        '---EXPECTED_OUTCOME---' 'Registrar details.'";

    #[test]
    fn test_run_without_api_key_fails() {
        let dir = create_temp_project();

        nsengine()
            .current_dir(dir.path())
            .args(["run", "--target", "example.com"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No API key provided"));
    }

    #[test]
    fn test_run_with_blank_api_key_fails() {
        let dir = create_temp_project();

        nsengine()
            .current_dir(dir.path())
            .args(["run", "--target", "example.com", "--api-key", "   "])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No API key provided"));
    }

    #[test]
    fn test_run_completes_all_phases_with_auto_approve() {
        let dir = create_temp_project();
        let config = format!(
            "[model]\nprovider = \"command\"\ncommand = \"sh\"\nargs = [\"-c\", {}]\n",
            toml_string(SCRIPTED_MODEL)
        );
        write_config(dir.path(), &config);

        nsengine()
            .current_dir(dir.path())
            .args(["--yes", "run", "--target", "example.com", "--api-key", "k"])
            .assert()
            .success();

        let reports = dir.path().join("reports");
        let documents = files_with_extension(&reports, "json");
        assert_eq!(documents.len(), 1);
        assert_eq!(files_with_extension(&reports, "md").len(), 1);

        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&documents[0]).unwrap()).unwrap();
        assert_eq!(doc["target_domain"], "example.com");
        assert_eq!(doc["current_phase"], 7);
        assert_eq!(doc["operation_complete"], true);

        let phase0 = &doc["phase_results"]["0"];
        assert_eq!(phase0["confidence_score"], 0.5);
        assert_eq!(phase0["findings"][0]["status"], "success");
        assert_eq!(phase0["findings"][0]["output"], "example.com\n");
        assert_eq!(phase0["findings"][1]["exit_code"], 3);
    }

    #[test]
    fn test_run_writes_to_output_dir_flag() {
        let dir = create_temp_project();
        let config = format!(
            "[model]\nprovider = \"command\"\ncommand = \"sh\"\nargs = [\"-c\", {}]\n",
            toml_string(SCRIPTED_MODEL)
        );
        write_config(dir.path(), &config);

        nsengine()
            .current_dir(dir.path())
            .env("NSENGINE_API_KEY", "k")
            .args(["--yes", "run", "-t", "example.com", "-o", "out"])
            .assert()
            .success();

        assert_eq!(files_with_extension(&dir.path().join("out"), "json").len(), 1);
        assert!(!dir.path().join("reports").exists());
    }

    /// Serves one real plan, then only empty ones.
    const ONE_PLAN_MODEL: &str = "cat >/dev/null; \
        if [ -f .plan_served ]; then \
          printf '%s\\n' '---REASONING---' 'Nothing left.' '---COMMANDS---' \
            '---EXPECTED_OUTCOME---' 'None.'; \
        else \
          touch .plan_served; \
          printf '%s\\n' '---REASONING---' 'Passive lookups only.' '---COMMANDS---' \
            'echo {TARGET}' '---EXPECTED_OUTCOME---' 'Registrar details.'; \
        fi";

    #[test]
    fn test_empty_plans_without_terminal_abort_and_keep_completed_phases() {
        let dir = create_temp_project();
        let config = format!(
            "[model]\nprovider = \"command\"\ncommand = \"sh\"\nargs = [\"-c\", {}]\n",
            toml_string(ONE_PLAN_MODEL)
        );
        write_config(dir.path(), &config);

        nsengine()
            .current_dir(dir.path())
            .args(["--yes", "run", "--target", "example.com", "--api-key", "k"])
            .assert()
            .success()
            .stderr(predicate::str::contains("not a terminal").not());

        let documents = files_with_extension(&dir.path().join("reports"), "json");
        assert_eq!(documents.len(), 1, "completed phase 0 was not exported");

        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&documents[0]).unwrap()).unwrap();
        assert_eq!(doc["current_phase"], 1);
        assert_eq!(doc["operation_complete"], false);
        assert_eq!(doc["phase_results"]["0"]["confidence_score"], 1.0);
        assert!(doc["phase_results"].get("1").is_none());

        let rejections = doc["operation_log"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|e| {
                e["message"]
                    .as_str()
                    .is_some_and(|m| m.contains("commands rejected"))
            })
            .count();
        assert_eq!(rejections, nsengine::gates::AUTO_REGENERATE_LIMIT);
    }

    fn toml_string(s: &str) -> String {
        toml::Value::String(s.to_string()).to_string()
    }
}
