//! Shell command execution for approved phase commands.
//!
//! Every failure mode (non-zero exit, timeout, spawn error) comes back as an
//! `ExecutionOutcome` so the orchestrator can always record a finding.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

/// Exit code reported when a command exceeds its time limit.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the shell could not be spawned or awaited, or the
/// process was killed by a signal.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = -1;

/// Default wall-clock limit for a single command.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Placeholder → value replacements applied before execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions(Vec<(String, String)>);

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, placeholder: &str, value: &str) -> Self {
        self.0.push((placeholder.to_string(), value.to_string()));
        self
    }

    /// `{TARGET}` and `{DOMAIN}` both resolve to the target domain.
    pub fn for_target(target: &str) -> Self {
        Self::new()
            .with("{TARGET}", target)
            .with("{DOMAIN}", target)
    }

    pub fn apply(&self, template: &str) -> String {
        self.0
            .iter()
            .fold(template.to_string(), |acc, (placeholder, value)| {
                acc.replace(placeholder, value)
            })
    }
}

/// Captured result of one shell invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub exit_code: i32,
    pub stderr: String,
}

impl ExecutionOutcome {
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one command template. Implementations never fail; errors are data.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, template: &str, substitutions: &Substitutions) -> ExecutionOutcome;
}

/// Executes commands through `<shell> -c` with a hard timeout.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            working_dir: None,
            timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: &str) -> Self {
        self.shell = shell.to_string();
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, template: &str, substitutions: &Substitutions) -> ExecutionOutcome {
        let command = substitutions.apply(template);
        let start = Instant::now();

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        // Own process group, so a timeout can take down everything the shell started.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(shell = %self.shell, error = %e, "failed to spawn command");
                return ExecutionOutcome::failure(
                    SPAWN_FAILURE_EXIT_CODE,
                    format!("Failed to spawn '{}': {}", self.shell, e),
                );
            }
        };

        let pid = child.id();

        // Dropping the wait future on timeout drops the child, which kills the shell;
        // the group kill reaches its subshells and pipeline stages.
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ExecutionOutcome::failure(
                    SPAWN_FAILURE_EXIT_CODE,
                    format!("Failed to wait for command: {}", e),
                );
            }
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                tracing::warn!(
                    command = %command,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "command timed out"
                );
                return ExecutionOutcome::failure(
                    TIMEOUT_EXIT_CODE,
                    format!(
                        "Command timed out after {} seconds",
                        format_secs(self.timeout)
                    ),
                );
            }
        };

        let outcome = ExecutionOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code: output.status.code().unwrap_or(SPAWN_FAILURE_EXIT_CODE),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(
            exit_code = outcome.exit_code,
            stdout_bytes = outcome.stdout.len(),
            stderr_bytes = outcome.stderr.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "command finished"
        );

        outcome
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        tracing::debug!(pid, error = %e, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn format_secs(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{:.1}", d.as_secs_f64())
    }
}
