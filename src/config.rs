//! Configuration for nsengine.
//!
//! Settings are read from `.nsengine/nsengine.toml` in the project directory
//! and layered file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [model]
//! provider = "gemini"          # or "command"
//! name = "gemini-2.0-flash-exp"
//! command = "claude"           # used when provider = "command"
//! args = ["--print"]
//! timeout_secs = 120
//!
//! [execution]
//! shell = "sh"
//! timeout_secs = 300
//! # working_dir = "workspace"
//!
//! [policy]
//! enabled = true
//! deny = ["\\bnuclei\\b"]
//!
//! [export]
//! output_dir = "reports"
//! ```
//!
//! Environment: `NSENGINE_API_KEY` or `GEMINI_API_KEY` supply credentials,
//! `NSENGINE_MODEL` overrides the model name. A `.env` file is loaded by
//! `main` before any of this runs.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::executor::{DEFAULT_COMMAND_TIMEOUT_SECS, ShellExecutor};
use crate::generate::DEFAULT_GENERATION_TIMEOUT_SECS;
use crate::llm::gemini::DEFAULT_GEMINI_MODEL;
pub use crate::llm::command::API_KEY_ENV;
use crate::llm::{CommandBackend, Credentials, GeminiBackend, ModelBackend};
use crate::policy::CommandPolicy;

pub const CONFIG_DIR: &str = ".nsengine";
pub const CONFIG_FILE: &str = "nsengine.toml";

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "NSENGINE_MODEL";

/// Which model backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Google Gemini over HTTPS
    #[default]
    Gemini,
    /// External CLI fed the prompt on stdin
    Command,
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelProvider::Gemini => write!(f, "gemini"),
            ModelProvider::Command => write!(f, "command"),
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ModelProvider::Gemini),
            "command" => Ok(ModelProvider::Command),
            _ => anyhow::bail!("Invalid model provider '{}'. Valid values: gemini, command", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(default)]
    pub provider: ModelProvider,
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Program to run when `provider = "command"`
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Upper bound on a single generation call
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_model_name() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_generation_timeout() -> u64 {
    DEFAULT_GENERATION_TIMEOUT_SECS
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            name: default_model_name(),
            command: None,
            args: Vec::new(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSection {
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default = "default_command_timeout")]
    pub timeout_secs: u64,
    /// Relative paths resolve against the project directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout_secs: default_command_timeout(),
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra regexes on top of the built-in deny rules
    #[serde(default)]
    pub deny: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            enabled: true,
            deny: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// The complete nsengine.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineToml {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub export: ExportSection,
}

impl EngineToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse nsengine.toml")
    }

    /// Load `<config_dir>/nsengine.toml`, or defaults when it does not exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize nsengine.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Model name, with `NSENGINE_MODEL` taking precedence over the file.
    pub fn model_name(&self) -> String {
        std::env::var(MODEL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.model.name.clone())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.model.timeout_secs == 0 {
            warnings.push("model.timeout_secs is 0: every generation will time out".to_string());
        }
        if self.execution.timeout_secs == 0 {
            warnings.push("execution.timeout_secs is 0: every command will time out".to_string());
        }
        if self.execution.shell.trim().is_empty() {
            warnings.push("execution.shell is empty".to_string());
        }
        if self.model.provider == ModelProvider::Command
            && self
                .model
                .command
                .as_deref()
                .is_none_or(|c| c.trim().is_empty())
        {
            warnings.push("model.provider is \"command\" but model.command is not set".to_string());
        }
        if self.model.provider == ModelProvider::Gemini && self.model.name.trim().is_empty() {
            warnings.push("model.name is empty".to_string());
        }
        for pattern in &self.policy.deny {
            if let Err(e) = Regex::new(pattern) {
                warnings.push(format!("Invalid policy.deny pattern '{}': {}", pattern, e));
            }
        }

        warnings
    }
}

/// Resolved configuration: nsengine.toml, environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub toml: EngineToml,
    pub verbose: bool,
    pub yes: bool,
    pub cli_api_key: Option<String>,
    pub cli_output_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let toml = EngineToml::load_or_default(&config_dir)?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            verbose: false,
            yes: false,
            cli_api_key: None,
            cli_output_dir: None,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        yes: bool,
        api_key: Option<String>,
        output_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.yes = yes;
        config.cli_api_key = api_key;
        config.cli_output_dir = output_dir;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Credentials: CLI → `NSENGINE_API_KEY` → `GEMINI_API_KEY`. A blank
    /// source falls through to the next one.
    pub fn credentials(&self) -> Option<Credentials> {
        let non_blank = |key: String| Some(Credentials::new(key)).filter(|c| !c.is_blank());

        self.cli_api_key
            .clone()
            .and_then(non_blank)
            .or_else(|| std::env::var(API_KEY_ENV).ok().and_then(non_blank))
            .or_else(|| std::env::var(GEMINI_API_KEY_ENV).ok().and_then(non_blank))
    }

    pub fn model_name(&self) -> String {
        self.toml.model_name()
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.model.timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.execution.timeout_secs)
    }

    /// Export directory: CLI → file, relative paths under the project directory.
    pub fn output_dir(&self) -> PathBuf {
        let dir = self
            .cli_output_dir
            .clone()
            .unwrap_or_else(|| self.toml.export.output_dir.clone());
        self.resolve(dir)
    }

    pub fn working_dir(&self) -> Option<PathBuf> {
        self.toml
            .execution
            .working_dir
            .clone()
            .map(|dir| self.resolve(dir))
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn model_backend(&self) -> Result<Arc<dyn ModelBackend>> {
        match self.toml.model.provider {
            ModelProvider::Gemini => Ok(Arc::new(GeminiBackend::new(
                self.model_name(),
                self.generation_timeout(),
            ))),
            ModelProvider::Command => {
                let program = self
                    .toml
                    .model
                    .command
                    .clone()
                    .context("model.provider is \"command\" but model.command is not set")?;
                Ok(Arc::new(CommandBackend::new(
                    program,
                    self.toml.model.args.clone(),
                )))
            }
        }
    }

    pub fn shell_executor(&self) -> ShellExecutor {
        let executor = ShellExecutor::new()
            .with_shell(&self.toml.execution.shell)
            .with_timeout(self.command_timeout());
        match self.working_dir() {
            Some(dir) => executor.with_working_dir(dir),
            None => executor,
        }
    }

    pub fn command_policy(&self) -> Result<CommandPolicy> {
        CommandPolicy::from_config(self.toml.policy.enabled, &self.toml.policy.deny)
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

/// Write a default nsengine.toml under `project_dir`. Refuses to overwrite.
pub fn init_config(project_dir: &Path) -> Result<PathBuf> {
    let config_dir = project_dir.join(CONFIG_DIR);
    let path = config_dir.join(CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("Config file already exists: {}", path.display());
    }
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    EngineToml::default().save(&path)?;
    Ok(path)
}
