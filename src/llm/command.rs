//! Model backend that shells out to a local CLI (e.g. `claude --print`).
//!
//! The prompt is written to the child's stdin and its stdout is the response.
//! Credentials are exported to the child as `NSENGINE_API_KEY`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{Credentials, ModelBackend, ModelClient};

pub const API_KEY_ENV: &str = "NSENGINE_API_KEY";

#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl ModelBackend for CommandBackend {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ModelClient>> {
        if self.program.trim().is_empty() {
            anyhow::bail!("No model command configured");
        }
        Ok(Arc::new(CommandModelClient {
            program: self.program.clone(),
            args: self.args.clone(),
            api_key: credentials.expose().to_string(),
        }))
    }

    fn name(&self) -> &str {
        "command"
    }
}

pub struct CommandModelClient {
    program: String,
    args: Vec<String>,
    api_key: String,
}

#[async_trait]
impl ModelClient for CommandModelClient {
    async fn submit(&self, prompt: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(API_KEY_ENV, &self.api_key)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn model command: {}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("Failed to write prompt to model command stdin")?;
            stdin
                .shutdown()
                .await
                .context("Failed to close model command stdin")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for model command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Model command exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_pipes_prompt_through_stdin() {
        let backend = CommandBackend::new("cat", vec![]);
        let client = backend.connect(&Credentials::new("k")).unwrap();
        let out = client.submit("---REASONING---\nR").await.unwrap();
        assert_eq!(out, "---REASONING---\nR");
    }

    #[tokio::test]
    async fn test_submit_exports_api_key() {
        let backend = CommandBackend::new(
            "sh",
            vec!["-c".into(), format!("cat >/dev/null; printf %s \"${}\"", API_KEY_ENV)],
        );
        let client = backend.connect(&Credentials::new("key123")).unwrap();
        assert_eq!(client.submit("ignored").await.unwrap(), "key123");
    }

    #[tokio::test]
    async fn test_submit_non_zero_exit_is_err() {
        let backend = CommandBackend::new(
            "sh",
            vec!["-c".into(), "cat >/dev/null; echo quota exceeded >&2; exit 2".into()],
        );
        let client = backend.connect(&Credentials::new("k")).unwrap();
        let err = client.submit("p").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_connect_requires_program() {
        let backend = CommandBackend::new("  ", vec![]);
        assert!(backend.connect(&Credentials::new("k")).is_err());
    }
}
