//! Generative model capability.
//!
//! The core only needs "submit a prompt, receive text back". Backends turn
//! the credentials supplied at operation start into a client.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod command;
pub mod gemini;

pub use command::{CommandBackend, CommandModelClient};
pub use gemini::{GeminiBackend, GeminiClient};

/// Authentication material supplied once at operation start.
///
/// `Debug` is redacted so keys never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(***)")
    }
}

/// A connected model: one prompt in, one text response out.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn submit(&self, prompt: &str) -> Result<String>;
}

/// Creates a `ModelClient` from credentials.
pub trait ModelBackend: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ModelClient>>;

    /// Short name for logs and status output.
    fn name(&self) -> &str;
}

/// Backend that hands out an already-built client regardless of credentials.
pub struct FixedBackend {
    client: Arc<dyn ModelClient>,
}

impl FixedBackend {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }
}

impl ModelBackend for FixedBackend {
    fn connect(&self, _credentials: &Credentials) -> Result<Arc<dyn ModelClient>> {
        Ok(Arc::clone(&self.client))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
