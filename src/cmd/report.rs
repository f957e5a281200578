//! Offline report rendering: `nsengine report <document.json>`.

use anyhow::{Context, Result};
use std::path::Path;

pub fn cmd_report(document: &Path, output: Option<&Path>) -> Result<()> {
    use nsengine::export::{state_from_document, to_report};

    let content = std::fs::read_to_string(document)
        .with_context(|| format!("Failed to read {}", document.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", document.display()))?;
    let state = state_from_document(&value)?;
    let report = to_report(&state);

    match output {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote report to {}", path.display());
        }
        None => print!("{}", report),
    }
    Ok(())
}
