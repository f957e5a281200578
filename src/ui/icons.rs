//! Shared UI icons.
//!
//! Each icon falls back to a bracketed ASCII tag on terminals without emoji.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// Operation indicators
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "[T]");
pub static REASONING: Emoji<'_, '_> = Emoji("🧠 ", "[R]");
pub static COMMAND: Emoji<'_, '_> = Emoji("💻 ", "$");
pub static OUTCOME: Emoji<'_, '_> = Emoji("🔭 ", "[O]");
pub static SHIELD: Emoji<'_, '_> = Emoji("🛡️  ", "[P]");
pub static REPORT: Emoji<'_, '_> = Emoji("📄 ", "[F]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static MAP: Emoji<'_, '_> = Emoji("🗺️  ", "[M]");
