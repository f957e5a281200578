//! Doctrine listing: `nsengine phases`.

use anyhow::{Context, Result};
use console::style;

pub fn cmd_phases(json: bool) -> Result<()> {
    use nsengine::doctrine::all_phases;

    if json {
        let out = serde_json::to_string_pretty(all_phases()).context("Failed to serialize phases")?;
        println!("{}", out);
        return Ok(());
    }

    println!();
    for phase in all_phases() {
        println!(
            "{} {}",
            style(format!("Phase {}:", phase.phase_number)).yellow().bold(),
            style(phase.name).bold()
        );
        println!("  {}", style("Objectives").dim());
        for (i, objective) in phase.objectives.iter().enumerate() {
            println!("    {}. {}", i + 1, objective);
        }
        println!("  {}", style("Techniques (passive only)").dim());
        for technique in phase.technique_categories {
            println!("    - {}", technique);
        }
        println!();
    }
    Ok(())
}
