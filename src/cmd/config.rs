//! Configuration view and validation commands: `nsengine config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use nsengine::config::{CONFIG_DIR, CONFIG_FILE, EngineConfig, EngineToml, init_config};

    let config_path = project_dir.join(CONFIG_DIR).join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("nsengine Configuration");
            println!("======================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                EngineToml::load(&config_path)?
            } else {
                println!("No nsengine.toml found at {}", config_path.display());
                println!("Using default configuration.");
                EngineToml::default()
            };
            println!();

            println!("[model]");
            println!("  provider = \"{}\"", toml.model.provider);
            println!("  name = \"{}\"", toml.model.name);
            if let Some(command) = &toml.model.command {
                println!("  command = \"{}\"", command);
            }
            if !toml.model.args.is_empty() {
                println!("  args = {:?}", toml.model.args);
            }
            println!("  timeout_secs = {}", toml.model.timeout_secs);
            println!();

            println!("[execution]");
            println!("  shell = \"{}\"", toml.execution.shell);
            println!("  timeout_secs = {}", toml.execution.timeout_secs);
            if let Some(dir) = &toml.execution.working_dir {
                println!("  working_dir = \"{}\"", dir.display());
            }
            println!();

            println!("[policy]");
            println!("  enabled = {}", toml.policy.enabled);
            for pattern in &toml.policy.deny {
                println!("  deny = \"{}\"", pattern);
            }
            println!();

            println!("[export]");
            println!("  output_dir = \"{}\"", toml.export.output_dir.display());
            println!();

            println!("Effective values (with env/CLI overrides):");
            let config = EngineConfig::new(project_dir.to_path_buf())?;
            println!("  model = \"{}\"", config.model_name());
            println!("  output_dir = \"{}\"", config.output_dir().display());
            println!(
                "  credentials = {}",
                if config.credentials().is_some() {
                    "set"
                } else {
                    "missing"
                }
            );
            println!();

            if !config_path.exists() {
                println!("Run 'nsengine config init' to create an nsengine.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No nsengine.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = EngineToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("nsengine.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            let path = init_config(project_dir)?;

            println!("Created nsengine.toml at {}", path.display());
            println!();
            println!("You can now customize:");
            println!("  - [model] provider, name, command, timeout_secs");
            println!("  - [execution] shell, timeout_secs, working_dir");
            println!("  - [policy] enabled, deny");
            println!();
        }
    }

    Ok(())
}
