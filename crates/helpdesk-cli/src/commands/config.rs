//! Config commands

use std::path::Path;

use anyhow::bail;
use helpdesk_routing::EngineConfig;

use crate::output::OutputFormat;
use crate::ConfigCommands;

pub async fn handle(action: ConfigCommands, path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            EngineConfig::default().save(path)?;
            println!("Configuration initialized at {}", path.display());
        }
        ConfigCommands::Show => {
            let config = crate::config::load(path)?;
            if format.is_table() {
                print!("{}", config.to_toml_string()?);
            } else {
                format.print(&config)?;
            }
        }
    }
    Ok(())
}
