//! List action definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use super::load_content;

/// List the actions and input bindings of a data directory
#[derive(Parser)]
pub struct ListCatalog {
    /// Data directory with `session.toml` and `actions/` (defaults to embedded content)
    #[arg(short, long, value_name = "DIR", env = "ACTIONSIM_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

impl ListCatalog {
    pub fn execute(self) -> Result<()> {
        let (config, catalog) = load_content(self.data_dir.as_ref())?;

        println!("Actions ({}):", catalog.len());
        for def in catalog.iter() {
            println!("  {}", def.name);
            println!("    grants:     {}", def.grants_tags);
            println!("    blocked by: {}", def.blocked_tags);
            if let Some(behavior) = &def.behavior {
                println!("    behavior:   {}", behavior);
            }
            if let Some(duration) = def.duration {
                println!("    duration:   {}s", duration);
            }
        }

        println!();
        println!("Bindings ({}):", config.bindings.len());
        for binding in config.bindings.iter() {
            println!(
                "  {:<16} {:<5} {}",
                binding.input,
                binding.command.to_string(),
                binding.action
            );
        }

        Ok(())
    }
}
