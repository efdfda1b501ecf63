//! # Convert-to-make Command Implementation
//!
//! Prints the project table as a drush make file. Read-only.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use sitebuild::config;
use sitebuild::defaults::EnvDefaults;
use sitebuild::make;

/// Print the configuration as a drush make file
#[derive(Args, Debug)]
pub struct MakeArgs {
    /// Directory containing project.json [default: $MOTOOLS/setups/$DTREE]
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,
}

/// Execute the `convert-to-make` command.
pub fn execute(args: MakeArgs) -> Result<()> {
    let source_dir = args
        .source_dir
        .unwrap_or_else(|| EnvDefaults::from_env().source_dir());
    let path = config::locate(&source_dir)?;
    let config = config::from_file(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    print!("{}", make::render(&config)?);
    Ok(())
}
