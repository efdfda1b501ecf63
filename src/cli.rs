//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// sitebuild - Build Drupal sites from versioned projects
#[derive(Parser, Debug)]
#[command(name = "sitebuild")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Be verbose (same as --log-level debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log everything, including subprocess command lines
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build every configured project into the canonical store
    Build(commands::build::BuildArgs),

    /// Build and install sites
    Install(commands::install::InstallArgs),

    /// Install site databases with drush
    #[command(name = "db-install")]
    DbInstall(commands::db_install::DbInstallArgs),

    /// Print the configuration as a drush make file
    #[command(name = "convert-to-make")]
    ConvertToMake(commands::make::MakeArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.init_logging();

        match self.command {
            Commands::Build(args) => commands::build::execute(args),
            Commands::Install(args) => commands::install::execute(args),
            Commands::DbInstall(args) => commands::db_install::execute(args),
            Commands::ConvertToMake(args) => commands::make::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }

    fn log_level(&self) -> &str {
        if self.debug {
            "trace"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// `RUST_LOG` wins over the command line.
    fn init_logging(&self) {
        let env = env_logger::Env::default().default_filter_or(self.log_level());
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .format_target(false)
            .try_init();
    }
}
