//! # DB Install Command Implementation
//!
//! `db-install` installs a site (see `install`) and then runs
//! `drush site-install` for it. `--db-prefix` is prepended to the database
//! name of the site's `db-url`.

use anyhow::Result;
use clap::Args;

use sitebuild::phases::RunOutcome;
use sitebuild::target::{select_sites, Target};

use super::run::{current_dir, run, RunArgs};

/// Install site databases
#[derive(Args, Debug)]
pub struct DbInstallArgs {
    /// Sites to install (`*` for all, default: guessed from the current directory)
    #[arg(value_name = "SITE")]
    pub sites: Vec<String>,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Execute the `db-install` command.
pub fn execute(args: DbInstallArgs) -> Result<()> {
    let cwd = current_dir()?;
    let outcome = run(&args.run, |config| {
        select_sites(config, &args.sites, &cwd)?
            .iter()
            .map(|site| Target::db_install(config, site).map_err(Into::into))
            .collect()
    })?;

    if let RunOutcome::Executed { report, .. } = &outcome {
        for site in &report.databases_installed {
            println!("   Installed database of site {}", site);
        }
    }
    Ok(())
}
