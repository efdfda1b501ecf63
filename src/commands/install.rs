//! # Install Command Implementation
//!
//! `install` builds the projects a site needs, syncs the core project into
//! the site's document root and links the site tree. Afterwards the opcode
//! cache reset URL is called when a reset key is configured.
//!
//! Without site arguments the site is guessed from the current directory
//! name; `*` installs every configured site.

use anyhow::{Context, Result};
use clap::Args;
use log::warn;

use sitebuild::defaults::EnvDefaults;
use sitebuild::phases::RunOutcome;
use sitebuild::site;
use sitebuild::target::{select_sites, Target};

use super::run::{current_dir, run, RunArgs};

/// Build and install sites
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Sites to install (`*` for all, default: guessed from the current directory)
    #[arg(value_name = "SITE")]
    pub sites: Vec<String>,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Execute the `install` command.
pub fn execute(args: InstallArgs) -> Result<()> {
    let cwd = current_dir()?;
    let outcome = run(&args.run, |config| {
        select_sites(config, &args.sites, &cwd)?
            .iter()
            .map(|site| Target::site_install(config, site).map_err(Into::into))
            .collect()
    })?;

    if let RunOutcome::Executed { report, .. } = &outcome {
        for installed in &report.sites_installed {
            println!("   Installed site {}", installed);
        }
        let defaults = EnvDefaults::from_env();
        if let Some((url, key)) = args.run.opcache_reset(&defaults) {
            let timeout = args.run.timeout.map(std::time::Duration::from_secs);
            if let Err(e) = site::reset_opcache(&url, &key, timeout)
                .with_context(|| format!("Failed to reset opcache via {}", url))
            {
                warn!("{:#}", e);
            }
        }
    }
    Ok(())
}
