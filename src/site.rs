//! Site installation.
//!
//! A site lives in `installDir/<site>`. Installing it copies the core
//! project into the site's document root and links the site tree; the
//! database install is a separate step run through drush.

use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::Pattern;
use log::info;
use url::Url;

use crate::config::{Config, SiteConfig};
use crate::downloader::http_client;
use crate::error::{Error, Result};
use crate::fsutil::{sync_dirs, SyncReport};
use crate::phases::{assemble, AssemblyReport, BuildOptions};
use crate::process::ToolCommand;
use crate::store::{CanonicalStore, STAMP_FILE};

const DEFAULT_PROFILE: &str = "standard";

/// What installing one site changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteReport {
    pub site: String,
    pub sync: SyncReport,
    pub assembly: AssemblyReport,
}

pub fn site_dir(options: &BuildOptions, site: &str) -> PathBuf {
    options.install_dir.join(site)
}

pub fn document_root(config: &Config, options: &BuildOptions, site: &str) -> PathBuf {
    site_dir(options, site).join(&config.document_root)
}

/// Store location as seen from a site directory.
pub fn projects_dir_from_site(config: &Config) -> PathBuf {
    Path::new("..").join(&config.projects_dir)
}

/// Sync the core project into the document root and link the site tree.
pub fn install(
    config: &Config,
    store: &CanonicalStore,
    options: &BuildOptions,
    site: &str,
) -> Result<SiteReport> {
    let site_config = config.site(site)?;
    let core = &config.core.project;
    if !store.exists(core) {
        return Err(Error::ApplyFailed {
            project: core.clone(),
            reason: format!("core project is missing from {}", store.root().display()),
        });
    }
    let core_dir = store.path(core);
    let docroot = document_root(config, options, site);

    let protected = protected_patterns(config, site_config, &core_dir)?;
    info!("Syncing {} into {}", core_dir.display(), docroot.display());
    let sync = sync_dirs(&core_dir, &docroot, &protected)?;

    let assembly = assemble(
        &site_config.links,
        &projects_dir_from_site(config),
        &options.overrides,
        &site_dir(options, site),
    )?;
    info!(
        "Installed site {}: {} files synced, {} removed, {} links created",
        site, sync.copied, sync.deleted, assembly.links_created
    );

    Ok(SiteReport {
        site: site.to_string(),
        sync,
        assembly,
    })
}

/// Paths below the document root the core sync must leave alone: the
/// configured protected globs plus whatever the site tree puts there.
fn protected_patterns(config: &Config, site: &SiteConfig, core_dir: &Path) -> Result<Vec<Pattern>> {
    let mut patterns = config
        .core
        .protected
        .iter()
        .map(|p| Pattern::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    patterns.push(Pattern::new(STAMP_FILE)?);

    for (path, _) in site.links.leaves() {
        let Ok(relative) = path.strip_prefix(&config.document_root) else {
            continue;
        };
        // The shallowest path that core does not provide itself.
        let mut owned = PathBuf::new();
        for component in relative.components() {
            owned.push(component);
            if !core_dir.join(&owned).exists() {
                break;
            }
        }
        if !owned.as_os_str().is_empty() {
            let owned = format!("/{}", Pattern::escape(&owned.to_string_lossy()));
            patterns.push(Pattern::new(&owned)?);
        }
    }
    Ok(patterns)
}

/// Prepend `prefix` to the database name of `db_url`.
pub fn apply_db_prefix(db_url: &str, prefix: &str) -> Result<String> {
    let mut url = Url::parse(db_url)?;
    let name = url.path().trim_start_matches('/').to_string();
    if name.is_empty() {
        return Err(Error::ConfigParse {
            message: format!("db-url '{}' names no database", db_url),
            hint: None,
        });
    }
    url.set_path(&format!("/{}{}", prefix, name));
    Ok(url.to_string())
}

/// The drush invocation installing a site's database.
pub fn database_command(config: &Config, options: &BuildOptions, site: &str) -> Result<ToolCommand> {
    let site_config = config.site(site)?;
    let db_url = site_config
        .db_url
        .as_deref()
        .ok_or_else(|| Error::ConfigParse {
            message: format!("site '{}' has no db-url", site),
            hint: Some("Add \"db-url\" to the site in project.json".to_string()),
        })?;
    let db_url = match &options.db_prefix {
        Some(prefix) => apply_db_prefix(db_url, prefix)?,
        None => db_url.to_string(),
    };
    let profile = site_config.profile.as_deref().unwrap_or(DEFAULT_PROFILE);

    Ok(ToolCommand::new("drush")
        .arg(format!(
            "--root={}",
            document_root(config, options, site).display()
        ))
        .args(["site-install", profile])
        .arg(format!("--sites-subdir={}", site))
        .arg(format!("--db-url={}", db_url))
        .arg("-y")
        .timeout(options.command_timeout))
}

/// Run the database install of a site.
pub fn install_database(config: &Config, options: &BuildOptions, site: &str) -> Result<()> {
    info!("Installing database for site {}", site);
    database_command(config, options, site)?.run()?;
    Ok(())
}

/// Ask the web server to drop its opcode cache.
pub fn reset_opcache(base_url: &str, key: &str, timeout: Option<Duration>) -> Result<()> {
    let url = format!("{}{}", base_url, key);
    let network = |e: reqwest::Error| Error::Network {
        url: base_url.to_string(),
        message: e.to_string(),
    };
    http_client(timeout)
        .map_err(network)?
        .get(&url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(network)?;
    info!("Reset opcache via {}", base_url);
    Ok(())
}
