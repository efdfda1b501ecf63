//! Build targets.
//!
//! A target is a unit of work requested on the command line. It expands to
//! the set of projects it needs and may depend on other targets: installing
//! a database requires the site to be installed first.

use std::fmt;
use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::project::ProjectGraph;

/// Site name selecting every configured site.
pub const ALL_SITES: &str = "*";

/// Fallback site name when nothing else matches.
pub const DEFAULT_SITE: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    BuildAll,
    SiteInstall,
    DbInstall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: TargetKind,
    pub site: Option<String>,
    /// Directory names of the projects this target needs, sorted.
    pub required_projects: Vec<String>,
    /// Targets that have to run before this one.
    pub requires: Vec<Target>,
}

impl Target {
    /// Build every project of the graph.
    pub fn build_all(graph: &ProjectGraph) -> Self {
        Self {
            kind: TargetKind::BuildAll,
            site: None,
            required_projects: graph.dirnames().map(str::to_string).collect(),
            requires: Vec::new(),
        }
    }

    /// Populate a site directory: the core project plus every project linked
    /// from the site tree.
    pub fn site_install(config: &Config, site: &str) -> Result<Self> {
        let site_config = config.site(site)?;
        let mut required = site_config.links.project_names();
        required.push(config.core.project.clone());
        required.sort();
        required.dedup();
        Ok(Self {
            kind: TargetKind::SiteInstall,
            site: Some(site.to_string()),
            required_projects: required,
            requires: Vec::new(),
        })
    }

    /// Install a site's database. Requires the site install.
    pub fn db_install(config: &Config, site: &str) -> Result<Self> {
        let install = Self::site_install(config, site)?;
        Ok(Self {
            kind: TargetKind::DbInstall,
            site: Some(site.to_string()),
            required_projects: Vec::new(),
            requires: vec![install],
        })
    }

    /// Identifies a target for deduplication.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TargetKind::BuildAll => "build",
            TargetKind::SiteInstall => "install",
            TargetKind::DbInstall => "db-install",
        };
        match &self.site {
            Some(site) => write!(f, "{}:{}", kind, site),
            None => write!(f, "{}", kind),
        }
    }
}

/// Pick the sites a command applies to.
///
/// `*` selects every configured site. Without arguments the site is guessed
/// from the name of `cwd`, falling back to `default`.
pub fn select_sites(config: &Config, requested: &[String], cwd: &Path) -> Result<Vec<String>> {
    if requested.iter().any(|s| s == ALL_SITES) {
        return Ok(config.sites.keys().cloned().collect());
    }
    if requested.is_empty() {
        let guess = cwd
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|name| config.sites.contains_key(*name))
            .unwrap_or(DEFAULT_SITE);
        config.site(guess)?;
        return Ok(vec![guess.to_string()]);
    }
    for site in requested {
        config.site(site)?;
    }
    Ok(requested.to_vec())
}
