//! # Configuration Model
//!
//! This module defines the data structures of the site configuration file
//! (`project.json`, or `project.yaml`), as well as the logic for loading it.
//! The textual grammar is the one serde gives us; everything downstream works
//! on these already-parsed records.
//!
//! ## Key Components
//!
//! - **`Config`**: the whole tree: document root, canonical store location,
//!   core project, project table and per-site settings.
//! - **`ProjectConfig`**: one entry of the project table, keyed by the
//!   canonical directory name.
//! - **`StepConfig`**: one build step; a downloader and an applier are both
//!   selected from the same record.
//! - **`SiteTree`**: the recursive `Composite | Leaf` layout used both for
//!   site link trees and for bundled project dependencies.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The complete configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path of the web root inside each site directory.
    pub document_root: String,
    /// Canonical store location, relative to the install directory.
    pub projects_dir: String,
    pub core: CoreConfig,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
}

/// The core project a document root is populated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory name of the core project.
    pub project: String,
    /// Glob patterns, relative to the document root, that site installs
    /// never overwrite or delete.
    #[serde(default = "default_protected")]
    pub protected: Vec<String>,
}

fn default_protected() -> Vec<String> {
    vec!["sites".to_string()]
}

/// One entry of the project table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Explicitly declared project type (`drupal.org`, `library`, ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Ordered build steps. Empty means "use the variant's defaults".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<StepConfig>,
    /// Bundled dependencies, linked inside the project's own directory.
    #[serde(default, skip_serializing_if = "SiteTree::is_empty")]
    pub projects: SiteTree,
}

/// Explicit build step type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Git,
    Patch,
    Tarball,
    File,
    Directory,
}

/// One build step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Remote source (HTTP or VCS remote).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Local source, relative paths resolve against the source directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<StepType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Sub-path of the project directory to apply into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl StepConfig {
    /// The configured source, URL first.
    pub fn source(&self) -> Option<&str> {
        self.url.as_deref().or(self.path.as_deref())
    }

    /// Lower-cased file name of the source, if any.
    pub fn source_basename(&self) -> Option<String> {
        let source = self.source()?;
        let trimmed = source.split(['?', '#']).next().unwrap_or(source);
        trimmed
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether the source is a version-controlled checkout.
    pub fn is_scm(&self) -> bool {
        self.kind == Some(StepType::Git)
            || self.branch.is_some()
            || self.revision.is_some()
            || self
                .source_basename()
                .is_some_and(|name| name.ends_with(".git"))
    }

    pub fn has_extension(&self, extensions: &[&str]) -> bool {
        self.source_basename()
            .is_some_and(|name| extensions.iter().any(|ext| name.ends_with(ext)))
    }
}

/// Per-site settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Installation profile used by `db-install`.
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default, rename = "db-url")]
    pub db_url: Option<String>,
    /// Link layout, rooted at the site directory.
    #[serde(default)]
    pub links: SiteTree,
}

/// Desired directory/link layout.
///
/// Keys may contain `/`; each segment counts towards the link depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiteTree {
    /// A project directory name.
    Leaf(String),
    Composite(BTreeMap<String, SiteTree>),
}

impl Default for SiteTree {
    fn default() -> Self {
        SiteTree::Composite(BTreeMap::new())
    }
}

impl SiteTree {
    pub fn is_empty(&self) -> bool {
        matches!(self, SiteTree::Composite(children) if children.is_empty())
    }

    /// All leaves as `(relative path, project dirname)`, depth first.
    pub fn leaves(&self) -> Vec<(PathBuf, &str)> {
        let mut out = Vec::new();
        Self::collect_leaves(self, PathBuf::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(node: &'a SiteTree, path: PathBuf, out: &mut Vec<(PathBuf, &'a str)>) {
        match node {
            SiteTree::Leaf(dirname) => out.push((path, dirname.as_str())),
            SiteTree::Composite(children) => {
                for (name, child) in children {
                    Self::collect_leaves(child, path.join(name), out);
                }
            }
        }
    }

    /// Project directory names referenced by this tree, deduplicated and
    /// sorted.
    pub fn project_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .leaves()
            .into_iter()
            .map(|(_, dirname)| dirname.to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl Config {
    /// Check the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.document_root.trim().is_empty() {
            return Err(Error::ConfigParse {
                message: "documentRoot must not be empty".to_string(),
                hint: Some("Set 'documentRoot', e.g. \"htdocs\"".to_string()),
            });
        }
        if self.projects_dir.trim().is_empty() || Path::new(&self.projects_dir).is_absolute() {
            return Err(Error::ConfigParse {
                message: format!(
                    "projectsDir must be a relative path, got '{}'",
                    self.projects_dir
                ),
                hint: Some("projectsDir is resolved against the install directory".to_string()),
            });
        }
        if self.core.project.trim().is_empty() {
            return Err(Error::ConfigParse {
                message: "core.project must name the core project".to_string(),
                hint: None,
            });
        }
        Ok(())
    }

    pub fn site(&self, name: &str) -> Result<&SiteConfig> {
        self.sites.get(name).ok_or_else(|| Error::UnknownSite {
            site: name.to_string(),
        })
    }
}

/// Parse a JSON configuration.
pub fn parse_json(content: &str) -> Result<Config> {
    let config: Config = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Parse a YAML configuration.
pub fn parse_yaml(content: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load a configuration file, picking the format from its extension.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        message: format!("Failed to read {}: {}", path.display(), e),
        hint: None,
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => parse_yaml(&content),
        _ => parse_json(&content),
    }
}

/// Locate the configuration file inside a source directory.
///
/// `project.json` is preferred over `project.yaml`.
pub fn locate(source_dir: &Path) -> Result<PathBuf> {
    ["project.json", "project.yaml", "project.yml"]
        .iter()
        .map(|name| source_dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Error::ConfigParse {
            message: format!("No project.json found in {}", source_dir.display()),
            hint: Some("Pass --source-dir or set MOTOOLS/DTREE".to_string()),
        })
}
