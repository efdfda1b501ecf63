//! # Projects and the Project Graph
//!
//! A project is one entry of the project table (or a directory name that is
//! only referenced from a site tree). Its variant is selected through a
//! strict registry:
//!
//! - **`DrupalOrg`**: the directory name parses as a `ProjectIdentity`, or
//!   the project explicitly declares `type: drupal.org` together with build
//!   steps. Without build steps the release tarball is fetched from
//!   ftp.drupal.org.
//! - **`Generic`** (fallback): any project with explicit build steps.
//!
//! Every build step is dispatched to a downloader and an applier when the
//! project is constructed, so configuration errors surface before any I/O.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::Path;

use log::{debug, warn};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::applier::{self, ApplierKind};
use crate::config::{Config, ProjectConfig, SiteTree, StepConfig};
use crate::downloader::{self, DownloaderKind};
use crate::error::{Error, Result};
use crate::identity::ProjectIdentity;
use crate::registry::{Candidate, Registry};

/// Declared type that selects the drupal.org variant explicitly.
pub const DRUPAL_ORG_TYPE: &str = "drupal.org";

const DRUPAL_ORG_RELEASES: &str = "https://ftp.drupal.org/files/projects";

/// Configuration record the project registry dispatches on.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub dirname: String,
    pub config: ProjectConfig,
}

/// Project variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    DrupalOrg,
    Generic,
}

impl ProjectKind {
    /// Validity rule of drupal.org projects: the identity parses, or a type
    /// is declared together with at least one build step.
    pub fn is_valid_drupal_org(dirname: &str, config: &ProjectConfig) -> bool {
        ProjectIdentity::parse(dirname).is_ok()
            || (config.kind.is_some() && !config.build.is_empty())
    }
}

impl Candidate for ProjectKind {
    type Config = ProjectRecord;

    fn name(&self) -> &'static str {
        match self {
            ProjectKind::DrupalOrg => DRUPAL_ORG_TYPE,
            ProjectKind::Generic => "generic",
        }
    }

    fn applies(&self, record: &ProjectRecord) -> bool {
        match self {
            ProjectKind::DrupalOrg => {
                let declared = record.config.kind.as_deref();
                (declared.is_none() || declared == Some(DRUPAL_ORG_TYPE))
                    && Self::is_valid_drupal_org(&record.dirname, &record.config)
            }
            ProjectKind::Generic => !record.config.build.is_empty(),
        }
    }
}

/// The project registry: drupal.org projects, generic projects as fallback.
pub fn registry() -> Registry<ProjectKind> {
    Registry::new("Project", vec![ProjectKind::DrupalOrg])
        .strict()
        .with_fallback(ProjectKind::Generic)
}

/// A build step with its downloader and applier already selected.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStep {
    pub config: StepConfig,
    pub downloader: DownloaderKind,
    pub applier: ApplierKind,
}

/// A fully dispatched project.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub dirname: String,
    pub kind: ProjectKind,
    /// Parsed identity, absent for generic projects with free-form names.
    pub identity: Option<ProjectIdentity>,
    pub build_steps: Vec<BuildStep>,
    /// Bundled dependencies, linked inside the project directory.
    pub children: SiteTree,
    pub config: ProjectConfig,
}

impl Project {
    pub fn new(dirname: &str, config: &ProjectConfig) -> Result<Self> {
        Self::with_registries(
            dirname,
            config,
            &registry(),
            &downloader::registry(),
            &applier::registry(),
        )
    }

    pub(crate) fn with_registries(
        dirname: &str,
        config: &ProjectConfig,
        projects: &Registry<ProjectKind>,
        downloaders: &Registry<DownloaderKind>,
        appliers: &Registry<ApplierKind>,
    ) -> Result<Self> {
        let kind = projects.produce(&ProjectRecord {
            dirname: dirname.to_string(),
            config: config.clone(),
        })?;
        let identity = ProjectIdentity::parse(dirname).ok();

        let steps = match (kind, &identity) {
            (ProjectKind::DrupalOrg, Some(identity)) if config.build.is_empty() => {
                if !identity.patches.is_empty() {
                    warn!(
                        "{} names patches but has no build steps, fetching the plain release",
                        dirname
                    );
                }
                vec![default_release_step(identity)]
            }
            _ => config.build.clone(),
        };

        let build_steps = steps
            .into_iter()
            .map(|step| {
                Ok(BuildStep {
                    downloader: downloaders.produce(&step)?,
                    applier: appliers.produce(&step)?,
                    config: step,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // A checkout replaces its destination, so only the first step may
        // check out into the project root.
        if let Some(index) = build_steps.iter().skip(1).position(|step| {
            step.applier == ApplierKind::GitRepo
                && step.config.target.as_deref().is_none_or(str::is_empty)
        }) {
            return Err(Error::ConfigParse {
                message: format!(
                    "{}: git checkout in build step {} would replace the output of the steps before it",
                    dirname,
                    index + 2
                ),
                hint: Some(
                    "Make the checkout the first build step or give it a `target` sub-directory"
                        .to_string(),
                ),
            });
        }

        Ok(Self {
            dirname: dirname.to_string(),
            kind,
            identity,
            build_steps,
            children: config.projects.clone(),
            config: config.clone(),
        })
    }

    /// Directory names of the bundled dependencies.
    pub fn dependencies(&self) -> Vec<String> {
        self.children.project_names()
    }

    /// Whether any build step checks out a VCS repository.
    pub fn is_checkout(&self) -> bool {
        self.build_steps
            .iter()
            .any(|step| step.applier == ApplierKind::GitRepo)
    }

    /// Fingerprint of the configuration the project is built from.
    pub fn stamp(&self) -> Result<String> {
        let serialized = serde_json::to_vec(&(&self.dirname, &self.config))?;
        Ok(hex::encode(Sha256::digest(serialized)))
    }

    /// Append version information to `.info` files of drupal.org checkouts.
    ///
    /// Release tarballs already carry it, so only VCS checkouts are touched.
    /// Returns the number of files updated.
    pub fn stamp_info_files(&self, dir: &Path) -> Result<usize> {
        let Some(identity) = &self.identity else {
            return Ok(0);
        };
        if self.kind != ProjectKind::DrupalOrg || !self.is_checkout() {
            return Ok(0);
        }

        let mut updated = 0;
        for entry in WalkDir::new(dir) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension() != Some(OsStr::new("info")) {
                continue;
            }
            let content = fs::read_to_string(path)?;
            if content.lines().any(|l| l.trim_start().starts_with("version")) {
                continue;
            }
            let mut file = fs::OpenOptions::new().append(true).open(path)?;
            if !content.is_empty() && !content.ends_with('\n') {
                writeln!(file)?;
            }
            writeln!(file, "version = \"{}\"", identity.full_version())?;
            writeln!(file, "project = \"{}\"", identity.name)?;
            debug!("Stamped {}", path.display());
            updated += 1;
        }
        Ok(updated)
    }
}

fn default_release_step(identity: &ProjectIdentity) -> StepConfig {
    StepConfig {
        url: Some(format!(
            "{}/{}.tar.gz",
            DRUPAL_ORG_RELEASES,
            identity.release()
        )),
        ..Default::default()
    }
}

/// All projects of a configuration, keyed by directory name.
///
/// Directory names that are referenced from a site tree, from a project's
/// bundled dependencies or as the core project, but have no entry in the
/// project table, become implicit projects with an empty configuration.
#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    projects: BTreeMap<String, Project>,
    core: Option<String>,
}

impl ProjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let projects = registry();
        let downloaders = downloader::registry();
        let appliers = applier::registry();

        let mut graph = Self::new();
        let add = |graph: &mut Self, dirname: &str, project: &ProjectConfig| -> Result<()> {
            if !graph.projects.contains_key(dirname) {
                let project = Project::with_registries(
                    dirname,
                    project,
                    &projects,
                    &downloaders,
                    &appliers,
                )?;
                graph.insert(project);
            }
            Ok(())
        };

        for (dirname, project) in &config.projects {
            add(&mut graph, dirname, project)?;
        }

        let implicit = ProjectConfig::default();
        let mut referenced = vec![config.core.project.clone()];
        for site in config.sites.values() {
            referenced.extend(site.links.project_names());
        }
        for project in config.projects.values() {
            referenced.extend(project.projects.project_names());
        }
        for dirname in referenced {
            if !config.projects.contains_key(&dirname) {
                debug!("{} is not configured, treating it as an implicit project", dirname);
            }
            add(&mut graph, &dirname, &implicit)?;
        }

        graph.core = Some(config.core.project.clone());
        Ok(graph)
    }

    pub fn insert(&mut self, project: Project) {
        self.projects.insert(project.dirname.clone(), project);
    }

    pub fn get(&self, dirname: &str) -> Result<&Project> {
        self.projects
            .get(dirname)
            .ok_or_else(|| Error::UnknownProject {
                dirname: dirname.to_string(),
            })
    }

    pub fn contains(&self, dirname: &str) -> bool {
        self.projects.contains_key(dirname)
    }

    /// Directory name of the core project, if the graph was built from a
    /// configuration.
    pub fn core(&self) -> Option<&str> {
        self.core.as_deref()
    }

    /// Directory names in sorted order.
    pub fn dirnames(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
