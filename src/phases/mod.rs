//! Implementation of the build pipeline.
//!
//! ## Overview
//!
//! A run goes through these phases:
//! 1. Resolve - Expand the requested targets into a dependency-ordered
//!    `BuildPlan`. Pure, performs no I/O.
//! 2. Execute - Download and apply every planned project into the canonical
//!    store (downloads optionally in parallel), then run the targets.
//! 3. Assemble - Link canonical projects into site trees. Runs as part of
//!    execute for bundled dependencies and site installs.
//!
//! A dry run stops after phase 1 and hands the plan back to the caller.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::overrides::OverrideMap;
use crate::target::Target;

pub mod assemble;
pub mod execute;
pub mod orchestrator;
pub mod resolve;

pub use assemble::{assemble, AssemblyReport};
pub use orchestrator::{Resolver, RunOutcome};

/// How existing store entries are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Build missing projects only.
    #[default]
    Default,
    /// Rebuild missing projects and those whose configuration changed.
    Update,
    /// Wipe and rebuild everything.
    Rebuild,
}

/// Options of one run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: BuildMode,
    pub dry_run: bool,
    /// Keep VCS metadata and skip `.info` stamping.
    pub devel: bool,
    /// Download parallelism. Forced to 1 in rebuild mode.
    pub jobs: usize,
    /// Deadline for subprocesses and HTTP requests.
    pub command_timeout: Option<Duration>,
    pub install_dir: PathBuf,
    pub download_dir: PathBuf,
    /// Base directory for relative local sources.
    pub source_dir: PathBuf,
    /// Prepended to database names by `db-install`.
    pub db_prefix: Option<String>,
    pub overrides: OverrideMap,
}

impl BuildOptions {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(install_dir: P, source_dir: Q) -> Self {
        let install_dir = install_dir.into();
        Self {
            mode: BuildMode::Default,
            dry_run: false,
            devel: false,
            jobs: 1,
            command_timeout: None,
            download_dir: install_dir.join("downloads"),
            install_dir,
            source_dir: source_dir.into(),
            db_prefix: None,
            overrides: OverrideMap::new(),
        }
    }

    /// Effective download parallelism.
    pub fn effective_jobs(&self) -> usize {
        if self.mode == BuildMode::Rebuild {
            1
        } else {
            self.jobs.max(1)
        }
    }
}

/// What to do with a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Acquire,
    Apply,
    SkipAlreadySatisfied,
}

/// One step of a build plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Project directory name.
    pub project: String,
    pub action: StepAction,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            StepAction::Acquire => write!(f, "acquire {}", self.project),
            StepAction::Apply => write!(f, "apply   {}", self.project),
            StepAction::SkipAlreadySatisfied => {
                write!(f, "skip    {} (already satisfied)", self.project)
            }
        }
    }
}

/// Dependency-ordered steps plus the targets to run afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub steps: Vec<PlanStep>,
    /// Targets in execution order, dependencies first, deduplicated.
    pub targets: Vec<Target>,
}

impl BuildPlan {
    /// Projects that will be (re)built, in plan order.
    pub fn projects_to_build(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.action == StepAction::Apply)
            .map(|s| s.project.as_str())
            .collect()
    }

    /// Projects in plan order, each listed once.
    pub fn projects(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.action != StepAction::Apply)
            .map(|s| s.project.as_str())
            .collect()
    }

    /// Whether nothing would be built.
    pub fn is_satisfied(&self) -> bool {
        self.projects_to_build().is_empty()
    }
}

impl fmt::Display for BuildPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{}", step)?;
        }
        for target in &self.targets {
            writeln!(f, "run     {}", target)?;
        }
        Ok(())
    }
}
