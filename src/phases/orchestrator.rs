//! Orchestrator for a complete run
//!
//! `Resolver` owns everything a run needs: the project graph built from the
//! configuration, the canonical store and the run options. Creating it
//! captures a `StoreSnapshot`, so planning is repeatable and a dry run never
//! touches the filesystem.

use log::info;

use super::execute::{execute, ExecuteReport};
use super::resolve::resolve;
use super::{BuildOptions, BuildPlan};
use crate::config::Config;
use crate::error::Result;
use crate::project::ProjectGraph;
use crate::store::{CanonicalStore, StoreSnapshot};
use crate::target::Target;

/// Result of `Resolver::run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Dry run: the plan that would have been executed.
    Planned(BuildPlan),
    Executed {
        plan: BuildPlan,
        report: ExecuteReport,
    },
}

impl RunOutcome {
    pub fn plan(&self) -> &BuildPlan {
        match self {
            RunOutcome::Planned(plan) | RunOutcome::Executed { plan, .. } => plan,
        }
    }
}

pub struct Resolver {
    config: Config,
    graph: ProjectGraph,
    store: CanonicalStore,
    snapshot: StoreSnapshot,
    options: BuildOptions,
}

impl Resolver {
    /// Build the project graph and capture the state of the store.
    pub fn new(config: Config, options: BuildOptions) -> Result<Self> {
        config.validate()?;
        let graph = ProjectGraph::from_config(&config)?;
        let store = CanonicalStore::new(options.install_dir.join(&config.projects_dir));
        let snapshot = store.snapshot(graph.dirnames());
        info!(
            "{} projects configured, {} already in {}",
            graph.len(),
            snapshot.len(),
            store.root().display()
        );
        Ok(Self {
            config,
            graph,
            store,
            snapshot,
            options,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &ProjectGraph {
        &self.graph
    }

    pub fn store(&self) -> &CanonicalStore {
        &self.store
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Plan `roots` against the captured snapshot.
    pub fn resolve(&self, roots: &[Target]) -> Result<BuildPlan> {
        resolve(&self.graph, roots, &self.snapshot, self.options.mode)
    }

    pub fn execute(&self, plan: &BuildPlan) -> Result<ExecuteReport> {
        execute(plan, &self.graph, &self.config, &self.store, &self.options)
    }

    /// Plan `roots` and, unless this is a dry run, execute the plan.
    pub fn run(&self, roots: &[Target]) -> Result<RunOutcome> {
        let plan = self.resolve(roots)?;
        if self.options.dry_run {
            return Ok(RunOutcome::Planned(plan));
        }
        let report = self.execute(&plan)?;
        Ok(RunOutcome::Executed { plan, report })
    }
}
