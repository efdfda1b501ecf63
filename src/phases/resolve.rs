//! Phase 1: Resolve
//!
//! Expands the requested targets into a `BuildPlan`.
//!
//! ## Process
//!
//! 1.  **Target flattening**: every root target is preceded by the targets it
//!     requires; a target requested twice is kept once.
//!
//! 2.  **Depth-First Traversal**: the projects each target requires are
//!     visited depth first through their bundled dependencies. A project is
//!     emitted only after all of its dependencies (post-order), so
//!     dependencies always precede their dependents.
//!
//! 3.  **Memoization**: a project reached from several targets or parents is
//!     emitted once.
//!
//! 4.  **Cycle detection**: reaching a project that is still on the current
//!     path fails with `DependencyCycle` and no plan is returned.
//!
//! The store state comes in as a `StoreSnapshot`, so this phase performs no
//! I/O and can be run any number of times.

use std::collections::HashSet;

use super::{BuildMode, BuildPlan, PlanStep, StepAction};
use crate::error::{Error, Result};
use crate::project::{Project, ProjectGraph};
use crate::store::{EntryState, StoreSnapshot};
use crate::target::Target;

/// Plan the given targets.
pub fn resolve(
    graph: &ProjectGraph,
    roots: &[Target],
    snapshot: &StoreSnapshot,
    mode: BuildMode,
) -> Result<BuildPlan> {
    let mut targets = Vec::new();
    for root in roots {
        flatten_target(root, &mut targets);
    }

    let mut walk = Walk {
        graph,
        snapshot,
        mode,
        done: HashSet::new(),
        path: Vec::new(),
        steps: Vec::new(),
    };
    for target in &targets {
        for dirname in &target.required_projects {
            walk.visit(dirname)?;
        }
    }

    Ok(BuildPlan {
        steps: walk.steps,
        targets,
    })
}

fn flatten_target(target: &Target, out: &mut Vec<Target>) {
    if out.contains(target) {
        return;
    }
    for required in &target.requires {
        flatten_target(required, out);
    }
    out.push(target.clone());
}

struct Walk<'a> {
    graph: &'a ProjectGraph,
    snapshot: &'a StoreSnapshot,
    mode: BuildMode,
    done: HashSet<String>,
    /// Projects on the current traversal path.
    path: Vec<String>,
    steps: Vec<PlanStep>,
}

impl Walk<'_> {
    fn visit(&mut self, dirname: &str) -> Result<()> {
        if self.done.contains(dirname) {
            return Ok(());
        }
        if let Some(start) = self.path.iter().position(|p| p == dirname) {
            let mut cycle: Vec<&str> = self.path[start..].iter().map(String::as_str).collect();
            cycle.push(dirname);
            return Err(Error::DependencyCycle {
                path: cycle.join(" -> "),
            });
        }

        let graph = self.graph;
        let project = graph.get(dirname)?;
        self.path.push(dirname.to_string());
        for dependency in project.dependencies() {
            self.visit(&dependency)?;
        }
        self.path.pop();

        self.emit(project)?;
        self.done.insert(dirname.to_string());
        Ok(())
    }

    fn emit(&mut self, project: &Project) -> Result<()> {
        let needs_build = match (self.mode, self.snapshot.state(&project.dirname)) {
            (BuildMode::Rebuild, _) | (_, EntryState::Absent) => true,
            (BuildMode::Update, EntryState::Present(stamp)) => {
                stamp.as_deref() != Some(project.stamp()?.as_str())
            }
            (BuildMode::Default, EntryState::Present(_)) => false,
        };
        let step = |action| PlanStep {
            project: project.dirname.clone(),
            action,
        };
        if needs_build {
            self.steps.push(step(StepAction::Acquire));
            self.steps.push(step(StepAction::Apply));
        } else {
            self.steps.push(step(StepAction::SkipAlreadySatisfied));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProjectConfig, SiteTree, StepConfig};
    use crate::target::TargetKind;
    use std::collections::BTreeMap;

    fn project(dirname: &str, children: &[&str]) -> Project {
        let mut tree = BTreeMap::new();
        for child in children {
            tree.insert(child.to_string(), SiteTree::Leaf(child.to_string()));
        }
        let config = ProjectConfig {
            kind: Some("library".to_string()),
            build: vec![StepConfig {
                url: Some(format!("https://example.com/{}.tar.gz", dirname)),
                ..Default::default()
            }],
            projects: SiteTree::Composite(tree),
        };
        Project::new(dirname, &config).unwrap()
    }

    fn graph(projects: Vec<Project>) -> ProjectGraph {
        let mut graph = ProjectGraph::new();
        for project in projects {
            graph.insert(project);
        }
        graph
    }

    fn root(projects: &[&str]) -> Target {
        Target {
            kind: TargetKind::BuildAll,
            site: None,
            required_projects: projects.iter().map(|p| p.to_string()).collect(),
            requires: Vec::new(),
        }
    }

    fn built(plan: &BuildPlan) -> Vec<&str> {
        plan.projects_to_build()
    }

    #[test]
    fn test_chain_is_ordered_dependencies_first() {
        let graph = graph(vec![
            project("a", &["b"]),
            project("b", &["c"]),
            project("c", &[]),
        ]);
        let snapshot = StoreSnapshot::new();
        for roots in [["a", "b", "c"], ["c", "b", "a"], ["b", "a", "c"]] {
            let plan = resolve(&graph, &[root(&roots)], &snapshot, BuildMode::Default).unwrap();
            assert_eq!(built(&plan), vec!["c", "b", "a"]);
            assert_eq!(plan.steps.len(), 6);
        }
    }

    #[test]
    fn test_shared_project_is_planned_once() {
        let graph = graph(vec![
            project("a", &["shared"]),
            project("b", &["shared"]),
            project("shared", &[]),
        ]);
        let plan = resolve(
            &graph,
            &[root(&["a"]), root(&["b"])],
            &StoreSnapshot::new(),
            BuildMode::Default,
        )
        .unwrap();
        let acquires = plan
            .steps
            .iter()
            .filter(|s| s.project == "shared" && s.action == StepAction::Acquire)
            .count();
        assert_eq!(acquires, 1);
        assert_eq!(built(&plan), vec!["shared", "a", "b"]);
        assert_eq!(plan.targets.len(), 2);
    }

    #[test]
    fn test_cycle_fails_without_plan() {
        let graph = graph(vec![project("a", &["b"]), project("b", &["a"])]);
        let err = resolve(&graph, &[root(&["a"])], &StoreSnapshot::new(), BuildMode::Default)
            .unwrap_err();
        match err {
            Error::DependencyCycle { path } => assert_eq!(path, "a -> b -> a"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_project() {
        let graph = graph(vec![project("a", &["missing"])]);
        assert!(matches!(
            resolve(&graph, &[root(&["a"])], &StoreSnapshot::new(), BuildMode::Default),
            Err(Error::UnknownProject { .. })
        ));
    }

    #[test]
    fn test_modes_against_snapshot() {
        let a = project("a", &[]);
        let fresh = a.stamp().unwrap();
        let graph = graph(vec![a, project("b", &[]), project("c", &[])]);

        let mut snapshot = StoreSnapshot::new();
        snapshot.insert("a", Some(fresh));
        snapshot.insert("b", Some("stale".to_string()));
        let roots = [root(&["a", "b", "c"])];

        let plan = resolve(&graph, &roots, &snapshot, BuildMode::Default).unwrap();
        assert_eq!(built(&plan), vec!["c"]);

        let plan = resolve(&graph, &roots, &snapshot, BuildMode::Update).unwrap();
        assert_eq!(built(&plan), vec!["b", "c"]);

        let plan = resolve(&graph, &roots, &snapshot, BuildMode::Rebuild).unwrap();
        assert_eq!(built(&plan), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_target_dependencies_come_first() {
        let graph = graph(vec![project("core", &[])]);
        let install = Target {
            kind: TargetKind::SiteInstall,
            site: Some("default".to_string()),
            required_projects: vec!["core".to_string()],
            requires: Vec::new(),
        };
        let db = Target {
            kind: TargetKind::DbInstall,
            site: Some("default".to_string()),
            required_projects: Vec::new(),
            requires: vec![install.clone()],
        };
        let plan = resolve(&graph, &[db, install], &StoreSnapshot::new(), BuildMode::Default)
            .unwrap();
        let keys: Vec<String> = plan.targets.iter().map(Target::key).collect();
        assert_eq!(keys, vec!["install:default", "db-install:default"]);
        assert_eq!(built(&plan), vec!["core"]);
    }
}
