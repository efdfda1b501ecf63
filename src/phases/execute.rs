//! Phase 2: Execute
//!
//! Runs a `BuildPlan` against the filesystem.
//!
//! ## Process
//!
//! 1.  **Parallel downloads**: with more than one job (never in rebuild
//!     mode) the sources of every project to acquire are staged up front on
//!     a rayon pool.
//!
//! 2.  **Steps in plan order**: `Acquire` wipes the store entry in rebuild
//!     mode and stages sources that were not fetched in step 1. `Apply`
//!     builds the project in a staging directory, commits it to the store
//!     and links its bundled dependencies.
//!
//! 3.  **Targets**: site installs and database installs run after every
//!     project is in place.
//!
//! The first failure aborts the run. Projects committed before it stay in
//! the store; the failing project is left absent.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rayon::prelude::*;

use super::{assemble, BuildMode, BuildOptions, BuildPlan, StepAction};
use crate::applier::{Applier, ApplyContext};
use crate::config::Config;
use crate::downloader::{DownloadContext, Downloader};
use crate::error::{Error, Result};
use crate::project::{Project, ProjectGraph};
use crate::site;
use crate::store::CanonicalStore;
use crate::target::TargetKind;

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteReport {
    /// Projects committed to the store, in order.
    pub built: Vec<String>,
    pub skipped: Vec<String>,
    pub sites_installed: Vec<String>,
    pub databases_installed: Vec<String>,
}

/// Execute `plan`.
pub fn execute(
    plan: &BuildPlan,
    graph: &ProjectGraph,
    config: &Config,
    store: &CanonicalStore,
    options: &BuildOptions,
) -> Result<ExecuteReport> {
    let mut report = ExecuteReport::default();
    let mut staged = prefetch(plan, graph, options)?;

    for step in &plan.steps {
        let project = graph.get(&step.project)?;
        match step.action {
            StepAction::Acquire => {
                if options.mode == BuildMode::Rebuild {
                    info!("Wiping {}", store.path(&project.dirname).display());
                    store.wipe(&project.dirname)?;
                }
                if !staged.contains_key(&project.dirname) {
                    let sources = download_project(project, options)
                        .map_err(|e| e.for_project(&project.dirname))?;
                    staged.insert(project.dirname.clone(), sources);
                }
            }
            StepAction::Apply => {
                let sources =
                    staged
                        .remove(&project.dirname)
                        .ok_or_else(|| Error::ApplyFailed {
                            project: project.dirname.clone(),
                            reason: "applied before it was acquired".to_string(),
                        })?;
                apply_project(project, &sources, store, options)?;
                report.built.push(project.dirname.clone());
            }
            StepAction::SkipAlreadySatisfied => {
                debug!("{} is already built", project.dirname);
                report.skipped.push(project.dirname.clone());
            }
        }
    }

    for target in &plan.targets {
        let Some(site) = target.site.as_deref() else {
            continue;
        };
        match target.kind {
            TargetKind::BuildAll => {}
            TargetKind::SiteInstall => {
                site::install(config, store, options, site)?;
                report.sites_installed.push(site.to_string());
            }
            TargetKind::DbInstall => {
                site::install_database(config, options, site)?;
                report.databases_installed.push(site.to_string());
            }
        }
    }

    Ok(report)
}

/// Stage the sources of every project to acquire on a bounded pool.
fn prefetch(
    plan: &BuildPlan,
    graph: &ProjectGraph,
    options: &BuildOptions,
) -> Result<HashMap<String, Vec<PathBuf>>> {
    let jobs = options.effective_jobs();
    if jobs <= 1 {
        return Ok(HashMap::new());
    }
    let projects = plan
        .steps
        .iter()
        .filter(|s| s.action == StepAction::Acquire)
        .map(|s| graph.get(&s.project))
        .collect::<Result<Vec<&Project>>>()?;
    if projects.is_empty() {
        return Ok(HashMap::new());
    }

    info!("Downloading {} projects with {} jobs", projects.len(), jobs);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::Io(io::Error::other(e)))?;
    let staged = pool.install(|| {
        projects
            .par_iter()
            .map(|project| {
                download_project(project, options)
                    .map(|sources| (project.dirname.clone(), sources))
                    .map_err(|e| e.for_project(&project.dirname))
            })
            .collect::<Result<Vec<_>>>()
    })?;
    Ok(staged.into_iter().collect())
}

/// Stage every build step's source of one project.
fn download_project(project: &Project, options: &BuildOptions) -> Result<Vec<PathBuf>> {
    let download_dir = options.download_dir.join(&project.dirname);
    let ctx = DownloadContext {
        download_dir: &download_dir,
        source_dir: &options.source_dir,
        force: options.mode != BuildMode::Default,
        timeout: options.command_timeout,
    };
    project
        .build_steps
        .iter()
        .map(|step| Downloader::new(step.downloader, &step.config)?.download(&ctx))
        .collect()
}

/// Build one project in its staging directory and commit it.
fn apply_project(
    project: &Project,
    sources: &[PathBuf],
    store: &CanonicalStore,
    options: &BuildOptions,
) -> Result<()> {
    info!("Building {}", project.dirname);
    let stamp = project.stamp().map_err(|e| e.for_project(&project.dirname))?;
    let staging = store.begin(&project.dirname)?;
    if let Err(e) = apply_steps(project, sources, &staging, options) {
        store.discard(&project.dirname)?;
        return Err(e.for_project(&project.dirname));
    }
    let dir = store.commit(&project.dirname, &stamp)?;

    if !project.children.is_empty() {
        assemble(
            &project.children,
            Path::new(".."),
            &options.overrides,
            &dir,
        )
        .map_err(|e| e.for_project(&project.dirname))?;
    }
    Ok(())
}

fn apply_steps(
    project: &Project,
    sources: &[PathBuf],
    staging: &Path,
    options: &BuildOptions,
) -> Result<()> {
    let ctx = ApplyContext {
        devel: options.devel,
        timeout: options.command_timeout,
    };
    for (step, source) in project.build_steps.iter().zip(sources) {
        Applier::new(step.applier, &step.config, source.clone()).apply_to(staging, &ctx)?;
    }
    if !options.devel {
        let stamped = project.stamp_info_files(staging)?;
        if stamped > 0 {
            debug!("Added version information to {} .info files", stamped);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::archive::fixtures;
    use crate::config::parse_json;
    use crate::phases::resolve::resolve;
    use crate::phases::PlanStep;
    use crate::target::Target;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        config: Config,
        graph: ProjectGraph,
        store: CanonicalStore,
        options: BuildOptions,
    }

    fn fixture(extra_projects: &str) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let source_dir = temp_dir.path().join("source");
        fs::create_dir_all(source_dir.join("libs")).unwrap();
        fixtures::tar_gz(
            &source_dir.join("libs/sentry-php-1.6.2.tar.gz"),
            &[("sentry-php-1.6.2/lib/Raven.php", "<?php")],
        );
        fixtures::tar_gz(
            &source_dir.join("libs/tools-7.x-1.0.tar.gz"),
            &[("tools/tools.info", "name = Tools\n")],
        );

        let config = parse_json(&format!(
            r#"{{
                "documentRoot": "htdocs",
                "projectsDir": "projects",
                "core": {{ "project": "tools-7.x-1.0" }},
                "projects": {{
                    "tools-7.x-1.0": {{
                        "build": [ {{ "path": "libs/tools-7.x-1.0.tar.gz" }} ],
                        "projects": {{ "libraries": {{ "sentry": "sentry-php-1.6.2" }} }}
                    }},
                    "sentry-php-1.6.2": {{
                        "type": "library",
                        "build": [ {{ "path": "libs/sentry-php-1.6.2.tar.gz" }} ]
                    }}{}
                }}
            }}"#,
            extra_projects
        ))
        .unwrap();
        let graph = ProjectGraph::from_config(&config).unwrap();
        let install_dir = temp_dir.path().join("www");
        let store = CanonicalStore::new(install_dir.join("projects"));
        let options = BuildOptions::new(&install_dir, &source_dir);
        Fixture {
            _temp_dir: temp_dir,
            config,
            graph,
            store,
            options,
        }
    }

    fn plan(f: &Fixture) -> BuildPlan {
        let snapshot = f.store.snapshot(f.graph.dirnames());
        resolve(
            &f.graph,
            &[Target::build_all(&f.graph)],
            &snapshot,
            f.options.mode,
        )
        .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_builds_dependencies_and_links_children() {
        let f = fixture("");
        let plan = plan(&f);
        let report = execute(&plan, &f.graph, &f.config, &f.store, &f.options).unwrap();

        assert_eq!(report.built, vec!["sentry-php-1.6.2", "tools-7.x-1.0"]);
        assert!(f.store.path("sentry-php-1.6.2").join("lib/Raven.php").is_file());
        let tools = f.store.path("tools-7.x-1.0");
        assert!(tools.join("tools.info").is_file());
        assert_eq!(
            fs::read_link(tools.join("libraries/sentry")).unwrap(),
            PathBuf::from("../../sentry-php-1.6.2")
        );
        assert!(tools.join("libraries/sentry/lib/Raven.php").is_file());

        // Nothing left to do on the next run.
        let again = self::plan(&f);
        assert!(again.is_satisfied());
        let report = execute(&again, &f.graph, &f.config, &f.store, &f.options).unwrap();
        assert!(report.built.is_empty());
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn test_parallel_downloads() {
        let mut f = fixture("");
        f.options.jobs = 4;
        let plan = plan(&f);
        let report = execute(&plan, &f.graph, &f.config, &f.store, &f.options).unwrap();
        assert_eq!(report.built.len(), 2);
        assert!(f
            .options
            .download_dir
            .join("sentry-php-1.6.2/sentry-php-1.6.2.tar.gz")
            .is_file());
    }

    #[test]
    fn test_failure_leaves_project_absent() {
        let f = fixture(
            r#",
            "broken-7.x-1.0": { "build": [ { "path": "libs/missing.tar.gz" } ] }"#,
        );
        let plan = plan(&f);
        let err = execute(&plan, &f.graph, &f.config, &f.store, &f.options).unwrap_err();
        match err {
            Error::ApplyFailed { project, .. } => assert_eq!(project, "broken-7.x-1.0"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!f.store.exists("broken-7.x-1.0"));
        assert!(!f.store.staging_path("broken-7.x-1.0").exists());
    }

    #[test]
    fn test_apply_without_acquire_is_rejected() {
        let f = fixture("");
        let plan = BuildPlan {
            steps: vec![PlanStep {
                project: "sentry-php-1.6.2".to_string(),
                action: StepAction::Apply,
            }],
            targets: Vec::new(),
        };
        assert!(execute(&plan, &f.graph, &f.config, &f.store, &f.options).is_err());
    }

    #[test]
    fn test_rebuild_wipes_existing_entry() {
        let mut f = fixture("");
        execute(&plan(&f), &f.graph, &f.config, &f.store, &f.options).unwrap();
        fs::write(f.store.path("sentry-php-1.6.2").join("local-change.txt"), "x").unwrap();

        f.options.mode = BuildMode::Rebuild;
        let report = execute(&plan(&f), &f.graph, &f.config, &f.store, &f.options).unwrap();
        assert_eq!(report.built.len(), 2);
        assert!(!f.store.path("sentry-php-1.6.2").join("local-change.txt").exists());
    }
}
