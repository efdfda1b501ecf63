//! # Build Command Implementation
//!
//! `build` materializes every configured project, plus every project
//! referenced from a site tree, into the canonical store. Sites are not
//! touched.

use anyhow::Result;
use clap::Args;

use sitebuild::project::ProjectGraph;
use sitebuild::target::Target;

use super::run::{run, RunArgs};

/// Build all projects
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

/// Execute the `build` command.
pub fn execute(args: BuildArgs) -> Result<()> {
    run(&args.run, |config| {
        let graph = ProjectGraph::from_config(config)?;
        Ok(vec![Target::build_all(&graph)])
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_execute_missing_config() {
        let args = BuildArgs {
            run: RunArgs {
                source_dir: Some(PathBuf::from("/nonexistent/setup")),
                dry_run: true,
                ..Default::default()
            },
        };
        let result = execute(args);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("No project.json found"));
    }
}
