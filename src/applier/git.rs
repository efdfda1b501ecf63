//! Git checkouts.
//!
//! Uses the system `git`, so SSH keys, credential helpers and anything else
//! configured in `~/.gitconfig` apply unchanged.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;
use walkdir::WalkDir;

use crate::config::StepConfig;
use crate::error::Result;
use crate::fsutil::remove_path;
use crate::process::ToolCommand;

/// Clone `source` into `dest` and check out the configured reference.
///
/// Without a revision the clone is shallow. An existing `dest` is replaced.
pub fn checkout(source: &Path, dest: &Path, step: &StepConfig, timeout: Option<Duration>) -> Result<()> {
    remove_path(dest)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut clone = ToolCommand::new("git").args(["clone", "--quiet"]);
    if step.revision.is_none() {
        clone = clone.arg("--depth=1");
    }
    if let Some(branch) = &step.branch {
        clone = clone.args(["--branch", branch.as_str()]);
    }
    clone.arg(source).arg(dest).timeout(timeout).run()?;

    if let Some(revision) = &step.revision {
        ToolCommand::new("git")
            .args(["checkout", "--quiet", revision.as_str()])
            .current_dir(dest)
            .timeout(timeout)
            .run()?;
    }
    Ok(())
}

/// Remove every `.git` entry below `root`, submodules included.
pub fn strip_metadata(root: &Path) -> Result<usize> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        if entry.file_name() == ".git" {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            found.push(entry.into_path());
        }
    }
    for path in &found {
        debug!("Removing {}", path.display());
        remove_path(path)?;
    }
    Ok(found.len())
}
