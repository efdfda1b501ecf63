//! Unified diff application via the system `patch`.

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::process::ToolCommand;

/// Apply `patch_file` to the tree at `dest` with one leading path component
/// stripped.
///
/// Already applied or failing hunks are errors; no backup or reject files
/// are left behind.
pub fn apply(patch_file: &Path, dest: &Path, timeout: Option<Duration>) -> Result<()> {
    // `patch -d` changes directory before it opens the input file.
    let patch_file = std::path::absolute(patch_file)?;
    ToolCommand::new("patch")
        .args(["-p1", "--batch", "--forward", "--no-backup-if-mismatch", "-r", "-", "-d"])
        .arg(dest)
        .arg("-i")
        .arg(&patch_file)
        .timeout(timeout)
        .run()
        .map(|_| ())
        .map_err(|e| match e {
            Error::Command { stderr, status, .. } if status != "not started" => Error::PatchRejected {
                patch: patch_file.display().to_string(),
                stderr,
            },
            other => other,
        })
}
