//! # Appliers
//!
//! An applier materializes one staged source into a project directory.
//! Variants are tried in this order:
//!
//! | Variant     | Applies when                                             |
//! |-------------|----------------------------------------------------------|
//! | `GitRepo`   | `type: git`, a branch/revision, or a `.git` source       |
//! | `Patch`     | `type: patch`, or a `.patch`/`.diff` source              |
//! | `Tarball`   | `type: tarball`, or a `.tar.gz`/`.tgz`/`.tar`/`.zip` source |
//! | `Directory` | `type: directory`, or a local path without an extension  |
//! | `CopyFile`  | `type: file`, or any other source                        |
//!
//! An explicit `type` always wins over inference from the source name.
//! Every applier overwrites what it finds at its destination, so re-applying
//! into a directory left over from a failed attempt is safe.

pub mod archive;
pub mod copy;
pub mod git;
pub mod patch;

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;

use crate::config::{StepConfig, StepType};
use crate::error::Result;
use crate::registry::{Candidate, Registry};

const PATCH_EXTENSIONS: &[&str] = &[".patch", ".diff"];
const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.gz", ".tgz", ".tar", ".zip"];

/// Applier variants, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplierKind {
    GitRepo,
    Patch,
    Tarball,
    Directory,
    CopyFile,
}

impl ApplierKind {
    fn step_type(&self) -> StepType {
        match self {
            ApplierKind::GitRepo => StepType::Git,
            ApplierKind::Patch => StepType::Patch,
            ApplierKind::Tarball => StepType::Tarball,
            ApplierKind::Directory => StepType::Directory,
            ApplierKind::CopyFile => StepType::File,
        }
    }
}

impl Candidate for ApplierKind {
    type Config = StepConfig;

    fn name(&self) -> &'static str {
        match self {
            ApplierKind::GitRepo => "git",
            ApplierKind::Patch => "patch",
            ApplierKind::Tarball => "tarball",
            ApplierKind::Directory => "directory",
            ApplierKind::CopyFile => "file",
        }
    }

    fn applies(&self, step: &StepConfig) -> bool {
        if let Some(declared) = step.kind {
            return declared == self.step_type();
        }
        match self {
            ApplierKind::GitRepo => step.is_scm(),
            ApplierKind::Patch => step.has_extension(PATCH_EXTENSIONS),
            ApplierKind::Tarball => step.has_extension(ARCHIVE_EXTENSIONS),
            ApplierKind::Directory => {
                step.url.is_none()
                    && step
                        .source_basename()
                        .is_some_and(|name| !name.contains('.'))
            }
            ApplierKind::CopyFile => step.source().is_some(),
        }
    }
}

/// The applier registry.
pub fn registry() -> Registry<ApplierKind> {
    Registry::new(
        "Applier",
        vec![
            ApplierKind::GitRepo,
            ApplierKind::Patch,
            ApplierKind::Tarball,
            ApplierKind::Directory,
            ApplierKind::CopyFile,
        ],
    )
}

/// Settings shared by every applier of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyContext {
    /// Keep VCS metadata.
    pub devel: bool,
    pub timeout: Option<Duration>,
}

/// One staged source bound to its applier.
#[derive(Debug, Clone)]
pub struct Applier {
    kind: ApplierKind,
    step: StepConfig,
    localpath: PathBuf,
}

impl Applier {
    pub fn new(kind: ApplierKind, step: &StepConfig, localpath: PathBuf) -> Self {
        Self {
            kind,
            step: step.clone(),
            localpath,
        }
    }

    pub fn kind(&self) -> ApplierKind {
        self.kind
    }

    /// Apply into `project_dir`, or into its configured `target` sub-path.
    pub fn apply_to(&self, project_dir: &Path, ctx: &ApplyContext) -> Result<()> {
        let target = self.step.target.as_deref().filter(|t| !t.is_empty());
        let dest = match target {
            Some(target) => project_dir.join(target),
            None => project_dir.to_path_buf(),
        };
        info!(
            "Applying {} ({}) to {}",
            self.localpath.display(),
            self.kind.name(),
            dest.display()
        );

        match self.kind {
            ApplierKind::GitRepo => {
                git::checkout(&self.localpath, &dest, &self.step, ctx.timeout)?;
                if !ctx.devel {
                    git::strip_metadata(&dest)?;
                }
            }
            ApplierKind::Patch => patch::apply(&self.localpath, &dest, ctx.timeout)?,
            ApplierKind::Tarball => archive::extract(&self.localpath, &dest)?,
            ApplierKind::Directory => copy::directory(&self.localpath, &dest, target.is_none())?,
            ApplierKind::CopyFile => {
                let dest = match (target, self.localpath.file_name()) {
                    (None, Some(name)) => dest.join(name),
                    _ => dest,
                };
                copy::file(&self.localpath, &dest)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn url(url: &str) -> StepConfig {
        StepConfig {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn path(path: &str) -> StepConfig {
        StepConfig {
            path: Some(path.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_registry_inference() {
        let registry = registry();
        let cases = [
            (url("https://github.com/x/campaignion.git"), ApplierKind::GitRepo),
            (url("https://www.drupal.org/files/issues/fix-123.patch"), ApplierKind::Patch),
            (path("patches/local.diff"), ApplierKind::Patch),
            (url("https://ftp.drupal.org/files/projects/views-7.x-3.18.tar.gz"), ApplierKind::Tarball),
            (url("https://code.highcharts.com/zips/Highcharts-4.2.7.zip"), ApplierKind::Tarball),
            (path("custom/my_module"), ApplierKind::Directory),
            (path("files/robots.txt"), ApplierKind::CopyFile),
            (url("https://example.com/library.php"), ApplierKind::CopyFile),
        ];
        for (step, expected) in cases {
            assert_eq!(registry.produce(&step).unwrap(), expected, "{:?}", step);
        }
    }

    #[test]
    fn test_declared_type_wins() {
        let mut step = url("https://example.com/download?id=12");
        step.kind = Some(StepType::Tarball);
        assert_eq!(registry().produce(&step).unwrap(), ApplierKind::Tarball);

        let mut step = path("vendor/library.zip");
        step.kind = Some(StepType::File);
        assert_eq!(registry().produce(&step).unwrap(), ApplierKind::CopyFile);
    }

    #[test]
    fn test_tarball_into_target() {
        let temp_dir = TempDir::new().unwrap();
        let staged = temp_dir.path().join("ckeditor.tar.gz");
        archive::fixtures::tar_gz(&staged, &[("ckeditor/ckeditor.js", "CKEDITOR")]);

        let project = temp_dir.path().join("project");
        fs::create_dir_all(&project).unwrap();
        let mut step = url("https://example.com/ckeditor.tar.gz");
        step.target = Some("libraries/ckeditor".to_string());

        Applier::new(ApplierKind::Tarball, &step, staged)
            .apply_to(&project, &ApplyContext::default())
            .unwrap();
        assert!(project.join("libraries/ckeditor/ckeditor.js").is_file());
    }

    #[test]
    fn test_copy_file_keeps_name() {
        let temp_dir = TempDir::new().unwrap();
        let staged = temp_dir.path().join("robots.txt");
        fs::write(&staged, "User-agent: *").unwrap();
        let project = temp_dir.path().join("project");
        fs::create_dir_all(&project).unwrap();

        Applier::new(ApplierKind::CopyFile, &path("files/robots.txt"), staged)
            .apply_to(&project, &ApplyContext::default())
            .unwrap();
        assert!(project.join("robots.txt").is_file());
    }
}
