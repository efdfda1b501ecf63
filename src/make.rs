//! drush make export.
//!
//! Renders the project table as a drush make file (`api = 2`). drupal.org
//! projects become `projects[...]` entries, everything else is listed under
//! `libraries[...]` with its download source.

use std::fmt::{self, Write};

use crate::applier::ApplierKind;
use crate::config::Config;
use crate::error::Result;
use crate::project::{BuildStep, Project, ProjectGraph, ProjectKind};

/// Render `config` as a drush make file.
pub fn render(config: &Config) -> Result<String> {
    let graph = ProjectGraph::from_config(config)?;
    let mut out = String::new();
    writeln!(out, "api = 2")?;
    if config.core.project.starts_with("drupal-") {
        writeln!(out, "core = 7.x")?;
    }
    for project in graph.projects() {
        writeln!(out)?;
        match project.kind {
            ProjectKind::DrupalOrg => drupal_org_entry(&mut out, project)?,
            ProjectKind::Generic => library_entry(&mut out, project)?,
        }
    }
    Ok(out)
}

fn drupal_org_entry<W: Write>(out: &mut W, project: &Project) -> fmt::Result {
    let name = project
        .identity
        .as_ref()
        .map_or(project.dirname.as_str(), |identity| identity.name.as_str());
    let key = format!("projects[{}]", name);

    if project.config.build.is_empty() {
        if let Some(identity) = &project.identity {
            writeln!(out, "{}[version] = \"{}\"", key, identity.version)?;
        }
        return Ok(());
    }
    for step in &project.build_steps {
        match step.applier {
            ApplierKind::Patch => {
                if let Some(source) = step.config.source() {
                    writeln!(out, "{}[patch][] = \"{}\"", key, source)?;
                }
            }
            ApplierKind::GitRepo => download_entry(out, &key, "git", step)?,
            _ => match (&project.identity, is_release_archive(project, step)) {
                (Some(identity), true) => {
                    writeln!(out, "{}[version] = \"{}\"", key, identity.version)?;
                }
                _ => download_entry(out, &key, "file", step)?,
            },
        }
    }
    Ok(())
}

fn library_entry<W: Write>(out: &mut W, project: &Project) -> fmt::Result {
    let key = format!("libraries[{}]", project.dirname);
    for step in &project.build_steps {
        match step.applier {
            ApplierKind::Patch => {
                if let Some(source) = step.config.source() {
                    writeln!(out, "{}[patch][] = \"{}\"", key, source)?;
                }
            }
            ApplierKind::GitRepo => download_entry(out, &key, "git", step)?,
            _ => download_entry(out, &key, "file", step)?,
        }
    }
    Ok(())
}

fn download_entry<W: Write>(out: &mut W, key: &str, kind: &str, step: &BuildStep) -> fmt::Result {
    writeln!(out, "{}[download][type] = \"{}\"", key, kind)?;
    if let Some(source) = step.config.source() {
        writeln!(out, "{}[download][url] = \"{}\"", key, source)?;
    }
    if let Some(branch) = &step.config.branch {
        writeln!(out, "{}[download][branch] = \"{}\"", key, branch)?;
    }
    if let Some(revision) = &step.config.revision {
        writeln!(out, "{}[download][revision] = \"{}\"", key, revision)?;
    }
    Ok(())
}

/// Whether `step` fetches the project's own release from drupal.org.
fn is_release_archive(project: &Project, step: &BuildStep) -> bool {
    let Some(identity) = &project.identity else {
        return false;
    };
    step.config
        .url
        .as_deref()
        .is_some_and(|url| url.contains("ftp.drupal.org") && url.contains(&identity.release()))
}
