//! Phase 3: Assemble
//!
//! Turns a `SiteTree` into directories and symbolic links below a base path.
//!
//! The tree is walked breadth-first. Composite nodes become directories,
//! leaves become relative symlinks into the canonical store, so the whole
//! site can be moved as a unit. Every path segment below the base counts
//! towards the link depth, including `/`-separated segments inside a key:
//! a leaf at depth `d` links to `"../" * (d - 1) + projects_dir + dirname`.
//!
//! A leaf whose basename has an override links to the override path
//! verbatim instead. Whatever exists at a leaf path is replaced, except a
//! symlink that already points at the right target, which is left alone so
//! that re-running against an unchanged tree changes nothing.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};

use crate::config::SiteTree;
use crate::error::{Error, Result};
use crate::fsutil::remove_path;
use crate::overrides::OverrideMap;

/// What an assembly run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub directories_created: usize,
    pub links_created: usize,
    pub links_unchanged: usize,
}

/// Materialize `tree` below `base_path`.
///
/// `projects_dir` is the canonical store location relative to `base_path`,
/// or an absolute path.
pub fn assemble(
    tree: &SiteTree,
    projects_dir: &Path,
    overrides: &OverrideMap,
    base_path: &Path,
) -> Result<AssemblyReport> {
    if let SiteTree::Leaf(dirname) = tree {
        return Err(Error::ConfigParse {
            message: format!("site tree root must be a mapping, got project '{}'", dirname),
            hint: None,
        });
    }

    let mut report = AssemblyReport::default();
    let mut queue: VecDeque<(PathBuf, usize, &SiteTree)> = VecDeque::new();
    queue.push_back((base_path.to_path_buf(), 0, tree));

    while let Some((path, depth, node)) = queue.pop_front() {
        match node {
            SiteTree::Composite(children) => {
                if ensure_dir(&path)? {
                    report.directories_created += 1;
                }
                for (key, child) in children {
                    let segments = key_segments(key)?;
                    queue.push_back((path.join(key), depth + segments, child));
                }
            }
            SiteTree::Leaf(dirname) => {
                let target = link_target(&path, depth, dirname, projects_dir, overrides);
                if link(&path, &target)? {
                    info!("symlink: {} -> {}", path.display(), target.display());
                    report.links_created += 1;
                } else {
                    debug!("{} is up to date", path.display());
                    report.links_unchanged += 1;
                }
            }
        }
    }
    Ok(report)
}

/// Link target of the leaf at `path`, `depth` segments below the base.
pub fn link_target(
    path: &Path,
    depth: usize,
    dirname: &str,
    projects_dir: &Path,
    overrides: &OverrideMap,
) -> PathBuf {
    let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if let Some(redirect) = overrides.get(basename) {
        return redirect.to_path_buf();
    }
    if projects_dir.is_absolute() {
        return projects_dir.join(dirname);
    }
    let mut target = PathBuf::new();
    for _ in 1..depth {
        target.push("..");
    }
    target.join(projects_dir).join(dirname)
}

/// Number of path segments a tree key stands for.
fn key_segments(key: &str) -> Result<usize> {
    let path = Path::new(key);
    let mut count = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => count += 1,
            Component::CurDir => {}
            _ => {
                return Err(Error::ConfigParse {
                    message: format!("site tree key '{}' must be a relative path below the site", key),
                    hint: None,
                })
            }
        }
    }
    if count == 0 {
        return Err(Error::ConfigParse {
            message: format!("empty site tree key '{}'", key),
            hint: None,
        });
    }
    Ok(count)
}

/// Make sure `path` is a real directory. Returns whether it was created.
fn ensure_dir(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(false),
        Ok(_) => {
            // A symlink (possibly into the store) or a file: never create
            // entries through it.
            remove_path(path)?;
            fs::create_dir_all(path)?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path)?;
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

/// Point `path` at `target`. Returns whether anything changed.
fn link(path: &Path, target: &Path) -> Result<bool> {
    if fs::read_link(path).is_ok_and(|existing| existing == target) {
        return Ok(false);
    }
    remove_path(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    symlink(target, path)?;
    Ok(true)
}

#[cfg(unix)]
fn symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(windows)]
fn symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, path)
}
