//! Filesystem helpers shared by the appliers and the site installer.

use std::fs;
use std::io;
use std::path::Path;

use glob::Pattern;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Remove whatever exists at `path`: file, symlink or directory tree.
///
/// Symlinks are removed themselves, never followed. A missing path is not an
/// error.
pub fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Copy a single file, creating parent directories and replacing whatever
/// was at `dst` before.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::symlink_metadata(dst).is_ok_and(|m| !m.is_file()) {
        remove_path(dst)?;
    }
    fs::copy(src, dst).map_err(|e| {
        Error::Io(io::Error::new(
            e.kind(),
            format!("copy {} -> {}: {}", src.display(), dst.display(), e),
        ))
    })?;
    Ok(())
}

/// Recursively copy `src` into `dst`, overwriting existing entries.
///
/// Symlinks are recreated as symlinks on unix.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Io(io::Error::other(e)))?;
        let target = dst.join(relative);
        copy_entry(&entry, &target)?;
    }
    Ok(())
}

fn copy_entry(entry: &walkdir::DirEntry, target: &Path) -> Result<()> {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        if fs::symlink_metadata(target).is_ok_and(|m| !m.is_dir()) {
            remove_path(target)?;
        }
        fs::create_dir_all(target)?;
    } else if file_type.is_symlink() {
        copy_symlink(entry.path(), target)?;
    } else {
        copy_file(entry.path(), target)?;
        if let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) {
            let file = fs::OpenOptions::new().write(true).open(target)?;
            file.set_modified(modified)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    remove_path(dst)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(link, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    copy_file(src, dst)
}

/// Make `dst` mirror `src`.
///
/// Files whose size or modification time differ are copied, entries that
/// only exist in `dst` are deleted. Paths matching one of the `protected`
/// patterns are neither copied nor deleted. Patterns follow rsync's exclude
/// rules: one without a `/` matches an entry name at any depth, one with a
/// `/` matches the path relative to the roots, and a leading `/` anchors a
/// single name at the top level.
pub fn sync_dirs(src: &Path, dst: &Path, protected: &[Pattern]) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    fs::create_dir_all(dst)?;

    let mut walker = WalkDir::new(src).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Io(io::Error::other(e)))?
            .to_path_buf();
        if is_protected(protected, &relative) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }
        let target = dst.join(&relative);
        if entry.file_type().is_file() && is_unchanged(&entry, &target) {
            continue;
        }
        if !entry.file_type().is_dir() || !target.is_dir() {
            report.copied += 1;
        }
        copy_entry(&entry, &target)?;
    }

    let mut walker = WalkDir::new(dst).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(dst)
            .map_err(|e| Error::Io(io::Error::other(e)))?
            .to_path_buf();
        if is_protected(protected, &relative) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }
        if fs::symlink_metadata(src.join(&relative)).is_err() {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            remove_path(entry.path())?;
            report.deleted += 1;
        }
    }

    Ok(report)
}

fn is_protected(protected: &[Pattern], relative: &Path) -> bool {
    let rel = relative.to_string_lossy();
    let name = relative
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    protected.iter().any(|pattern| {
        let raw = pattern.as_str();
        if raw.starts_with('/') {
            pattern.matches(&format!("/{}", rel))
        } else if raw.contains('/') {
            pattern.matches(&rel)
        } else {
            pattern.matches(&name)
        }
    })
}

fn is_unchanged(entry: &walkdir::DirEntry, target: &Path) -> bool {
    let (Ok(source), Ok(existing)) = (entry.metadata(), fs::symlink_metadata(target)) else {
        return false;
    };
    existing.is_file()
        && source.len() == existing.len()
        && matches!((source.modified(), existing.modified()), (Ok(a), Ok(b)) if a == b)
}

/// Counts reported by `sync_dirs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub copied: usize,
    pub deleted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_nested() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/file.txt"), "nested").unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();

        let dst = temp_dir.path().join("dst");
        copy_dir(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a/b/file.txt")).unwrap(), "nested");
        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
    }

    #[test]
    fn test_copy_dir_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("file.txt"), "new").unwrap();

        let dst = temp_dir.path().join("dst");
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("file.txt"), "old content").unwrap();

        copy_dir(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("file.txt")).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_path_does_not_follow_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("keep.txt"), "keep").unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        remove_path(&link).unwrap();
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(real.join("keep.txt").exists());

        remove_path(&temp_dir.path().join("missing")).unwrap();
    }

    #[test]
    fn test_sync_dirs_deletes_extraneous_but_keeps_protected() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("core");
        fs::create_dir_all(src.join("includes")).unwrap();
        fs::create_dir_all(src.join("sites/default")).unwrap();
        fs::write(src.join("index.php"), "<?php").unwrap();
        fs::write(src.join("includes/common.inc"), "common").unwrap();
        fs::write(src.join("sites/default/default.settings.php"), "defaults").unwrap();

        let dst = temp_dir.path().join("htdocs");
        fs::create_dir_all(dst.join("sites/default")).unwrap();
        fs::write(dst.join("sites/default/settings.php"), "local").unwrap();
        fs::write(dst.join("stale.php"), "stale").unwrap();

        let protected = vec![Pattern::new("sites").unwrap()];
        let report = sync_dirs(&src, &dst, &protected).unwrap();

        assert!(dst.join("index.php").exists());
        assert!(dst.join("includes/common.inc").exists());
        assert!(!dst.join("stale.php").exists());
        assert_eq!(
            fs::read_to_string(dst.join("sites/default/settings.php")).unwrap(),
            "local"
        );
        assert!(!dst.join("sites/default/default.settings.php").exists());
        assert_eq!(report.deleted, 1);
    }

    #[test]
    fn test_protected_pattern_anchoring() {
        let patterns = |raw: &[&str]| -> Vec<Pattern> {
            raw.iter().map(|p| Pattern::new(p).unwrap()).collect()
        };

        let unanchored = patterns(&["sites", "*.local.php"]);
        assert!(is_protected(&unanchored, Path::new("sites")));
        assert!(is_protected(&unanchored, Path::new("profiles/standard/sites")));
        assert!(is_protected(&unanchored, Path::new("includes/settings.local.php")));
        assert!(!is_protected(&unanchored, Path::new("sites.php")));

        let nested = patterns(&["sites/default/files"]);
        assert!(is_protected(&nested, Path::new("sites/default/files")));
        assert!(!is_protected(&nested, Path::new("profiles/sites/default/files")));

        let rooted = patterns(&["/sites"]);
        assert!(is_protected(&rooted, Path::new("sites")));
        assert!(!is_protected(&rooted, Path::new("profiles/standard/sites")));
    }

    #[test]
    fn test_sync_dirs_protects_nested_names() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("core");
        fs::create_dir_all(src.join("profiles/standard")).unwrap();
        fs::write(src.join("profiles/standard/standard.info"), "core").unwrap();

        let dst = temp_dir.path().join("htdocs");
        fs::create_dir_all(dst.join("profiles/standard/sites")).unwrap();
        fs::write(dst.join("profiles/standard/sites/local.php"), "local").unwrap();

        let report = sync_dirs(&src, &dst, &[Pattern::new("sites").unwrap()]).unwrap();
        assert_eq!(report.deleted, 0);
        assert!(dst.join("profiles/standard/sites/local.php").is_file());
        assert!(dst.join("profiles/standard/standard.info").is_file());
    }

    #[test]
    fn test_sync_dirs_second_run_copies_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("core");
        fs::create_dir_all(src.join("modules")).unwrap();
        fs::write(src.join("modules/system.module"), "system").unwrap();
        let dst = temp_dir.path().join("htdocs");

        let first = sync_dirs(&src, &dst, &[]).unwrap();
        assert!(first.copied > 0);
        let second = sync_dirs(&src, &dst, &[]).unwrap();
        assert_eq!(second, SyncReport::default());
    }
}
