//! # Canonical Project Store
//!
//! The store is a directory holding exactly one materialized copy of every
//! project, at `projectsDir/<dirname>/`. It is mutated only while executing a
//! plan and read by the site assembler.
//!
//! Projects are built in a staging directory next to their final location
//! (`projectsDir/.<dirname>.partial`) and renamed into place once every build
//! step succeeded. Each committed entry carries a stamp file recording the
//! configuration it was built from, which `update` mode uses to detect stale
//! entries.
//!
//! There is no locking: concurrent runs against the same store must be
//! serialized by the caller.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;
use crate::fsutil::remove_path;

/// Name of the stamp file inside every committed store entry.
pub const STAMP_FILE: &str = ".sitebuild-stamp";

/// State of one store entry as seen by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    /// Present, with the stamp it was built from (if any).
    Present(Option<String>),
}

/// Point-in-time view of the store, captured before planning so that
/// planning itself needs no filesystem access.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    entries: HashMap<String, Option<String>>,
}

impl StoreSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a present entry.
    pub fn insert(&mut self, dirname: &str, stamp: Option<String>) {
        self.entries.insert(dirname.to_string(), stamp);
    }

    pub fn state(&self, dirname: &str) -> EntryState {
        match self.entries.get(dirname) {
            Some(stamp) => EntryState::Present(stamp.clone()),
            None => EntryState::Absent,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle on the canonical store directory.
#[derive(Debug, Clone)]
pub struct CanonicalStore {
    root: PathBuf,
}

impl CanonicalStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of a project.
    pub fn path(&self, dirname: &str) -> PathBuf {
        self.root.join(dirname)
    }

    /// Staging location a project is built in.
    pub fn staging_path(&self, dirname: &str) -> PathBuf {
        self.root.join(format!(".{}.partial", dirname))
    }

    pub fn exists(&self, dirname: &str) -> bool {
        self.path(dirname).is_dir()
    }

    pub fn read_stamp(&self, dirname: &str) -> Option<String> {
        fs::read_to_string(self.path(dirname).join(STAMP_FILE))
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Capture the state of the given entries.
    pub fn snapshot<'a, I>(&self, dirnames: I) -> StoreSnapshot
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut snapshot = StoreSnapshot::new();
        for dirname in dirnames {
            if self.exists(dirname) {
                snapshot.insert(dirname, self.read_stamp(dirname));
            }
        }
        snapshot
    }

    /// Prepare a clean staging directory for `dirname`.
    ///
    /// Leftovers from an earlier failed attempt are removed first.
    pub fn begin(&self, dirname: &str) -> Result<PathBuf> {
        let staging = self.staging_path(dirname);
        remove_path(&staging)?;
        fs::create_dir_all(&staging)?;
        Ok(staging)
    }

    /// Move a finished staging directory into place, replacing any previous
    /// entry.
    pub fn commit(&self, dirname: &str, stamp: &str) -> Result<PathBuf> {
        let staging = self.staging_path(dirname);
        fs::write(staging.join(STAMP_FILE), format!("{}\n", stamp))?;
        let target = self.path(dirname);
        remove_path(&target)?;
        fs::rename(&staging, &target)?;
        debug!("committed {}", target.display());
        Ok(target)
    }

    /// Drop a staging directory after a failed build.
    pub fn discard(&self, dirname: &str) -> Result<()> {
        remove_path(&self.staging_path(dirname))
    }

    /// Delete a committed entry.
    pub fn wipe(&self, dirname: &str) -> Result<()> {
        remove_path(&self.path(dirname))
    }
}
