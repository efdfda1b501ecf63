//! Verbatim file and directory copies.

use std::path::Path;

use crate::error::Result;
use crate::fsutil::{copy_dir, copy_file, remove_path};

/// Copy a single file to `dest`, replacing whatever was there.
pub fn file(source: &Path, dest: &Path) -> Result<()> {
    copy_file(source, dest)
}

/// Replace `dest` with a copy of the directory `source`.
///
/// When `dest` is the project root itself the existing content is kept and
/// overwritten entry by entry.
pub fn directory(source: &Path, dest: &Path, is_root: bool) -> Result<()> {
    if !is_root {
        remove_path(dest)?;
    }
    copy_dir(source, dest)
}
