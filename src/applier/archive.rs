//! Tar and zip extraction.
//!
//! The format is detected from the file's magic bytes. When every entry of
//! an archive lives below one single top-level directory, that wrapper
//! directory is stripped; otherwise entries are extracted verbatim.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use log::debug;

use crate::error::{Error, Result};
use crate::fsutil::remove_path;

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
}

/// Detect the archive format from the first bytes of `path`.
pub fn detect(path: &Path) -> Result<ArchiveFormat> {
    let mut header = [0u8; 512];
    let mut file = fs::File::open(path)?;
    let mut read = 0;
    while read < header.len() {
        let n = file.read(&mut header[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    let header = &header[..read];

    if header.starts_with(&[0x1f, 0x8b]) {
        Ok(ArchiveFormat::TarGz)
    } else if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
        Ok(ArchiveFormat::Zip)
    } else if header.len() >= 262 && &header[257..262] == b"ustar" {
        Ok(ArchiveFormat::Tar)
    } else {
        Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unrecognized archive format: {}", path.display()),
        )))
    }
}

/// One archive member, with a normalized relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// List the members of an archive.
pub fn list(path: &Path) -> Result<Vec<ArchiveEntry>> {
    match detect(path)? {
        ArchiveFormat::Zip => {
            let mut archive = zip::ZipArchive::new(fs::File::open(path)?)?;
            let mut entries = Vec::with_capacity(archive.len());
            for i in 0..archive.len() {
                let file = archive.by_index(i)?;
                let raw = file.enclosed_name().ok_or_else(|| unsafe_path(file.name()))?;
                if let Some(path) = normalize(&raw)? {
                    entries.push(ArchiveEntry {
                        path,
                        is_dir: file.is_dir(),
                    });
                }
            }
            Ok(entries)
        }
        format => {
            let mut archive = open_tar(path, format)?;
            let mut entries = Vec::new();
            for entry in archive.entries()? {
                let entry = entry?;
                if is_pax_header(&entry) {
                    continue;
                }
                if let Some(path) = normalize(&entry.path()?)? {
                    entries.push(ArchiveEntry {
                        path,
                        is_dir: entry.header().entry_type().is_dir(),
                    });
                }
            }
            Ok(entries)
        }
    }
}

/// The single top-level directory enclosing every entry, if there is one.
pub fn wrapper_dir(entries: &[ArchiveEntry]) -> Option<PathBuf> {
    let tops: BTreeSet<&std::ffi::OsStr> = entries
        .iter()
        .filter_map(|e| e.path.components().next())
        .map(|c| c.as_os_str())
        .collect();
    if tops.len() != 1 {
        return None;
    }
    let top = Path::new(*tops.iter().next()?);
    let is_directory = entries
        .iter()
        .any(|e| (e.is_dir && e.path == top) || e.path.components().count() > 1);
    is_directory.then(|| top.to_path_buf())
}

/// Extract `archive` into `dest`, stripping a wrapper directory if present.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let format = detect(archive)?;
    let entries = list(archive)?;
    let wrapper = wrapper_dir(&entries);
    match &wrapper {
        Some(dir) => debug!("Stripping wrapper directory {}", dir.display()),
        None => debug!("Extracting {} verbatim", archive.display()),
    }
    fs::create_dir_all(dest)?;

    let relocate = |path: &Path| -> Option<PathBuf> {
        let relative = match &wrapper {
            Some(dir) => path.strip_prefix(dir).ok()?.to_path_buf(),
            None => path.to_path_buf(),
        };
        (!relative.as_os_str().is_empty()).then(|| dest.join(relative))
    };

    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(fs::File::open(archive)?)?;
            for i in 0..zip.len() {
                let mut file = zip.by_index(i)?;
                let raw = file.enclosed_name().ok_or_else(|| unsafe_path(file.name()))?;
                let Some(target) = normalize(&raw)?.and_then(|p| relocate(&p)) else {
                    continue;
                };
                if file.is_dir() {
                    prepare_dir(&target)?;
                    continue;
                }
                prepare_file(&target)?;
                let mut out = fs::File::create(&target)?;
                io::copy(&mut file, &mut out)?;
                #[cfg(unix)]
                if let Some(mode) = file.unix_mode() {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
                }
            }
        }
        format => {
            let mut tar = open_tar(archive, format)?;
            for entry in tar.entries()? {
                let mut entry = entry?;
                if is_pax_header(&entry) {
                    continue;
                }
                let Some(target) = normalize(&entry.path()?)?.and_then(|p| relocate(&p)) else {
                    continue;
                };
                if entry.header().entry_type().is_dir() {
                    prepare_dir(&target)?;
                    continue;
                }
                prepare_file(&target)?;
                entry.unpack(&target)?;
            }
        }
    }
    Ok(())
}

fn open_tar(path: &Path, format: ArchiveFormat) -> Result<tar::Archive<Box<dyn Read>>> {
    let file = BufReader::new(fs::File::open(path)?);
    let reader: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
        _ => Box::new(file),
    };
    Ok(tar::Archive::new(reader))
}

/// pax headers that reach the entry stream as plain entries, such as the
/// `pax_global_header` written by `git archive` and GitHub tarballs.
fn is_pax_header<R: Read>(entry: &tar::Entry<'_, R>) -> bool {
    let kind = entry.header().entry_type();
    kind.is_pax_global_extensions() || kind.is_pax_local_extensions()
}

/// Drop `.` components and reject anything that could escape the
/// destination. Returns `None` for the archive root itself.
fn normalize(path: &Path) -> Result<Option<PathBuf>> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(unsafe_path(&path.to_string_lossy())),
        }
    }
    Ok((!out.as_os_str().is_empty()).then_some(out))
}

fn prepare_dir(target: &Path) -> Result<()> {
    if fs::symlink_metadata(target).is_ok_and(|m| !m.is_dir()) {
        remove_path(target)?;
    }
    fs::create_dir_all(target)?;
    Ok(())
}

fn prepare_file(target: &Path) -> Result<()> {
    remove_path(target)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn unsafe_path(name: &str) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("archive entry escapes the destination: {}", name),
    ))
}
