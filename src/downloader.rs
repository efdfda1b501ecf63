//! # Downloaders
//!
//! A downloader stages the source of one build step on the local
//! filesystem. The variant is selected from the step configuration through
//! the capability registry:
//!
//! - **`ScmNoop`**: the source is a version-controlled checkout; the applier
//!   clones it itself, so nothing is staged and the source is passed through.
//! - **`Urllib`**: the step has a `url`; it is fetched into the download
//!   directory under its basename. A file that is already present is reused
//!   unless the download is forced.
//! - **`Local`**: the step has a local `path`; it is copied (never moved)
//!   into the download directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use url::Url;

use crate::config::StepConfig;
use crate::error::{Error, Result};
use crate::fsutil::{copy_dir, copy_file, remove_path};
use crate::registry::{Candidate, Registry};

/// Downloader variants, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloaderKind {
    ScmNoop,
    Urllib,
    Local,
}

impl Candidate for DownloaderKind {
    type Config = StepConfig;

    fn name(&self) -> &'static str {
        match self {
            DownloaderKind::ScmNoop => "scm",
            DownloaderKind::Urllib => "url",
            DownloaderKind::Local => "local",
        }
    }

    fn applies(&self, step: &StepConfig) -> bool {
        match self {
            DownloaderKind::ScmNoop => step.is_scm(),
            DownloaderKind::Urllib => step.url.is_some(),
            DownloaderKind::Local => step.path.is_some(),
        }
    }
}

/// The downloader registry.
pub fn registry() -> Registry<DownloaderKind> {
    Registry::new(
        "Downloader",
        vec![
            DownloaderKind::ScmNoop,
            DownloaderKind::Urllib,
            DownloaderKind::Local,
        ],
    )
}

/// Where and how sources are staged.
#[derive(Debug, Clone)]
pub struct DownloadContext<'a> {
    pub download_dir: &'a Path,
    /// Base directory for relative `path` sources.
    pub source_dir: &'a Path,
    /// Re-fetch even if the staged file already exists.
    pub force: bool,
    pub timeout: Option<Duration>,
}

/// One staged source.
#[derive(Debug, Clone)]
pub struct Downloader {
    kind: DownloaderKind,
    source: String,
    localpath: Option<PathBuf>,
}

impl Downloader {
    pub fn new(kind: DownloaderKind, step: &StepConfig) -> Result<Self> {
        let source = step.source().ok_or_else(|| Error::NoMatchingVariant {
            capability: "Downloader".to_string(),
            config: format!("{:?}", step),
        })?;
        Ok(Self {
            kind,
            source: source.to_string(),
            localpath: None,
        })
    }

    pub fn kind(&self) -> DownloaderKind {
        self.kind
    }

    /// Location of the staged artifact, set once `download` succeeded.
    pub fn localpath(&self) -> Option<&Path> {
        self.localpath.as_deref()
    }

    /// Stage the source and return its local path.
    pub fn download(&mut self, ctx: &DownloadContext<'_>) -> Result<PathBuf> {
        let path = match self.kind {
            DownloaderKind::ScmNoop => self.scm_source(ctx),
            DownloaderKind::Urllib => self.fetch_url(ctx)?,
            DownloaderKind::Local => self.copy_local(ctx)?,
        };
        self.localpath = Some(path.clone());
        Ok(path)
    }

    fn scm_source(&self, ctx: &DownloadContext<'_>) -> PathBuf {
        // Remote URLs are handed to git as they are, local repositories are
        // resolved like any other local source.
        if self.source.contains("://") || self.source.contains('@') {
            PathBuf::from(&self.source)
        } else {
            resolve_local(ctx.source_dir, &self.source)
        }
    }

    fn fetch_url(&self, ctx: &DownloadContext<'_>) -> Result<PathBuf> {
        let url = Url::parse(&self.source)?;
        let staged = ctx.download_dir.join(url_basename(&url)?);

        if staged.exists() && !ctx.force {
            debug!("Using previously downloaded {}", staged.display());
            return Ok(staged);
        }
        fs::create_dir_all(ctx.download_dir)?;

        match url.scheme() {
            "file" => {
                let source = url.to_file_path().map_err(|_| Error::Network {
                    url: self.source.clone(),
                    message: "not a local file URL".to_string(),
                })?;
                info!("Copying {}", source.display());
                copy_file(&source, &staged)?;
            }
            "http" | "https" => {
                info!("Downloading {}", self.source);
                http_get_to(&self.source, &staged, ctx.timeout)?;
            }
            other => {
                return Err(Error::Network {
                    url: self.source.clone(),
                    message: format!("unsupported URL scheme '{}'", other),
                })
            }
        }
        Ok(staged)
    }

    fn copy_local(&self, ctx: &DownloadContext<'_>) -> Result<PathBuf> {
        let source = resolve_local(ctx.source_dir, &self.source);
        let name = source.file_name().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("local source has no file name: {}", source.display()),
            ))
        })?;
        let staged = ctx.download_dir.join(name);

        if source.is_dir() {
            remove_path(&staged)?;
            copy_dir(&source, &staged)?;
        } else if source.is_file() {
            copy_file(&source, &staged)?;
        } else {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("local source not found: {}", source.display()),
            )));
        }
        debug!("Staged {} as {}", source.display(), staged.display());
        Ok(staged)
    }
}

fn resolve_local(source_dir: &Path, source: &str) -> PathBuf {
    let path = Path::new(source);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        source_dir.join(path)
    }
}

/// Last non-empty path segment of a URL, falling back to the host.
fn url_basename(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .or_else(|| url.host_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Network {
            url: url.to_string(),
            message: "cannot derive a file name from the URL".to_string(),
        })
}

/// Blocking HTTP client honouring the run's timeout.
pub(crate) fn http_client(timeout: Option<Duration>) -> reqwest::Result<reqwest::blocking::Client> {
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(concat!("sitebuild/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Fetch `url` into `dest` via a `.part` file renamed on success.
fn http_get_to(url: &str, dest: &Path, timeout: Option<Duration>) -> Result<()> {
    let network = |e: reqwest::Error| Error::Network {
        url: url.to_string(),
        message: e.to_string(),
    };
    let client = http_client(timeout).map_err(network)?;
    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(network)?;

    let mut partial = dest.as_os_str().to_os_string();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    let mut file = fs::File::create(&partial)?;
    if let Err(e) = response.copy_to(&mut file) {
        drop(file);
        remove_path(&partial)?;
        return Err(network(e));
    }
    drop(file);
    fs::rename(&partial, dest)?;
    Ok(())
}
