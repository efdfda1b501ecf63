//! # Error Handling
//!
//! This module defines the centralized error type for `sitebuild`. It uses
//! `thiserror` to derive a single `Error` enum covering every failure mode of
//! the resolution and assembly engine, plus a `Result<T>` alias used across
//! the library.
//!
//! The variants fall into two groups:
//!
//! - **Resolution-time errors** (`MalformedIdentity`, `NoMatchingVariant`,
//!   `AmbiguousVariant`, `DependencyCycle`, `UnknownProject`, `UnknownSite`,
//!   `ConfigParse`). These are raised while building the project graph or the
//!   plan and therefore never leave a partially mutated filesystem behind.
//!
//! - **Execution-time errors** (`ApplyFailed`, `PatchRejected`, `Command`,
//!   `Timeout`, `Network` and the wrapped I/O errors). These abort `execute`
//!   at the failing step; steps applied before it stay in place.

use thiserror::Error;

/// Main error type for sitebuild operations
#[derive(Error, Debug)]
pub enum Error {
    /// A project directory name could not be split into name, core tag and
    /// version.
    #[error("Malformed project identity '{dirname}': {reason}")]
    MalformedIdentity { dirname: String, reason: String },

    /// No candidate of a capability registry accepted the configuration.
    #[error("No {capability} variant matches configuration: {config}")]
    NoMatchingVariant { capability: String, config: String },

    /// More than one candidate accepted the configuration in strict mode.
    #[error("Ambiguous {capability} configuration, matching variants: {}", variants.join(", "))]
    AmbiguousVariant {
        capability: String,
        variants: Vec<String>,
    },

    /// A project transitively depends on itself.
    #[error("Dependency cycle detected: {path}")]
    DependencyCycle { path: String },

    /// A target or tree referenced a project that is not part of the graph.
    #[error("Unknown project: {dirname}")]
    UnknownProject { dirname: String },

    /// A target referenced a site that is not configured.
    #[error("Unknown site: {site}")]
    UnknownSite { site: String },

    /// The configuration tree could not be read or is inconsistent.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Materializing a project failed.
    #[error("Failed to apply {project}: {reason}")]
    ApplyFailed { project: String, reason: String },

    /// A unified diff did not apply cleanly.
    #[error("Patch rejected: {patch}: {stderr}")]
    PatchRejected { patch: String, stderr: String },

    /// An external tool exited with a non-zero status.
    #[error("Command failed ({status}): {command}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// An external tool ran past the configured timeout and was killed.
    #[error("Command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    /// An HTTP retrieval failed.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A directory walk error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A formatting error, wrapped from `std::fmt::Error`.
    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// A zip archive error, wrapped from `zip::result::ZipError`.
    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Wrap an execution-time error so that it names the failing project.
    ///
    /// `PatchRejected` and errors that already carry a project are passed
    /// through unchanged.
    pub fn for_project(self, project: &str) -> Self {
        match self {
            e @ (Error::PatchRejected { .. } | Error::ApplyFailed { .. }) => e,
            other => Error::ApplyFailed {
                project: project.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Whether this error can only be raised before any filesystem mutation.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedIdentity { .. }
                | Error::NoMatchingVariant { .. }
                | Error::AmbiguousVariant { .. }
                | Error::DependencyCycle { .. }
                | Error::UnknownProject { .. }
                | Error::UnknownSite { .. }
                | Error::ConfigParse { .. }
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
