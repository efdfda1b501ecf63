//! # Project Identity Parsing
//!
//! Canonical project directory names have the shape
//! `name-coreTag-version[+patch1+patch2...]`, e.g. `views-7.x-3.18` or
//! `campaignion-7.x-1.5+pr32`. The core tag is always of the form `N.x`.
//!
//! The boundary between name and core tag is the first `-N.x-` segment that
//! is followed by a valid version token. A version token starts with a digit
//! and is never decomposed further, so `1.x-dev` and `1.0-rc1` stay intact.
//! Names that only look like they carry a version (`sentry-php-1.6.2`) have
//! no core tag and are rejected.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Parsed form of a canonical project directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectIdentity {
    pub name: String,
    pub core_tag: String,
    pub version: String,
    /// Patch labels in source order.
    pub patches: Vec<String>,
}

fn boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-(\d+\.x)-").expect("static regex"))
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d[0-9A-Za-z._-]*$").expect("static regex"))
}

fn label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Za-z._-]+$").expect("static regex"))
}

impl ProjectIdentity {
    /// Parse a canonical directory name.
    pub fn parse(dirname: &str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedIdentity {
            dirname: dirname.to_string(),
            reason: reason.to_string(),
        };

        let re = boundary_regex();
        let mut start = 0;
        let mut saw_boundary = false;
        while let Some(caps) = re.captures_at(dirname, start) {
            let whole = caps.get(0).expect("group 0 always matches");
            let core = caps.get(1).expect("group 1 is not optional");
            start = whole.start() + 1;
            saw_boundary = true;

            let name = &dirname[..whole.start()];
            if name.is_empty() || name.contains('+') {
                continue;
            }

            let rest = &dirname[whole.end()..];
            let mut parts = rest.split('+');
            let version = parts.next().unwrap_or_default();
            if !version_regex().is_match(version) {
                continue;
            }

            let patches: Vec<String> = parts.map(str::to_string).collect();
            if let Some(bad) = patches.iter().find(|p| !label_regex().is_match(p)) {
                return Err(malformed(&format!("invalid patch label '{}'", bad)));
            }

            return Ok(Self {
                name: name.to_string(),
                core_tag: core.as_str().to_string(),
                version: version.to_string(),
                patches,
            });
        }

        if saw_boundary {
            Err(malformed("no version token after the core tag"))
        } else {
            Err(malformed("missing '-<N>.x-' core tag segment"))
        }
    }

    /// `name-coreTag-version` without patch labels.
    ///
    /// This is the name release archives are published under.
    pub fn release(&self) -> String {
        format!("{}-{}-{}", self.name, self.core_tag, self.version)
    }

    /// `coreTag-version`, as written into drupal `.info` files.
    pub fn full_version(&self) -> String {
        format!("{}-{}", self.core_tag, self.version)
    }

    /// Whether the version refers to a development snapshot.
    pub fn is_dev(&self) -> bool {
        self.version.ends_with("-dev")
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.release())?;
        for patch in &self.patches {
            write!(f, "+{}", patch)?;
        }
        Ok(())
    }
}

impl FromStr for ProjectIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(s: &str) -> (String, String, String, Vec<String>) {
        let id = ProjectIdentity::parse(s).unwrap();
        (id.name, id.core_tag, id.version, id.patches)
    }

    #[test]
    fn test_parse_with_patch_label() {
        assert_eq!(
            split("campaignion-7.x-1.5+pr32"),
            (
                "campaignion".to_string(),
                "7.x".to_string(),
                "1.5".to_string(),
                vec!["pr32".to_string()]
            )
        );
    }

    #[test]
    fn test_parse_release_candidate() {
        let (name, core, version, patches) = split("campaignion-7.x-1.0-rc1");
        assert_eq!(name, "campaignion");
        assert_eq!(core, "7.x");
        assert_eq!(version, "1.0-rc1");
        assert!(patches.is_empty());
    }

    #[test]
    fn test_parse_dev_snapshot() {
        let id = ProjectIdentity::parse("campaignion-7.x-1.x-dev").unwrap();
        assert_eq!(id.version, "1.x-dev");
        assert!(id.patches.is_empty());
        assert!(id.is_dev());
    }

    #[test]
    fn test_parse_multiple_patches_keep_order() {
        let id = ProjectIdentity::parse("webform-7.x-4.16+p2+p1+hotfix").unwrap();
        assert_eq!(id.patches, vec!["p2", "p1", "hotfix"]);
        assert_eq!(id.to_string(), "webform-7.x-4.16+p2+p1+hotfix");
    }

    #[test]
    fn test_parse_hyphenated_name() {
        let id = ProjectIdentity::parse("entity-reference-7.x-1.5").unwrap();
        assert_eq!(id.name, "entity-reference");
        assert_eq!(id.version, "1.5");
    }

    #[test]
    fn test_parse_rejects_missing_core_tag() {
        let err = ProjectIdentity::parse("sentry-php-1.6.2").unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity { .. }));
    }

    #[test]
    fn test_parse_rejects_plain_names() {
        assert!(ProjectIdentity::parse("testitt").is_err());
        assert!(ProjectIdentity::parse("").is_err());
        assert!(ProjectIdentity::parse("-7.x-1.0").is_err());
        assert!(ProjectIdentity::parse("views-7.x-").is_err());
        assert!(ProjectIdentity::parse("views-7.x-1.0+").is_err());
    }

    #[test]
    fn test_parse_skips_embedded_core_tag_without_version() {
        // "-2.x-" is followed by "helper", which is not a version token, so
        // the next boundary is the real one.
        let id = ProjectIdentity::parse("compat-2.x-helper-7.x-1.0").unwrap();
        assert_eq!(id.name, "compat-2.x-helper");
        assert_eq!(id.core_tag, "7.x");
        assert_eq!(id.version, "1.0");
    }

    #[test]
    fn test_parse_first_valid_boundary_wins() {
        let id = ProjectIdentity::parse("foo-7.x-1.x-7.x-2.0").unwrap();
        assert_eq!(id.name, "foo");
        assert_eq!(id.core_tag, "7.x");
        assert_eq!(id.version, "1.x-7.x-2.0");
    }

    #[test]
    fn test_release_and_full_version() {
        let id: ProjectIdentity = "ckeditor-7.x-1.18+pr12".parse().unwrap();
        assert_eq!(id.release(), "ckeditor-7.x-1.18");
        assert_eq!(id.full_version(), "7.x-1.18");
    }
}
