//! Developer override redirection.
//!
//! An override directive `project[:path]` redirects every site link whose
//! basename is `project` to `path` instead of the canonical store. A missing
//! path defaults to the project name; relative paths are resolved against
//! the overrides base directory. Only the first `:` separates name and
//! path, so paths may contain colons themselves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Mapping from link basename to absolute link target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideMap {
    entries: BTreeMap<String, PathBuf>,
}

impl OverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `project[:path]` directives.
    ///
    /// Later directives for the same project replace earlier ones.
    pub fn parse_directives<S: AsRef<str>>(directives: &[S], base_dir: &Path) -> Result<Self> {
        let base_dir = std::path::absolute(base_dir)?;
        let mut map = Self::new();
        for directive in directives {
            let directive = directive.as_ref();
            let (name, path) = match directive.split_once(':') {
                Some((name, path)) => (name, path),
                None => (directive, directive),
            };
            if name.is_empty() || path.is_empty() {
                return Err(Error::ConfigParse {
                    message: format!("Invalid override '{}'", directive),
                    hint: Some("Use --override project or --override project:path".to_string()),
                });
            }
            let path = Path::new(path);
            let target = if path.is_absolute() {
                path.to_path_buf()
            } else {
                base_dir.join(path)
            };
            map.insert(name, target);
        }
        Ok(map)
    }

    pub fn insert(&mut self, name: &str, target: PathBuf) {
        self.entries.insert(name.to_string(), target);
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        let map = OverrideMap::parse_directives(&["campaignion"], Path::new("/home/dev/code")).unwrap();
        assert_eq!(
            map.get("campaignion"),
            Some(Path::new("/home/dev/code/campaignion"))
        );
    }

    #[test]
    fn test_parse_relative_and_absolute_paths() {
        let map = OverrideMap::parse_directives(
            &["views:forks/views", "webform:/opt/webform"],
            Path::new("/home/dev/code"),
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("views"), Some(Path::new("/home/dev/code/forks/views")));
        assert_eq!(map.get("webform"), Some(Path::new("/opt/webform")));
        assert_eq!(map.get("ctools"), None);
    }

    #[test]
    fn test_later_directive_wins() {
        let map = OverrideMap::parse_directives(&["views:/a", "views:/b"], Path::new("/")).unwrap();
        assert_eq!(map.get("views"), Some(Path::new("/b")));
    }

    #[test]
    fn test_path_keeps_later_colons() {
        let map = OverrideMap::parse_directives(
            &["views:/mnt/c:/views", "ctools:forks:ctools"],
            Path::new("/home/dev/code"),
        )
        .unwrap();
        assert_eq!(map.get("views"), Some(Path::new("/mnt/c:/views")));
        assert_eq!(map.get("ctools"), Some(Path::new("/home/dev/code/forks:ctools")));
    }

    #[test]
    fn test_invalid_directive() {
        assert!(OverrideMap::parse_directives(&[":/path"], Path::new("/")).is_err());
        assert!(OverrideMap::parse_directives(&["views:"], Path::new("/")).is_err());
    }
}
