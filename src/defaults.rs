//! Default values taken from the environment.
//!
//! The path options of every command default to values derived from a small
//! set of environment variables, so a machine only has to export them once:
//!
//! | Variable | Default |
//! |---|---|
//! | `WWWDIR` | `/var/www` |
//! | `MOTOOLS` | `/var/www/projects/motools` |
//! | `DTREE` | `drupal7` |
//! | `DB_PREFIX` | unset |
//! | `OPCACHE_RESET_URL` | `http://localhost/reset.php?key=` |
//! | `OPCACHE_RESET_KEY` | unset |
//! | `DBUILD_OVERRIDES_DIR` | `$HOME/code/drupal` |
//!
//! The source directory defaults to `$MOTOOLS/setups/$DTREE` and the install
//! directory to `$WWWDIR/$DTREE`.

use std::path::PathBuf;

pub const WWWDIR: &str = "WWWDIR";
pub const MOTOOLS: &str = "MOTOOLS";
pub const DTREE: &str = "DTREE";
pub const DB_PREFIX: &str = "DB_PREFIX";
pub const OPCACHE_RESET_URL: &str = "OPCACHE_RESET_URL";
pub const OPCACHE_RESET_KEY: &str = "OPCACHE_RESET_KEY";
pub const DBUILD_OVERRIDES_DIR: &str = "DBUILD_OVERRIDES_DIR";

pub const DEFAULT_OPCACHE_RESET_URL: &str = "http://localhost/reset.php?key=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvDefaults {
    pub www_dir: PathBuf,
    pub motools: PathBuf,
    pub dtree: String,
    pub db_prefix: Option<String>,
    pub opcache_reset_url: String,
    pub opcache_reset_key: Option<String>,
    pub overrides_dir: PathBuf,
}

impl EnvDefaults {
    /// Read the defaults from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the defaults through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());
        Self {
            www_dir: var(WWWDIR).map_or_else(|| PathBuf::from("/var/www"), PathBuf::from),
            motools: var(MOTOOLS)
                .map_or_else(|| PathBuf::from("/var/www/projects/motools"), PathBuf::from),
            dtree: var(DTREE).unwrap_or_else(|| "drupal7".to_string()),
            db_prefix: var(DB_PREFIX),
            opcache_reset_url: var(OPCACHE_RESET_URL)
                .unwrap_or_else(|| DEFAULT_OPCACHE_RESET_URL.to_string()),
            opcache_reset_key: var(OPCACHE_RESET_KEY),
            overrides_dir: var(DBUILD_OVERRIDES_DIR)
                .map_or_else(default_overrides_dir, PathBuf::from),
        }
    }

    /// `$MOTOOLS/setups/$DTREE`
    pub fn source_dir(&self) -> PathBuf {
        self.motools.join("setups").join(&self.dtree)
    }

    /// `$WWWDIR/$DTREE`
    pub fn install_dir(&self) -> PathBuf {
        self.www_dir.join(&self.dtree)
    }
}

impl Default for EnvDefaults {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn default_overrides_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("code")
        .join("drupal")
}
