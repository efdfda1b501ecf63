//! Options shared by the commands that run the build pipeline
//!
//! `build`, `install` and `db-install` all load the configuration from the
//! source directory, turn the command line into `BuildOptions` and hand a
//! set of targets to the `Resolver`. Dry runs print the plan and the site
//! trees involved instead of executing anything.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use ptree::{print_tree, TreeItem};

use sitebuild::config::{self, Config, SiteTree};
use sitebuild::defaults::{self, EnvDefaults};
use sitebuild::overrides::OverrideMap;
use sitebuild::phases::{BuildMode, BuildOptions, Resolver, RunOutcome};
use sitebuild::target::Target;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Devel mode: keep .git directories and don't modify .info files
    #[arg(short, long)]
    pub devel: bool,

    /// Completely rebuild all projects (deletes local changes in the store)
    #[arg(short, long, conflicts_with = "update")]
    pub rebuild: bool,

    /// Rebuild projects whose configuration changed
    #[arg(short, long)]
    pub update: bool,

    /// Show the build plan and exit
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Redirect all symlinks named PROJECT to PATH (relative to --overrides-dir)
    #[arg(long = "override", value_name = "PROJECT[:PATH]")]
    pub overrides: Vec<String>,

    /// Directory containing project.json [default: $MOTOOLS/setups/$DTREE]
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Directory the sites are built in [default: $WWWDIR/$DTREE]
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<PathBuf>,

    /// Directory downloads are stored in [default: <install-dir>/downloads]
    #[arg(long, value_name = "DIR")]
    pub downloads_dir: Option<PathBuf>,

    /// Base directory for relative override paths [default: $HOME/code/drupal]
    #[arg(long, value_name = "DIR", env = defaults::DBUILD_OVERRIDES_DIR)]
    pub overrides_dir: Option<PathBuf>,

    /// Prefix prepended to database names by db-install
    #[arg(long, value_name = "PREFIX", env = defaults::DB_PREFIX)]
    pub db_prefix: Option<String>,

    /// URL called after installing to reset the opcode cache
    #[arg(long, value_name = "URL", env = defaults::OPCACHE_RESET_URL)]
    pub opcache_reset_url: Option<String>,

    /// Key appended to the cache reset URL. No reset without a key.
    #[arg(long, value_name = "KEY", env = defaults::OPCACHE_RESET_KEY)]
    pub opcache_reset_key: Option<String>,

    /// Number of parallel downloads (always 1 with --rebuild)
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    pub jobs: usize,

    /// Kill subprocesses and downloads after SECONDS
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl RunArgs {
    pub fn source_dir(&self, defaults: &EnvDefaults) -> PathBuf {
        self.source_dir
            .clone()
            .unwrap_or_else(|| defaults.source_dir())
    }

    /// Load the configuration from the source directory.
    pub fn load_config(&self, defaults: &EnvDefaults) -> Result<Config> {
        let source_dir = self.source_dir(defaults);
        let path = config::locate(&source_dir)?;
        config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    pub fn to_options(&self, defaults: &EnvDefaults) -> Result<BuildOptions> {
        let install_dir = self
            .install_dir
            .clone()
            .unwrap_or_else(|| defaults.install_dir());
        let mut options =
            BuildOptions::new(absolute(&install_dir)?, absolute(&self.source_dir(defaults))?);

        options.mode = if self.rebuild {
            BuildMode::Rebuild
        } else if self.update {
            BuildMode::Update
        } else {
            BuildMode::Default
        };
        options.dry_run = self.dry_run;
        options.devel = self.devel;
        options.jobs = self.jobs;
        options.command_timeout = self.timeout.map(Duration::from_secs);
        if let Some(downloads_dir) = &self.downloads_dir {
            options.download_dir = absolute(downloads_dir)?;
        }
        options.db_prefix = self.db_prefix.clone().or_else(|| defaults.db_prefix.clone());

        let overrides_dir = self
            .overrides_dir
            .clone()
            .unwrap_or_else(|| defaults.overrides_dir.clone());
        options.overrides = OverrideMap::parse_directives(&self.overrides, &overrides_dir)?;
        Ok(options)
    }

    /// Base URL and key for the cache reset, if a key is configured.
    pub fn opcache_reset(&self, defaults: &EnvDefaults) -> Option<(String, String)> {
        let key = self
            .opcache_reset_key
            .clone()
            .or_else(|| defaults.opcache_reset_key.clone())?;
        let url = self
            .opcache_reset_url
            .clone()
            .unwrap_or_else(|| defaults.opcache_reset_url.clone());
        Some((url, key))
    }
}

/// Load the configuration, plan the targets and execute them unless this is
/// a dry run.
pub fn run<F>(args: &RunArgs, make_targets: F) -> Result<RunOutcome>
where
    F: FnOnce(&Config) -> Result<Vec<Target>>,
{
    let start_time = Instant::now();
    let defaults = EnvDefaults::from_env();
    let config = args.load_config(&defaults)?;
    let options = args.to_options(&defaults)?;
    let targets = make_targets(&config)?;

    let resolver = Resolver::new(config, options)?;
    let outcome = resolver.run(&targets)?;

    match &outcome {
        RunOutcome::Planned(plan) => {
            println!("🔎 DRY RUN MODE - No changes will be made");
            println!();
            print!("{}", plan);
            let sites: BTreeSet<&str> =
                plan.targets.iter().filter_map(|t| t.site.as_deref()).collect();
            for site in sites {
                let site_config = resolver.config().site(site)?;
                println!();
                print_site_tree(site, &site_config.links)?;
            }
        }
        RunOutcome::Executed { report, .. } => {
            println!(
                "✅ Done in {:.2}s: {} projects built, {} up to date",
                start_time.elapsed().as_secs_f64(),
                report.built.len(),
                report.skipped.len()
            );
        }
    }
    Ok(outcome)
}

/// Print the link layout of a site.
pub fn print_site_tree(site: &str, tree: &SiteTree) -> Result<()> {
    let root = TreeNode::from_site_tree(site, tree);
    print_tree(&root).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn from_site_tree(label: &str, tree: &SiteTree) -> Self {
        match tree {
            SiteTree::Leaf(dirname) => TreeNode {
                label: format!("{} -> {}", label, dirname),
                children: vec![],
            },
            SiteTree::Composite(children) => TreeNode {
                label: label.to_string(),
                children: children
                    .iter()
                    .map(|(name, child)| Self::from_site_tree(name, child))
                    .collect(),
            },
        }
    }
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}

/// Anchor `path` at the current directory; external tools run elsewhere.
fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))
}

/// Current directory, for guessing the site.
pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to get current directory")
}
