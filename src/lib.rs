//! # sitebuild
//!
//! This library assembles multi-site Drupal installations from independently
//! versioned projects. It is designed to be used by the `sitebuild`
//! command-line tool but can be embedded by anything that can hand it an
//! already-parsed configuration and a set of targets.
//!
//! ## Quick Example
//!
//! ```
//! use sitebuild::config;
//! use sitebuild::identity::ProjectIdentity;
//!
//! let identity: ProjectIdentity = "ckeditor-7.x-1.18+pr12".parse().unwrap();
//! assert_eq!(identity.name, "ckeditor");
//! assert_eq!(identity.release(), "ckeditor-7.x-1.18");
//!
//! let config = config::parse_json(r#"{
//!     "documentRoot": "htdocs",
//!     "projectsDir": "projects",
//!     "core": { "project": "drupal-7.59" }
//! }"#).unwrap();
//! assert_eq!(config.projects_dir, "projects");
//! ```
//!
//! ## Core Concepts
//!
//! - **Projects (`project`, `identity`)**: every project lives exactly once in
//!   a canonical store directory named after it, e.g. `views-7.x-3.18`.
//! - **Capability registries (`registry`)**: project, downloader and applier
//!   variants are selected from configuration records by ordered candidate
//!   lists.
//! - **Acquisition (`downloader`, `applier`)**: a downloader stages a source
//!   locally, an applier turns it into (part of) the project directory.
//! - **Targets (`target`)**: `build`, `install` and `db-install` expand to
//!   the projects they need.
//! - **Site trees (`phases::assemble`, `site`)**: sites are symlink farms
//!   pointing into the store, so two sites sharing a project share its
//!   files.
//!
//! ## Execution Flow
//!
//! The entry point is `phases::Resolver`:
//!
//! 1.  **Resolve**: turn targets into a dependency-ordered `BuildPlan`
//!     against a snapshot of the store. No I/O, so this doubles as dry run.
//! 2.  **Execute**: download sources (optionally in parallel), apply each
//!     project into a staging directory and commit it to the store.
//! 3.  **Assemble**: link bundled dependencies and site trees.

pub mod applier;
pub mod config;
pub mod defaults;
pub mod downloader;
pub mod error;
pub mod fsutil;
pub mod identity;
pub mod make;
pub mod overrides;
pub mod phases;
pub mod process;
pub mod project;
pub mod registry;
pub mod site;
pub mod store;
pub mod target;

#[cfg(test)]
mod identity_proptest;
