//! # CLI Command Implementations
//!
//! One module per subcommand of the `sitebuild` tool. Each contains an
//! `Args` struct derived with `clap` and an `execute` function calling into
//! the `sitebuild` library. The pipeline commands (`build`, `install`,
//! `db-install`) share their options and the plan/execute flow through
//! `run`.

pub mod build;
pub mod completions;
pub mod db_install;
pub mod install;
pub mod make;
pub mod run;
