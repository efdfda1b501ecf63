//! # Completions Command Implementation
//!
//! Writes a shell completion script for `sitebuild` to stdout.
//!
//! ```bash
//! sitebuild completions bash > ~/.local/share/bash-completion/completions/sitebuild
//! sitebuild completions zsh > ~/.zfunc/_sitebuild
//! ```

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn execute(args: CompletionsArgs) -> Result<()> {
    write_completions(args.shell, &mut io::stdout())
}

fn write_completions<W: Write>(shell: Shell, out: &mut W) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "sitebuild", out);
    Ok(())
}
