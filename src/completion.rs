//! `uzdir completions <shell>`: completion scripts generated from the clap
//! definition, so every extract flag and subcommand stays in sync.

use std::path::Path;
use std::{fs, io};

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate, generate_to};

use crate::cli::{AppContext, Cli, CompletionsArgs};

const BIN_NAME: &str = "uzdir";

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    match args.out_dir {
        Some(dir) if !args.stdout => write_into(args.shell, &dir, ctx),
        _ => {
            io::Write::write_all(&mut io::stdout(), &script(args.shell))
                .context("Failed to write completion script")?;
            Ok(())
        }
    }
}

/// The full completion script for `shell`.
pub fn script(shell: Shell) -> Vec<u8> {
    let mut buf = Vec::new();
    generate(shell, &mut Cli::command(), BIN_NAME, &mut buf);
    buf
}

fn write_into(shell: Shell, dir: &Path, ctx: &AppContext) -> Result<()> {
    if ctx.dry_run {
        if !ctx.quiet {
            println!("Would write {shell} completion into {}", dir.display());
        }
        return Ok(());
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = generate_to(shell, &mut Cli::command(), BIN_NAME, dir)
        .with_context(|| format!("Failed to write {shell} completion"))?;

    if !ctx.quiet {
        println!("Wrote {shell} completion to {}", path.display());
    }
    Ok(())
}
