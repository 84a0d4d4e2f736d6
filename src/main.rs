use anyhow::Result;
use clap::Parser;
use uzdir::cli::{Cli, Commands};
use uzdir::infra::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = cli.context();

    // Extract installs its own subscriber once the output root is known
    if !matches!(cli.command, Commands::Extract(_)) {
        logging::init(ctx.verbose, !ctx.no_color, None, None)?;
    }

    match cli.command {
        Commands::Extract(args) => uzdir::core::extract_run(args, &ctx),
        Commands::PasswordMap(args) => uzdir::core::password::write_map(args, &ctx),
        Commands::Init(args) => uzdir::infra::config::init(args, &ctx),
        Commands::Completions(args) => uzdir::completion::run(args, &ctx),
    }
}
