//! gem-compiler CLI - build native extensions and repackage gems

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gem_compiler::util::shell::{ColorChoice, Shell};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose > 1 {
        EnvFilter::new("gem_compiler=debug")
    } else {
        EnvFilter::new("gem_compiler=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        cli.color
    };
    let shell = Arc::new(Shell::from_flags(cli.quiet, cli.verbose, color));

    // Execute command
    match cli.command {
        Commands::Compile(args) => commands::compile::execute(args, &shell),
        Commands::Host(args) => commands::host::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
