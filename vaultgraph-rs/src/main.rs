//! Vaultgraph CLI entry point.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vaultgraph::cli::args::{Cli, Commands};
use vaultgraph::cli::output::Output;
use vaultgraph::cli::{build, info, links, search};
use vaultgraph::error::VaultError;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let output = Output::new(cli.format, cli.quiet);
    match run(&cli, &output) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            output.error(&e.to_string());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Logs go to stderr so stdout stays machine readable.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env("VAULTGRAPH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, output: &Output) -> Result<i32, VaultError> {
    let (indexer, report) = vaultgraph::cli::open(cli)?;
    if !report.failures.is_empty() {
        tracing::warn!(failures = report.failures.len(), "some files could not be indexed");
    }
    let query = indexer.query();

    match &cli.command {
        Commands::Build(args) => build::build(&indexer, report, args, output),
        Commands::Watch => build::watch(indexer, output),

        Commands::Search(args) => search::search(&query, args, output),
        Commands::Tags(args) => search::tags(&query, args, output),
        Commands::Meta(args) => search::meta(&query, args, output),
        Commands::Dates(args) => search::dates(&query, args, output),
        Commands::Paths(args) => search::paths(&query, args, output),

        Commands::Links(args) => links::links(&query, args, output),
        Commands::Backlinks(args) => links::backlinks(&query, args, output),
        Commands::Orphans(args) => links::orphans(&query, args, output),
        Commands::Broken => links::broken(&query, output),
        Commands::Suggest(args) => links::suggest(&query, args, output),
        Commands::Export => links::export(&query, output),

        Commands::Stats(args) => info::stats(&indexer, args, output),
    }
}
