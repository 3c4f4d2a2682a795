//! CLI command implementations.

pub mod args;
pub mod output;

pub mod build;
pub mod info;
pub mod links;
pub mod search;

pub use args::{Cli, Commands};
pub use output::Output;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::scanner::{BuildReport, Indexer};
use crate::vault::Vault;

/// Load the configuration the command line asks for: an explicit file, or
/// whatever is discovered for the vault.
pub fn load_config(cli: &Cli, vault: &Vault) -> Result<IndexConfig> {
    match &cli.config {
        Some(path) => IndexConfig::load(path),
        None => IndexConfig::discover(vault.root()),
    }
}

/// Open the vault named on the command line and index it.
pub fn open(cli: &Cli) -> Result<(Indexer, BuildReport)> {
    let vault = Vault::open(&cli.vault)?;
    let config = load_config(cli, &vault)?;
    Indexer::build(vault.root(), config)
}
