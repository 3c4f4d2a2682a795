//! Vault statistics command.

use crate::cli::args::StatsArgs;
use crate::cli::output::Output;
use crate::error::{exit_code, Result};
use crate::query::{MissingFields, VaultStats};
use crate::scanner::Indexer;
use serde::Serialize;
use std::path::PathBuf;

/// Output for the stats command.
#[derive(Debug, Serialize)]
pub struct StatsOutput {
    pub vault: PathBuf,
    #[serde(flatten)]
    pub stats: VaultStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Vec<MissingFields>>,
}

pub fn stats(indexer: &Indexer, args: &StatsArgs, output: &Output) -> Result<i32> {
    let query = indexer.query();
    output.print(&StatsOutput {
        vault: indexer.vault().root().to_path_buf(),
        stats: query.stats(),
        missing_fields: args.missing_fields.then(|| query.missing_required_fields()),
    })?;
    Ok(exit_code::SUCCESS)
}
