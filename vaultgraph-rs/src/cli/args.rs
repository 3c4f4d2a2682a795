//! CLI argument definitions using clap.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vaultgraph")]
#[command(author, version, about = "Index and query an Obsidian-style vault", long_about = None)]
pub struct Cli {
    /// Path to the vault root
    #[arg(long, global = true, env = "VAULTGRAPH_VAULT", default_value = ".")]
    pub vault: PathBuf,

    /// Configuration file (default: discovered from the vault, then the
    /// user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `vaultgraph=debug` (default: $VAULTGRAPH_LOG, then `warn`)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Suppress error messages on stderr
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the vault and report what was indexed
    Build(BuildArgs),

    /// Full-text search of note bodies
    Search(SearchArgs),

    /// Query notes by tag expression, or list tags with counts
    Tags(TagsArgs),

    /// Query front matter with a path expression
    Meta(MetaArgs),

    /// Notes whose date field falls in a range
    Dates(DatesArgs),

    /// Notes under a folder or matching a path glob
    Paths(PathsArgs),

    /// Outgoing links of a note
    Links(NoteArgs),

    /// Notes linking to a note
    Backlinks(NoteArgs),

    /// Notes with no links in or out
    Orphans(OrphansArgs),

    /// Links that resolve to no note
    Broken,

    /// Repair candidates for broken links
    Suggest(SuggestArgs),

    /// Export the link graph as an edge list
    Export,

    /// Vault statistics
    Stats(StatsArgs),

    /// Keep the index current and report each applied change
    Watch,
}

// === Build ===

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Also run the full index consistency check
    #[arg(long)]
    pub verify: bool,
}

// === Search ===

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text to look for
    pub pattern: String,

    /// Treat the pattern as a regular expression
    #[arg(short = 'e', long)]
    pub regex: bool,

    /// Match case exactly
    #[arg(short = 's', long)]
    pub case_sensitive: bool,

    /// Only search notes under this folder
    #[arg(long)]
    pub scope: Option<String>,

    /// Limit number of notes returned
    #[arg(long)]
    pub limit: Option<usize>,
}

// === Tags ===

#[derive(Args, Debug)]
pub struct TagsArgs {
    /// Tag expression, e.g. `proj/* AND NOT draft` (omit to list all tags)
    pub expr: Option<String>,

    /// Bare tags also match their descendants
    #[arg(long)]
    pub hierarchical: bool,
}

// === Meta ===

#[derive(Args, Debug)]
pub struct MetaArgs {
    /// Path expression, e.g. `$.status == 'done'` or `authors[*].name`
    pub expr: String,
}

// === Dates ===

#[derive(Args, Debug)]
pub struct DatesArgs {
    /// Front matter field to read
    pub field: String,

    /// First day of the range (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day of the range (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

// === Paths ===

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct PathsArgs {
    /// Notes inside this folder, at any depth
    #[arg(long)]
    pub folder: Option<String>,

    /// Notes whose path matches this glob
    #[arg(long)]
    pub glob: Option<String>,
}

// === Links ===

#[derive(Args, Debug)]
pub struct NoteArgs {
    /// Note path, id, or link text
    pub note: String,
}

#[derive(Args, Debug)]
pub struct OrphansArgs {
    /// Extra tags that mark entry points (added to the configured ones)
    #[arg(long = "exempt-tag")]
    pub exempt_tags: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    /// Note the link is written in (omit to cover every broken link)
    #[arg(requires = "target")]
    pub note: Option<String>,

    /// Link target as written
    pub target: Option<String>,

    /// Candidates per link
    #[arg(long, default_value_t = 5)]
    pub limit: usize,
}

// === Stats ===

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Also report notes missing configured required fields
    #[arg(long)]
    pub missing_fields: bool,
}
