//! Vault scanning and incremental re-indexing.
//!
//! [`Indexer::build`] walks the vault, parses files on a bounded rayon pool
//! and upserts each note as soon as it is parsed. Links to notes that have
//! not been scanned yet resolve when those notes arrive, so insertion order
//! does not matter. [`Indexer::apply_change`] patches the index for one
//! filesystem change.

use crate::config::IndexConfig;
use crate::error::{ParseError, Result, VaultError};
use crate::index::{UpsertOutcome, VaultIndex};
use crate::note::{FileMeta, Note};
use crate::parser::NoteParser;
use crate::query::QueryEngine;
use crate::types::{path_text, NoteId};
use crate::vault::Vault;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

/// Folders never indexed.
pub const JUNK_FOLDERS: &[&str] = &[
    ".git",
    ".obsidian",
    ".trash",
    "node_modules",
    "target",
    "__pycache__",
    "venv",
];

/// Which paths in a vault hold notes.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    include_hidden: bool,
    extensions: Vec<String>,
    exclude: Vec<glob::Pattern>,
}

impl IgnoreRules {
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let exclude = config
            .exclude
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            include_hidden: config.include_hidden,
            extensions: config.extensions.clone(),
            exclude,
        })
    }

    /// Whether `relative` (a file or folder) and everything below it is
    /// skipped.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        for component in relative.components() {
            let name = component.as_os_str().to_string_lossy();
            if JUNK_FOLDERS.contains(&name.as_ref()) {
                return true;
            }
            if !self.include_hidden && name.starts_with('.') && name != "." && name != ".." {
                return true;
            }
        }
        let text = path_key(relative);
        self.exclude.iter().any(|p| p.matches(&text))
    }

    /// Whether `relative` is an indexable note file.
    pub fn accepts(&self, relative: &Path) -> bool {
        let has_extension = relative
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)));
        has_extension && !self.is_ignored(relative)
    }
}

/// Vault-relative path with `/` separators, as used in failure records.
pub fn path_key(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}

/// A file that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub path: String,
    pub reason: String,
}

/// Summary of a full scan.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub notes_indexed: usize,
    /// Sorted by path.
    pub failures: Vec<ParseFailure>,
    pub elapsed_ms: u64,
}

/// Summary of a [`Indexer::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub reindexed: usize,
    pub removed: usize,
    pub failed: usize,
    /// The index was rebuilt from scratch.
    pub rebuilt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

/// One filesystem change, with vault-relative paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    /// Previous path of a rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<PathBuf>,
}

impl ChangeEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self { kind: ChangeKind::Created, path: path.into(), old_path: None }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self { kind: ChangeKind::Modified, path: path.into(), old_path: None }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self { kind: ChangeKind::Deleted, path: path.into(), old_path: None }
    }

    pub fn renamed(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Renamed,
            path: to.into(),
            old_path: Some(from.into()),
        }
    }
}

/// What applying a [`ChangeEvent`] did to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ChangeOutcome {
    /// A note was inserted or replaced.
    Indexed(NoteId),
    /// The file content matched the indexed note.
    Unchanged(NoteId),
    /// Note(s) were removed from the index.
    Removed(Vec<NoteId>),
    /// Nothing to do: not a note, or the file vanished before it was read.
    Skipped,
    /// The file could not be parsed; the previous note is kept.
    Failed(String),
}

/// Owns a vault's index and keeps it in step with the files on disk.
pub struct Indexer {
    vault: Vault,
    config: Arc<IndexConfig>,
    parser: NoteParser,
    rules: IgnoreRules,
    index: VaultIndex,
    /// Failed incremental updates since the last full build.
    drift: AtomicUsize,
}

impl Indexer {
    /// An indexer over `root` with an empty index.
    pub fn new(root: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let vault = Vault::open(root)?;
        Ok(Self {
            parser: NoteParser::new(&config),
            rules: IgnoreRules::from_config(&config)?,
            index: VaultIndex::new(config.clone()),
            config: Arc::new(config),
            vault,
            drift: AtomicUsize::new(0),
        })
    }

    /// Scan the whole vault into a fresh index.
    pub fn build(root: impl AsRef<Path>, config: IndexConfig) -> Result<(Self, BuildReport)> {
        let indexer = Self::new(root, config)?;
        let report = indexer.scan()?;
        Ok((indexer, report))
    }

    pub fn index(&self) -> &VaultIndex {
        &self.index
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn rules(&self) -> &IgnoreRules {
        &self.rules
    }

    pub fn parser(&self) -> &NoteParser {
        &self.parser
    }

    /// A query engine over this indexer's index.
    pub fn query(&self) -> QueryEngine {
        QueryEngine::new(self.index.clone())
    }

    /// Failed incremental updates since the last full build.
    pub fn drift(&self) -> usize {
        self.drift.load(Ordering::Relaxed)
    }

    /// Every note file in the vault, sorted.
    pub fn note_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.discover(&self.vault.root)?.0)
    }

    /// Walk `dir` (absolute, inside the vault) for note files. Unreadable
    /// entries below the starting folder are reported, not fatal.
    fn discover(&self, dir: &Path) -> Result<(Vec<PathBuf>, Vec<ParseFailure>)> {
        let root = &self.vault.root;
        let relative_of = |path: &Path| path.strip_prefix(root).unwrap_or(path).to_path_buf();

        let mut files = Vec::new();
        let mut failures = Vec::new();
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.rules.is_ignored(&relative_of(e.path())));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => {
                    let path = err.path().map(|p| path_key(&relative_of(p))).unwrap_or_default();
                    tracing::warn!(path = %path, error = %err, "skipping unreadable entry");
                    failures.push(ParseFailure { path, reason: err.to_string() });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_of(entry.path());
            if self.rules.accepts(&relative) {
                files.push(relative);
            }
        }

        files.sort();
        Ok((files, failures))
    }

    /// Read and parse one vault-relative file.
    fn load(&self, relative: &Path) -> std::result::Result<Note, ParseError> {
        let (bytes, meta) = self.vault.read(relative)?;
        self.parser.parse(&bytes, relative, meta)
    }

    fn scan(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let (files, mut walk_failures) = self.discover(&self.vault.root)?;
        tracing::debug!(files = files.len(), "discovered note files");
        let files = self.drop_collisions(files, &mut walk_failures);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_count())
            .thread_name(|i| format!("vaultgraph-scan-{}", i))
            .build()?;

        let failures = Mutex::new(walk_failures);
        let indexed = AtomicUsize::new(0);
        let fatal: Mutex<Option<VaultError>> = Mutex::new(None);

        pool.install(|| {
            files.par_iter().for_each(|relative| {
                let key = path_key(relative);
                match self.load(relative) {
                    Ok(note) => match self.index.upsert(note) {
                        Ok(_) => {
                            indexed.fetch_add(1, Ordering::Relaxed);
                            self.index.clear_failure(&key);
                        }
                        Err(err @ VaultError::PathCollision { .. }) => {
                            let reason = err.to_string();
                            tracing::warn!(path = %key, error = %reason, "note id already taken");
                            self.index.record_failure(&key, reason.clone());
                            failures.lock().push(ParseFailure { path: key, reason });
                        }
                        Err(err) => {
                            fatal.lock().get_or_insert(err);
                        }
                    },
                    Err(err) => {
                        let reason = err.to_string();
                        tracing::warn!(path = %key, error = %reason, "failed to parse note");
                        self.index.record_failure(&key, reason.clone());
                        failures.lock().push(ParseFailure { path: key, reason });
                    }
                }
            });
        });

        if let Some(err) = fatal.into_inner() {
            return Err(err);
        }

        let mut failures = failures.into_inner();
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        let report = BuildReport {
            notes_indexed: indexed.into_inner(),
            failures,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            notes = report.notes_indexed,
            failures = report.failures.len(),
            elapsed_ms = report.elapsed_ms,
            "vault indexed"
        );
        Ok(report)
    }

    /// Keep one file per note id. Files whose paths fold to an id already
    /// taken by a lexicographically smaller path are reported as failures.
    fn drop_collisions(&self, files: Vec<PathBuf>, failures: &mut Vec<ParseFailure>) -> Vec<PathBuf> {
        let case = self.config.case_rule;
        let mut owners: BTreeMap<NoteId, (String, PathBuf)> = BTreeMap::new();
        let mut losers = Vec::new();

        for relative in files {
            let id = NoteId::from_path(&relative, case);
            let text = path_text(&relative);
            match owners.get_mut(&id) {
                Some(owner) if owner.0 <= text => losers.push((id, text, owner.0.clone(), relative)),
                Some(owner) => {
                    let (old_text, old_path) = std::mem::replace(owner, (text.clone(), relative));
                    losers.push((id, old_text, text, old_path));
                }
                None => {
                    owners.insert(id, (text, relative));
                }
            }
        }

        for (id, path, existing, relative) in losers {
            let key = path_key(&relative);
            let reason = VaultError::PathCollision {
                id: id.to_string(),
                path,
                existing,
            }
            .to_string();
            tracing::warn!(path = %key, error = %reason, "note id already taken");
            self.index.record_failure(&key, reason.clone());
            failures.push(ParseFailure { path: key, reason });
        }

        let mut kept: Vec<PathBuf> = owners.into_values().map(|(_, path)| path).collect();
        kept.sort();
        kept
    }

    /// Drop everything and scan the vault again.
    pub fn rebuild(&self) -> Result<BuildReport> {
        tracing::info!(root = %self.vault.root.display(), "rebuilding index");
        self.index.clear();
        self.drift.store(0, Ordering::Relaxed);
        self.scan()
    }

    /// Bring the index up to date with the disk without a full rebuild:
    /// re-parse files whose size or modification time changed and drop notes
    /// whose files are gone. Falls back to [`Indexer::rebuild`] once failed
    /// updates pass the drift threshold or the index fails verification.
    pub fn refresh(&self) -> Result<RefreshReport> {
        let drift = self.drift();
        let needs_rebuild = if drift > self.config.drift_threshold {
            tracing::warn!(drift, threshold = self.config.drift_threshold, "drift threshold exceeded");
            true
        } else if let Err(err) = self.index.verify() {
            tracing::warn!(error = %err, "index failed verification");
            true
        } else {
            false
        };

        if needs_rebuild {
            let report = self.rebuild()?;
            return Ok(RefreshReport {
                reindexed: report.notes_indexed,
                removed: 0,
                failed: report.failures.len(),
                rebuilt: true,
            });
        }

        let mut report = RefreshReport::default();
        let files = self.note_paths()?;
        let case = self.config.case_rule;
        let on_disk: BTreeSet<NoteId> = files.iter().map(|p| NoteId::from_path(p, case)).collect();

        for note in self.index.notes() {
            if !on_disk.contains(&note.id) && self.index.remove(&note.id)?.is_some() {
                report.removed += 1;
            }
        }

        for relative in &files {
            let id = NoteId::from_path(relative, case);
            if let Some(note) = self.index.get(&id) {
                if path_text(&note.path) != path_text(relative) {
                    // shadowed by a case-colliding sibling
                    continue;
                }
                let fresh = fs::metadata(self.vault.root.join(relative))
                    .map(|m| m.len() == note.size_bytes && FileMeta::from(&m).modified == note.modified)
                    .unwrap_or(false);
                if fresh {
                    continue;
                }
            }
            match self.reindex(relative)? {
                ChangeOutcome::Indexed(_) => report.reindexed += 1,
                ChangeOutcome::Failed(_) => report.failed += 1,
                _ => {}
            }
        }

        tracing::info!(
            reindexed = report.reindexed,
            removed = report.removed,
            failed = report.failed,
            "index refreshed"
        );
        Ok(report)
    }

    /// Patch the index for one filesystem change.
    ///
    /// A rename is applied as removal of the old path followed by indexing
    /// of the new one.
    pub fn apply_change(&self, event: &ChangeEvent) -> Result<ChangeOutcome> {
        tracing::debug!(kind = ?event.kind, path = %event.path.display(), "applying change");
        match event.kind {
            ChangeKind::Created | ChangeKind::Modified => self.reindex(&event.path),
            ChangeKind::Deleted => self.forget(&event.path),
            ChangeKind::Renamed => {
                let removed = match &event.old_path {
                    Some(old) => self.forget(old)?,
                    None => ChangeOutcome::Skipped,
                };
                match self.reindex(&event.path)? {
                    ChangeOutcome::Skipped => Ok(removed),
                    outcome => Ok(outcome),
                }
            }
        }
    }

    fn reindex(&self, relative: &Path) -> Result<ChangeOutcome> {
        let full = self.vault.resolve_path(relative)?;
        if full.is_dir() {
            return self.reindex_folder(&full);
        }
        if !self.rules.accepts(relative) {
            return Ok(ChangeOutcome::Skipped);
        }

        let key = path_key(relative);
        let note = match self.load(relative) {
            Ok(note) => note,
            Err(ParseError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %key, "file vanished before it was read");
                return Ok(ChangeOutcome::Skipped);
            }
            Err(err) => {
                let reason = err.to_string();
                let drift = self.drift.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(path = %key, error = %reason, drift, "failed to re-parse note");
                self.index.record_failure(&key, reason.clone());
                return Ok(ChangeOutcome::Failed(reason));
            }
        };

        let id = note.id.clone();
        let displaced = self
            .index
            .get(&id)
            .filter(|old| path_text(&old.path) != path_text(relative))
            .map(|old| (path_key(&old.path), path_text(&old.path)));

        let outcome = match self.index.upsert(note) {
            Ok(outcome) => outcome,
            Err(err @ VaultError::PathCollision { .. }) => {
                let reason = err.to_string();
                tracing::warn!(path = %key, error = %reason, "note id already taken");
                self.index.record_failure(&key, reason.clone());
                return Ok(ChangeOutcome::Failed(reason));
            }
            Err(err) => return Err(err),
        };
        self.index.clear_failure(&key);
        if let Some((old_key, old_path)) = displaced {
            let reason = VaultError::PathCollision {
                id: id.to_string(),
                path: old_path,
                existing: path_text(relative),
            }
            .to_string();
            tracing::warn!(path = %old_key, error = %reason, "note displaced by case-colliding path");
            self.index.record_failure(&old_key, reason);
        }

        match outcome {
            UpsertOutcome::Unchanged => Ok(ChangeOutcome::Unchanged(id)),
            _ => Ok(ChangeOutcome::Indexed(id)),
        }
    }

    /// Index every note below a folder that appeared in one event.
    fn reindex_folder(&self, full: &Path) -> Result<ChangeOutcome> {
        let (files, _) = self.discover(full)?;
        let mut last = ChangeOutcome::Skipped;
        for relative in files {
            last = self.reindex(&relative)?;
        }
        Ok(last)
    }

    /// After `id` lost its file, index a case-colliding sibling that was
    /// kept out while the id was taken.
    fn promote_sibling(&self, id: NoteId) -> Result<ChangeOutcome> {
        let sibling = {
            let snapshot = self.index.snapshot();
            snapshot
                .failures()
                .keys()
                .find(|path| snapshot.id_for(Path::new(path.as_str())) == id)
                .cloned()
        };
        let Some(sibling) = sibling else {
            return Ok(ChangeOutcome::Removed(vec![id]));
        };

        tracing::debug!(path = %sibling, note = %id, "indexing case-colliding sibling");
        match self.reindex(Path::new(&sibling))? {
            outcome @ (ChangeOutcome::Indexed(_) | ChangeOutcome::Unchanged(_)) => Ok(outcome),
            ChangeOutcome::Skipped => {
                self.index.clear_failure(&sibling);
                Ok(ChangeOutcome::Removed(vec![id]))
            }
            _ => Ok(ChangeOutcome::Removed(vec![id])),
        }
    }

    fn forget(&self, relative: &Path) -> Result<ChangeOutcome> {
        self.index.clear_failure(&path_key(relative));
        if let Some(note) = self.index.remove_path(relative)? {
            return self.promote_sibling(note.id.clone());
        }

        // a deleted folder takes its notes with it
        let prefix = {
            let snapshot = self.index.snapshot();
            let folder = snapshot.id_for(relative);
            format!("{}/", folder)
        };
        let doomed = self.index.snapshot().paths().with_prefix(&prefix);
        if doomed.is_empty() {
            return Ok(ChangeOutcome::Skipped);
        }
        let mut removed = Vec::with_capacity(doomed.len());
        for id in doomed {
            if self.index.remove(&id)?.is_some() {
                removed.push(id);
            }
        }
        Ok(ChangeOutcome::Removed(removed))
    }
}
