//! Filesystem change feed.
//!
//! [`FsWatcher`] turns `notify` events into [`ChangeEvent`]s on a bounded
//! channel; a full channel blocks the watcher thread instead of dropping
//! events. [`Dispatcher`] drains the channel and applies each event to the
//! index. Events for one path always reach the same worker, so they are
//! applied in the order they were observed.

use crate::error::{Result, VaultError};
use crate::scanner::{path_key, ChangeEvent, ChangeKind, ChangeOutcome, IgnoreRules, Indexer};
use flume::{Receiver, Sender};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A bounded channel of change events.
pub struct ChangeFeed {
    sender: Sender<ChangeEvent>,
    receiver: Receiver<ChangeEvent>,
}

impl ChangeFeed {
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = flume::bounded(capacity.max(1));
        Self { sender, receiver }
    }

    pub fn sender(&self) -> Sender<ChangeEvent> {
        self.sender.clone()
    }

    pub fn split(self) -> (Sender<ChangeEvent>, Receiver<ChangeEvent>) {
        (self.sender, self.receiver)
    }
}

/// Watches a vault folder and feeds change events into a channel.
///
/// Dropping the watcher stops the notifications and releases its sender.
pub struct FsWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    pub fn start(root: &Path, rules: IgnoreRules, sender: Sender<ChangeEvent>) -> Result<Self> {
        let root = root.canonicalize()?;
        let handler_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate(&event, &handler_root, &rules) {
                    if sender.send(change).is_err() {
                        tracing::warn!("change feed closed, dropping filesystem event");
                        return;
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "watch error"),
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        tracing::info!(root = %root.display(), "watching vault");
        Ok(Self {
            root,
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Map one `notify` event to vault change events, dropping paths outside
/// the vault or excluded by `rules`.
pub fn translate(event: &Event, root: &Path, rules: &IgnoreRules) -> Vec<ChangeEvent> {
    // folders pass through so whole-folder moves and deletes are seen
    let relevant = |path: &Path| -> Option<PathBuf> {
        let relative = path.strip_prefix(root).ok()?;
        if relative.as_os_str().is_empty() || rules.is_ignored(relative) {
            return None;
        }
        let candidate = rules.accepts(relative) || relative.extension().is_none() || path.is_dir();
        candidate.then(|| relative.to_path_buf())
    };
    let each = |make: fn(PathBuf) -> ChangeEvent| -> Vec<ChangeEvent> {
        event.paths.iter().filter_map(|p| relevant(p)).map(make).collect()
    };

    match &event.kind {
        EventKind::Create(_) => each(|p| ChangeEvent::created(p)),
        EventKind::Remove(_) => each(|p| ChangeEvent::deleted(p)),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            match (relevant(&event.paths[0]), relevant(&event.paths[1])) {
                (Some(from), Some(to)) => vec![ChangeEvent::renamed(from, to)],
                (Some(from), None) => vec![ChangeEvent::deleted(from)],
                (None, Some(to)) => vec![ChangeEvent::created(to)],
                (None, None) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(|p| ChangeEvent::deleted(p)),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(|p| ChangeEvent::created(p)),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter_map(|p| relevant(p).map(|rel| (p.exists(), rel)))
            .map(|(exists, rel)| {
                if exists {
                    ChangeEvent::created(rel)
                } else {
                    ChangeEvent::deleted(rel)
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => each(|p| ChangeEvent::modified(p)),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// An applied change, reported on the dispatcher's outcome channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applied {
    pub event: ChangeEvent,
    pub outcome: ChangeOutcome,
}

/// Applies change events to an indexer on a pool of path-sharded workers.
pub struct Dispatcher {
    router: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the router and `shards` worker threads. They stop once every
    /// sender of `events` is dropped and the queue is drained.
    pub fn spawn(
        indexer: Arc<Indexer>,
        events: Receiver<ChangeEvent>,
        shards: usize,
        outcomes: Option<Sender<Applied>>,
    ) -> Result<Self> {
        let shards = shards.max(1);
        let capacity = indexer.config().watch_capacity.max(1);

        let mut lanes = Vec::with_capacity(shards);
        let mut workers = Vec::with_capacity(shards);
        for shard in 0..shards {
            let (tx, rx) = flume::bounded::<ChangeEvent>(capacity);
            let indexer = Arc::clone(&indexer);
            let outcomes = outcomes.clone();
            let handle = thread::Builder::new()
                .name(format!("vaultgraph-watch-{}", shard))
                .spawn(move || run_worker(&indexer, rx, outcomes))?;
            lanes.push(tx);
            workers.push(handle);
        }

        let router = thread::Builder::new()
            .name("vaultgraph-router".to_string())
            .spawn(move || {
                'feed: for event in events.iter() {
                    for (lane, event) in route(event, lanes.len()) {
                        if lanes[lane].send(event).is_err() {
                            tracing::warn!("dispatcher worker stopped, dropping change events");
                            break 'feed;
                        }
                    }
                }
                tracing::debug!("change feed closed, stopping dispatcher");
            })?;

        Ok(Self { router, workers })
    }

    /// Wait for the router and every worker to finish.
    pub fn join(self) -> Result<()> {
        let mut panicked = self.router.join().is_err();
        for worker in self.workers {
            panicked |= worker.join().is_err();
        }
        if panicked {
            return Err(VaultError::Io(io::Error::other("dispatcher thread panicked")));
        }
        Ok(())
    }
}

/// Paths differing only in case share a lane, since they may share a note id.
fn shard_of(path: &Path, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    path_key(path).to_lowercase().hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

/// Lanes an event is applied on. A rename whose paths hash to different
/// lanes is split into a deletion on the old path's lane and a creation on
/// the new path's lane, so later events for either path queue behind it.
fn route(event: ChangeEvent, shards: usize) -> Vec<(usize, ChangeEvent)> {
    let lane = shard_of(&event.path, shards);
    match &event.old_path {
        Some(old) if event.kind == ChangeKind::Renamed && shard_of(old, shards) != lane => {
            vec![
                (shard_of(old, shards), ChangeEvent::deleted(old.clone())),
                (lane, ChangeEvent::created(event.path.clone())),
            ]
        }
        _ => vec![(lane, event)],
    }
}

fn run_worker(indexer: &Indexer, events: Receiver<ChangeEvent>, outcomes: Option<Sender<Applied>>) {
    for event in events.iter() {
        match indexer.apply_change(&event) {
            Ok(outcome) => {
                tracing::debug!(path = %event.path.display(), ?outcome, "change applied");
                if let Some(tx) = &outcomes {
                    // a dropped receiver only means nobody is listening
                    let _ = tx.send(Applied { event, outcome });
                }
            }
            Err(err) => {
                tracing::warn!(path = %event.path.display(), error = %err, "change rejected");
            }
        }
    }
}

/// A running watcher with its dispatcher.
pub struct WatchSession {
    watcher: FsWatcher,
    dispatcher: Dispatcher,
}

impl WatchSession {
    /// Watch the indexer's vault and apply changes as they arrive, using the
    /// configured channel capacity and shard count.
    pub fn start(indexer: Arc<Indexer>, outcomes: Option<Sender<Applied>>) -> Result<Self> {
        let feed = ChangeFeed::bounded(indexer.config().watch_capacity);
        let (sender, receiver) = feed.split();
        let shards = indexer.config().watch_shards;
        let watcher = FsWatcher::start(indexer.vault().root(), indexer.rules().clone(), sender)?;
        let dispatcher = Dispatcher::spawn(indexer, receiver, shards, outcomes)?;
        Ok(Self { watcher, dispatcher })
    }

    pub fn root(&self) -> &Path {
        self.watcher.root()
    }

    /// Stop watching, apply the events already queued, and wait.
    pub fn stop(self) -> Result<()> {
        drop(self.watcher);
        self.dispatcher.join()
    }
}
