//! Keeps a [`FileIndex`] in step with the disk.
//!
//! The OS watcher callback only translates notifications and queues them. A
//! single `index-writer` thread drains the queue and applies events (and their
//! follow-ups) in arrival order, so the index has exactly one writer.
//!
//! Rename halves reported separately by the OS are paired on the writer by
//! their tracker so a moved directory is re-keyed in one step. A source half
//! whose destination never shows up (moved out of the tree) becomes a removal
//! once the pairing window elapses.

use std::collections::VecDeque;
use std::path::Path;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::index::{FileIndex, IndexEvent};
use crate::path::TreePath;

/// How long an unpaired rename source waits for its destination.
const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("failed to spawn index writer: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WatchMsg {
    Event(IndexEvent),
    MovedFrom { tracker: usize, path: TreePath },
    MovedTo { tracker: usize, path: TreePath },
    /// The watcher lost track of the disk
    Lost(String),
}

/// Running watcher. Dropping it stops the watch and joins the writer.
pub struct FsWatcher {
    watcher: Option<RecommendedWatcher>,
    writer: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatcher")
            .field("running", &self.watcher.is_some())
            .finish()
    }
}

impl FsWatcher {
    /// Watch the index root recursively and start the writer thread.
    pub fn start(index: FileIndex) -> Result<Self, WatchError> {
        let (tx, rx) = flume::unbounded::<WatchMsg>();
        let root = index.root().to_path_buf();

        let callback_root = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let sent = match res {
                Ok(event) => {
                    if event.need_rescan() {
                        let _ = tx.send(WatchMsg::Lost("event queue overflowed".into()));
                    }
                    translate(&callback_root, &event)
                        .into_iter()
                        .try_for_each(|msg| tx.send(msg))
                }
                Err(e) => tx.send(WatchMsg::Lost(e.to_string())),
            };
            if sent.is_err() {
                tracing::debug!("index writer gone, dropping watch event");
            }
        })?;

        let writer_index = index.clone();
        let writer = std::thread::Builder::new()
            .name("index-writer".into())
            .spawn(move || run_writer(writer_index, rx))?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::info!(root = %root.display(), "watching served root");

        Ok(Self {
            watcher: Some(watcher),
            writer: Some(writer),
        })
    }

    /// Stop watching and wait for queued events to drain.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // dropping the watcher drops the only sender, which ends the writer loop
        drop(self.watcher.take());
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                tracing::error!("index writer panicked");
            }
        }
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Writer {
    index: FileIndex,
    pending: VecDeque<IndexEvent>,
    unpaired: Option<(usize, TreePath, Instant)>,
}

impl Writer {
    fn new(index: FileIndex) -> Self {
        Self {
            index,
            pending: VecDeque::new(),
            unpaired: None,
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.unpaired.as_ref().map(|(_, _, deadline)| *deadline)
    }

    fn flush_unpaired(&mut self) {
        if let Some((_, from, _)) = self.unpaired.take() {
            self.pending.push_back(IndexEvent::Removed(from));
        }
    }

    fn handle(&mut self, msg: WatchMsg) {
        match msg {
            WatchMsg::Event(event) => {
                self.flush_unpaired();
                self.pending.push_back(event);
            }
            WatchMsg::MovedFrom { tracker, path } => {
                self.flush_unpaired();
                self.unpaired = Some((tracker, path, Instant::now() + RENAME_PAIR_WINDOW));
            }
            WatchMsg::MovedTo { tracker, path } => match self.unpaired.take() {
                Some((from_tracker, from, _)) if from_tracker == tracker => {
                    self.pending
                        .push_back(IndexEvent::Renamed { from, to: path });
                }
                other => {
                    if let Some((_, from, _)) = other {
                        self.pending.push_back(IndexEvent::Removed(from));
                    }
                    self.pending.push_back(IndexEvent::Created(path));
                }
            },
            WatchMsg::Lost(reason) => self.index.mark_degraded(&reason),
        }
    }

    fn drain(&mut self) {
        while let Some(event) = self.pending.pop_front() {
            tracing::trace!(?event, "applying index event");
            let followups = self.index.apply(event);
            self.pending.extend(followups);
        }
    }
}

fn run_writer(index: FileIndex, rx: flume::Receiver<WatchMsg>) {
    tracing::debug!("index writer started");
    let mut writer = Writer::new(index);

    loop {
        let msg = match writer.deadline() {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(msg) => msg,
                Err(flume::RecvTimeoutError::Timeout) => {
                    writer.flush_unpaired();
                    writer.drain();
                    continue;
                }
                Err(flume::RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(msg) => msg,
                Err(_) => break,
            },
        };
        writer.handle(msg);
        if writer.deadline().is_none() {
            writer.drain();
        }
    }

    writer.flush_unpaired();
    writer.drain();
    tracing::debug!("index writer stopped");
}

/// Map one OS notification onto writer messages. Paths outside `root` are
/// dropped.
fn translate(root: &Path, event: &Event) -> Vec<WatchMsg> {
    let paths: Vec<TreePath> = event
        .paths
        .iter()
        .filter_map(|p| TreePath::from_disk(root, p).ok())
        .collect();
    let each = |f: fn(TreePath) -> IndexEvent| -> Vec<WatchMsg> {
        paths.iter().cloned().map(f).map(WatchMsg::Event).collect()
    };

    match &event.kind {
        EventKind::Create(_) => each(IndexEvent::Created),
        EventKind::Remove(_) => each(IndexEvent::Removed),
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.tracker()) {
            (RenameMode::Both, _) => match paths.as_slice() {
                [from, to] => vec![WatchMsg::Event(IndexEvent::Renamed {
                    from: from.clone(),
                    to: to.clone(),
                })],
                _ => each(IndexEvent::Modified),
            },
            (RenameMode::From, Some(tracker)) => paths
                .iter()
                .cloned()
                .map(|path| WatchMsg::MovedFrom { tracker, path })
                .collect(),
            (RenameMode::To, Some(tracker)) => paths
                .iter()
                .cloned()
                .map(|path| WatchMsg::MovedTo { tracker, path })
                .collect(),
            (RenameMode::From, None) => each(IndexEvent::Removed),
            (RenameMode::To, None) => each(IndexEvent::Created),
            // unknown half; stat decides whether the path is still there
            _ => each(IndexEvent::Modified),
        },
        EventKind::Modify(_) | EventKind::Any => each(IndexEvent::Modified),
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}
