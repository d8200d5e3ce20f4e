//! Raw change notifications for a git directory
//!
//! A `notify` watcher observes the git directory recursively and forwards
//! every relevant event into an async channel. Nothing is coalesced here;
//! the coordinator's debounce timer takes care of bursts.

use crate::artifacts::watch::error::WatchError;
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

pub type Notification = Result<ChangeEvent, notify::Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Modify,
    Remove,
    Rename,
}

impl ChangeKind {
    /// Kind of change an event represents, if it changes anything at all
    pub fn from_event_kind(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
            EventKind::Modify(_) => Some(ChangeKind::Modify),
            EventKind::Remove(_) => Some(ChangeKind::Remove),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub paths: Vec<PathBuf>,
}

/// Keeps the underlying watcher alive; dropping it stops notifications
pub struct ChangeNotifier {
    _watcher: RecommendedWatcher,
}

impl ChangeNotifier {
    pub fn watch(root: &Path) -> Result<(Self, UnboundedReceiver<Notification>), WatchError> {
        let (tx, rx) = unbounded_channel();
        let notifier_error = |source| WatchError::Notifier {
            path: root.to_path_buf(),
            source,
        };

        let mut watcher = RecommendedWatcher::new(forward_to(tx), Config::default())
            .map_err(notifier_error)?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(notifier_error)?;

        tracing::debug!(root = %root.display(), "watching for changes");

        Ok((
            ChangeNotifier {
                _watcher: watcher,
            },
            rx,
        ))
    }
}

fn forward_to(tx: UnboundedSender<Notification>) -> impl Fn(notify::Result<Event>) + Send + 'static {
    move |result| {
        let notification = match result {
            Ok(event) => match ChangeKind::from_event_kind(event.kind) {
                Some(kind) => Ok(ChangeEvent {
                    kind,
                    paths: event.paths,
                }),
                None => return,
            },
            Err(error) => Err(error),
        };

        // the receiver only goes away during shutdown
        let _ = tx.send(notification);
    }
}
