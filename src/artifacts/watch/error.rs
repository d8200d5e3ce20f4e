use crate::artifacts::graph::error::SnapshotError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to {action} the renderer: {source}")]
    Subprocess {
        action: &'static str,
        source: io::Error,
    },

    #[error("failed to write the graph to the renderer: {0}")]
    Write(io::Error),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("failed to watch {path}: {source}")]
    Notifier {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("change notifications stopped unexpectedly")]
    NotificationsClosed,

    #[error("render worker is gone")]
    WorkerGone,

    #[error("failed to start the render worker: {0}")]
    WorkerSpawn(io::Error),
}

impl WatchError {
    pub fn subprocess(action: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| WatchError::Subprocess { action, source }
    }
}
