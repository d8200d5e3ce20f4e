//! Watch-mode event loop
//!
//! Change notifications restart a debounce timer; when the repository has
//! been quiet for the whole window a render is requested from the worker
//! thread. The coordinator never renders by itself, so a slow snapshot never
//! delays the handling of notifications or of shutdown.

use crate::artifacts::graph::source::{ObjectStore, ReferenceStore};
use crate::artifacts::watch::debounce::Debouncer;
use crate::artifacts::watch::error::WatchError;
use crate::artifacts::watch::notifier::Notification;
use crate::artifacts::watch::renderer::Renderer;
use crate::artifacts::watch::worker::{Control, RenderWorker};
use std::future::Future;
use std::sync::mpsc::{Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const WORKER_THREAD_NAME: &str = "render-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Nothing pending
    Idle,
    /// Handing a render request to the worker
    Rendering,
    /// Changes seen, waiting for the repository to settle
    Debouncing,
    /// Shutting the worker down
    Terminating,
}

pub struct WatchCoordinator {
    control: Sender<Control>,
    worker: Option<JoinHandle<()>>,
    debounce: Duration,
}

impl WatchCoordinator {
    /// Start `worker` on its own thread
    pub fn start<O, R, Rn>(
        worker: RenderWorker<O, R, Rn>,
        debounce: Duration,
    ) -> Result<Self, WatchError>
    where
        O: ObjectStore + Send + 'static,
        R: ReferenceStore + Send + 'static,
        Rn: Renderer + 'static,
    {
        let (control, receiver) = channel();
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(receiver))
            .map_err(WatchError::WorkerSpawn)?;

        Ok(WatchCoordinator {
            control,
            worker: Some(handle),
            debounce,
        })
    }

    /// Drive renders from `notifications` until `shutdown` completes
    ///
    /// The first render is requested right away. The worker is always shut
    /// down and joined before returning; a closed notification channel is
    /// reported as an error once that is done.
    pub async fn run<S>(
        mut self,
        mut notifications: UnboundedReceiver<Notification>,
        shutdown: S,
    ) -> Result<(), WatchError>
    where
        S: Future<Output = ()>,
    {
        let mut debouncer = Debouncer::new(self.debounce);
        let mut state = transition(WatchState::Idle, WatchState::Rendering);
        tokio::pin!(shutdown);

        let result = match self.request_render() {
            Err(error) => Err(error),
            Ok(()) => loop {
                if state == WatchState::Rendering {
                    state = transition(state, WatchState::Idle);
                }
                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("shutdown requested");
                        break Ok(());
                    }
                    notification = notifications.recv() => match notification {
                        Some(Ok(event)) => {
                            tracing::debug!(kind = ?event.kind, paths = ?event.paths, "change detected");
                            debouncer.reset();
                            state = transition(state, WatchState::Debouncing);
                        }
                        Some(Err(error)) => tracing::warn!(%error, "change notification failed"),
                        None => break Err(WatchError::NotificationsClosed),
                    },
                    _ = debouncer.expired() => {
                        state = transition(state, WatchState::Rendering);
                        if let Err(error) = self.request_render() {
                            break Err(error);
                        }
                    }
                }
            },
        };

        transition(state, WatchState::Terminating);
        self.stop().await;

        result
    }

    fn request_render(&self) -> Result<(), WatchError> {
        self.control
            .send(Control::Render)
            .map_err(|_| WatchError::WorkerGone)
    }

    async fn stop(&mut self) {
        // the worker may already be gone, joining tells
        let _ = self.control.send(Control::Shutdown);

        let Some(handle) = self.worker.take() else {
            return;
        };
        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => tracing::debug!("render worker joined"),
            Ok(Err(_)) => tracing::error!("render worker panicked"),
            Err(error) => tracing::error!(%error, "failed to join the render worker"),
        }
    }
}

fn transition(from: WatchState, to: WatchState) -> WatchState {
    if from != to {
        tracing::debug!(?from, ?to, "watch state changed");
    }
    to
}
