use crate::areas::repository::Repository;
use crate::artifacts::core::config::GraphConfig;
use crate::artifacts::graph::snapshot::SnapshotBuilder;
use crate::artifacts::watch::coordinator::WatchCoordinator;
use crate::artifacts::watch::notifier::ChangeNotifier;
use crate::artifacts::watch::worker::RenderWorker;
use tokio::signal;

impl Repository {
    /// Show the graph in a renderer and redraw it whenever the repository
    /// changes, until Ctrl-C or SIGTERM
    pub async fn watch(self, config: GraphConfig) -> anyhow::Result<()> {
        let git_dir = self.git_dir().to_path_buf();
        // subscribe before the first render so no change slips through
        let (_notifier, notifications) = ChangeNotifier::watch(&git_dir)?;

        let (database, refs) = self.into_parts();
        let builder = SnapshotBuilder::new(database, refs, config.head);
        let worker = RenderWorker::new(builder, config.renderer);
        let coordinator = WatchCoordinator::start(worker, config.debounce)?;

        tracing::info!(
            git_dir = %git_dir.display(),
            debounce_ms = config.debounce.as_millis() as u64,
            "watching repository"
        );

        coordinator.run(notifications, shutdown_signal()).await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
