//! Worker orchestration.
//!
//! ## Startup
//!
//! 1. Restore state from the snapshot store (zero state if unreadable)
//! 2. Spawn the poll, persistence and command workers
//! 3. Bind the metrics endpoint, if configured
//!
//! ## Shutdown
//!
//! 1. Flip the shutdown signal of the poll and command workers
//! 2. Wait for them to return (an in-flight batch finishes first)
//! 3. Flip the persistence signal; the worker writes a final snapshot
//!    that includes everything the other workers did

use crate::adapters::{HttpProposalFeed, TelegramBot};
use crate::config::RuntimeConfig;
use crate::metrics_server;
use anyhow::{Context, Result};
use nns_watch_core::{
    CommandHandler, CommandSource, CommandWorker, FileSnapshotStore, MessageFormatter, Notifier,
    NotificationDispatcher, PersistenceWorker, PollWorker, ProposalFeed, SnapshotStore,
    WatchState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The port implementations a runtime is wired with.
pub struct Adapters {
    pub feed: Arc<dyn ProposalFeed>,
    pub notifier: Arc<dyn Notifier>,
    pub commands: Arc<dyn CommandSource>,
    pub store: Arc<dyn SnapshotStore>,
}

impl Adapters {
    /// Production wiring: HTTP feed, Telegram bot, state file.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let feed = HttpProposalFeed::new(&config.feed_url).context("Failed to build feed client")?;
        let bot = Arc::new(
            TelegramBot::new(
                &config.telegram_api_url,
                &config.token,
                config.delivery_timeout(),
                config.long_poll_timeout(),
            )
            .context("Failed to build Telegram client")?,
        );

        Ok(Self {
            feed: Arc::new(feed),
            notifier: bot.clone(),
            commands: bot,
            store: Arc::new(FileSnapshotStore::new(&config.state_path)),
        })
    }
}

/// The running notifier.
pub struct WatchRuntime {
    config: RuntimeConfig,
    state: Arc<WatchState>,
    adapters: Adapters,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    persist_tx: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    persistence: Option<JoinHandle<()>>,
    metrics_addr: Option<SocketAddr>,
}

impl WatchRuntime {
    /// Create a runtime, restoring state from `adapters.store`.
    pub fn new(config: RuntimeConfig, adapters: Adapters) -> Self {
        let state = Arc::new(WatchState::restore(adapters.store.as_ref()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (persist_tx, _) = watch::channel(false);

        Self {
            config,
            state,
            adapters,
            shutdown_tx,
            shutdown_rx,
            persist_tx,
            handles: Vec::new(),
            persistence: None,
            metrics_addr: None,
        }
    }

    pub fn state(&self) -> Arc<WatchState> {
        Arc::clone(&self.state)
    }

    /// Address the metrics endpoint is bound to, once started.
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Spawn the workers and the metrics endpoint.
    pub async fn start(&mut self) -> Result<()> {
        info!("===========================================");
        info!("  NNS Watch v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let formatter =
            MessageFormatter::new(self.config.max_summary_length, self.config.dashboard_url.as_str());
        let dispatcher = Arc::new(
            NotificationDispatcher::new(
                Arc::clone(&self.state),
                Arc::clone(&self.adapters.notifier),
                formatter,
            )
            .with_delivery_timeout(self.config.delivery_timeout()),
        );

        let poll = PollWorker::new(
            Arc::clone(&self.adapters.feed),
            dispatcher,
            self.config.poll_interval(),
        );
        let persistence = PersistenceWorker::new(
            Arc::clone(&self.state),
            Arc::clone(&self.adapters.store),
            self.config.persist_interval(),
        );
        let commands = CommandWorker::new(
            Arc::clone(&self.adapters.commands),
            Arc::new(CommandHandler::new(Arc::clone(&self.state))),
            Arc::clone(&self.adapters.notifier),
            Arc::clone(&self.state),
        )
        .with_delivery_timeout(self.config.delivery_timeout());

        self.persistence = Some(tokio::spawn(persistence.run(self.persist_tx.subscribe())));
        self.handles.push(("poll", tokio::spawn(poll.run(self.shutdown_rx.clone()))));
        self.handles
            .push(("commands", tokio::spawn(commands.run(self.shutdown_rx.clone()))));

        if let Some(port) = self.config.metrics_port {
            self.start_metrics_server(port).await?;
        }

        info!(
            subscribers = self.state.registry().len(),
            last_seen_proposal = self.state.watermark().current(),
            state_path = %self.config.state_path.display(),
            "All workers running"
        );
        Ok(())
    }

    async fn start_metrics_server(&mut self, port: u16) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("Failed to bind metrics port {port}"))?;
        self.metrics_addr = listener.local_addr().ok();

        let state = Arc::clone(&self.state);
        let shutdown = self.shutdown_rx.clone();
        self.handles.push((
            "metrics",
            tokio::spawn(async move {
                if let Err(e) = metrics_server::serve(listener, state, shutdown).await {
                    error!(error = %e, "Metrics endpoint failed");
                }
            }),
        ));
        Ok(())
    }

    /// Stop every worker, then write the final snapshot.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                error!(worker = name, error = %e, "Worker panicked");
            }
        }

        // Nothing mutates the state any more.
        if let Some(persistence) = self.persistence {
            if let Err(e) = self.persist_tx.send(true) {
                error!("Failed to signal persistence worker: {}", e);
            }
            if let Err(e) = persistence.await {
                error!(worker = "persistence", error = %e, "Worker panicked");
            }
        }

        info!("Shutdown complete");
    }
}
