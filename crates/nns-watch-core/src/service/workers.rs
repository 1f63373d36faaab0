//! # Long-running workers
//!
//! Three independent loops share one [`WatchState`]:
//!
//! | Worker | Cadence | Work |
//! |--------|---------|------|
//! | [`PollWorker`] | fixed interval | fetch → sort → watermark gate → dispatch |
//! | [`PersistenceWorker`] | fixed interval, independent | capture → atomic save |
//! | [`CommandWorker`] | as messages arrive | parse → apply → reply |
//!
//! Each `run` returns when its shutdown signal flips to `true` (or the sender
//! is dropped). The persistence worker writes one last snapshot on the way
//! out, so it must be signalled only after the poll and command workers have
//! returned. Anything mutated after the last successful save is lost on a
//! crash.

use crate::domain::SnapshotError;
use crate::ports::{
    CommandApi, CommandSource, DeliveryOutcome, IncomingMessage, Notifier, ProposalFeed,
    SnapshotStore,
};
use crate::service::{
    deliver_bounded, DispatchReport, NotificationDispatcher, WatchState, DEFAULT_DELIVERY_TIMEOUT,
};
use nns_watch_telemetry::{metric_inc, FEED_FAILURES, SNAPSHOT_WRITES, SUBSCRIBERS_REMOVED};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Shutdown signal shared by all workers.
pub type ShutdownSignal = watch::Receiver<bool>;

/// Periodically pulls the feed and drives the dispatcher.
pub struct PollWorker {
    feed: Arc<dyn ProposalFeed>,
    dispatcher: Arc<NotificationDispatcher>,
    interval: Duration,
}

impl PollWorker {
    pub fn new(
        feed: Arc<dyn ProposalFeed>,
        dispatcher: Arc<NotificationDispatcher>,
        interval: Duration,
    ) -> Self {
        Self {
            feed,
            dispatcher,
            interval,
        }
    }

    /// Run one poll cycle. Returns `None` when the fetch failed and the
    /// cycle was skipped.
    pub async fn poll_once(&self) -> Option<DispatchReport> {
        let batch = match self.feed.fetch().await {
            Ok(batch) => batch,
            Err(e) => {
                metric_inc!(FEED_FAILURES);
                warn!(error = %e, "Proposal fetch failed, skipping cycle");
                return None;
            }
        };

        let fetched = batch.len();
        let report = self.dispatcher.process_batch(batch).await;
        debug!(
            fetched,
            dispatched = report.dispatched.len(),
            skipped = report.skipped,
            "Poll cycle complete"
        );
        Some(report)
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "Poll worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }
        info!("Poll worker stopped");
    }
}

/// Periodically mirrors the watch state into the snapshot store.
pub struct PersistenceWorker {
    state: Arc<WatchState>,
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
}

impl PersistenceWorker {
    pub fn new(state: Arc<WatchState>, store: Arc<dyn SnapshotStore>, interval: Duration) -> Self {
        Self {
            state,
            store,
            interval,
        }
    }

    /// Capture and save one snapshot.
    ///
    /// The save runs on the blocking pool; the registry lock is only held
    /// while the snapshot is captured, never during disk I/O.
    pub async fn persist_once(&self) -> Result<(), SnapshotError> {
        let snapshot = self.state.capture();
        let store = Arc::clone(&self.store);

        let result = tokio::task::spawn_blocking(move || store.save(&snapshot))
            .await
            .map_err(|e| SnapshotError::Task(e.to_string()))
            .and_then(|saved| saved);

        match &result {
            Ok(()) => metric_inc!(SNAPSHOT_WRITES, &["ok"]),
            Err(e) => {
                metric_inc!(SNAPSHOT_WRITES, &["error"]);
                error!(error = %e, "Couldn't persist watch state");
            }
        }
        result
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; nothing has changed yet.
        ticker.tick().await;
        info!(interval_secs = self.interval.as_secs(), "Persistence worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.persist_once().await;
                }
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }

        if self.persist_once().await.is_ok() {
            info!("Final snapshot written");
        }
        info!("Persistence worker stopped");
    }
}

/// Receives subscriber commands, applies them and sends the replies.
pub struct CommandWorker {
    source: Arc<dyn CommandSource>,
    api: Arc<dyn CommandApi>,
    notifier: Arc<dyn Notifier>,
    state: Arc<WatchState>,
    retry_delay: Duration,
    delivery_timeout: Duration,
}

impl CommandWorker {
    pub fn new(
        source: Arc<dyn CommandSource>,
        api: Arc<dyn CommandApi>,
        notifier: Arc<dyn Notifier>,
        state: Arc<WatchState>,
    ) -> Self {
        Self {
            source,
            api,
            notifier,
            state,
            retry_delay: Duration::from_secs(5),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    /// Delay before polling the channel again after a receive error.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Bound on a single reply delivery.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Apply one message and deliver the reply.
    pub async fn handle_message(&self, message: IncomingMessage) -> DeliveryOutcome {
        debug!(subscriber = %message.sender, text = %message.text, "Got message");
        let reply = self.api.handle_text(message.sender, &message.text);

        let outcome = deliver_bounded(
            self.notifier.as_ref(),
            message.sender,
            &reply,
            self.delivery_timeout,
        )
        .await;
        match &outcome {
            DeliveryOutcome::Delivered => {}
            DeliveryOutcome::RecipientUnreachable => {
                if self.state.registry().unsubscribe(message.sender) {
                    metric_inc!(SUBSCRIBERS_REMOVED);
                    info!(subscriber = %message.sender, "Reply recipient unreachable, unsubscribed");
                }
            }
            DeliveryOutcome::Failed(reason) => {
                warn!(subscriber = %message.sender, reason = %reason, "Couldn't send reply");
            }
        }
        outcome
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        info!("Command worker started");

        loop {
            let received = tokio::select! {
                received = self.source.next_messages() => received,
                _ = shutdown.changed() => break,
            };

            match received {
                Ok(messages) => {
                    for message in messages {
                        self.handle_message(message).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Couldn't receive commands, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }
        info!("Command worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySnapshotStore;
    use crate::domain::{
        ChannelError, DeliveryError, FeedError, MessageFormatter, Proposal, Snapshot, SubscriberId,
    };
    use crate::service::CommandHandler;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Feed that replays scripted batches, then fails.
    struct ScriptedFeed {
        batches: Mutex<VecDeque<Result<Vec<Proposal>, FeedError>>>,
    }

    impl ScriptedFeed {
        fn new(batches: Vec<Result<Vec<Proposal>, FeedError>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
            }
        }
    }

    #[async_trait]
    impl ProposalFeed for ScriptedFeed {
        async fn fetch(&self) -> Result<Vec<Proposal>, FeedError> {
            self.batches
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(FeedError::Transport("exhausted".to_string())))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(SubscriberId, String)>>,
        unreachable: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, recipient: SubscriberId, text: &str) -> DeliveryOutcome {
            self.sent.lock().push((recipient, text.to_string()));
            if self.unreachable {
                DeliveryOutcome::RecipientUnreachable
            } else {
                DeliveryOutcome::Delivered
            }
        }
    }

    struct StallingNotifier;

    #[async_trait]
    impl Notifier for StallingNotifier {
        async fn notify(&self, _recipient: SubscriberId, _text: &str) -> DeliveryOutcome {
            std::future::pending::<()>().await;
            DeliveryOutcome::Delivered
        }
    }

    /// Store whose first `failures` saves fail like a read-only disk.
    struct FlakyStore {
        failures: Mutex<usize>,
        attempts: Mutex<usize>,
        inner: InMemorySnapshotStore,
    }

    impl FlakyStore {
        fn failing(failures: usize) -> Self {
            Self {
                failures: Mutex::new(failures),
                attempts: Mutex::new(0),
                inner: InMemorySnapshotStore::new(),
            }
        }

        fn attempts(&self) -> usize {
            *self.attempts.lock()
        }
    }

    impl SnapshotStore for FlakyStore {
        fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
            *self.attempts.lock() += 1;
            {
                let mut failures = self.failures.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(SnapshotError::io(
                        "/readonly/state.json",
                        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                    ));
                }
            }
            self.inner.save(snapshot)
        }

        fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
            self.inner.load()
        }
    }

    /// Command source that yields one scripted batch per call, then idles.
    struct ScriptedSource {
        batches: Mutex<VecDeque<Result<Vec<IncomingMessage>, ChannelError>>>,
    }

    #[async_trait]
    impl CommandSource for ScriptedSource {
        async fn next_messages(&self) -> Result<Vec<IncomingMessage>, ChannelError> {
            let next = self.batches.lock().pop_front();
            match next {
                Some(batch) => batch,
                None => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn proposal(id: u64) -> Proposal {
        Proposal::new(id, "T", "Governance")
    }

    fn dispatcher(state: &Arc<WatchState>, notifier: Arc<RecordingNotifier>) -> Arc<NotificationDispatcher> {
        Arc::new(NotificationDispatcher::new(
            Arc::clone(state),
            notifier,
            MessageFormatter::default(),
        ))
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_cycle_without_state_change() {
        let state = Arc::new(WatchState::new());
        let feed = Arc::new(ScriptedFeed::new(vec![
            Err(FeedError::Parse("not json".to_string())),
            Ok(vec![proposal(2)]),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let worker = PollWorker::new(feed, dispatcher(&state, notifier), Duration::from_secs(1));

        assert!(worker.poll_once().await.is_none());
        assert_eq!(state.watermark().current(), 0);

        let report = worker.poll_once().await.unwrap();
        assert_eq!(report.dispatched_ids(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_worker_stops_on_shutdown() {
        let state = Arc::new(WatchState::new());
        let feed = Arc::new(ScriptedFeed::new(vec![Ok(vec![proposal(1)])]));
        let notifier = Arc::new(RecordingNotifier::default());
        let worker = PollWorker::new(feed, dispatcher(&state, notifier), Duration::from_secs(300));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(state.watermark().current(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_worker_saves_on_interval_and_shutdown() {
        let state = Arc::new(WatchState::new());
        let store = Arc::new(InMemorySnapshotStore::new());
        let worker = PersistenceWorker::new(
            Arc::clone(&state),
            store.clone() as Arc<dyn SnapshotStore>,
            Duration::from_secs(60),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));

        state.registry().subscribe(SubscriberId(5));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.save_count(), 1);

        state.watermark().advance_if_newer(10);
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(store.save_count(), 2);
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.last_seen_proposal, 10);
        assert!(saved.chat_ids.contains_key(&5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_state_and_next_tick_recovers() {
        let state = Arc::new(WatchState::new());
        state.registry().subscribe(SubscriberId(9));
        state.watermark().advance_if_newer(40);
        let store = Arc::new(FlakyStore::failing(2));
        let worker = PersistenceWorker::new(
            Arc::clone(&state),
            store.clone() as Arc<dyn SnapshotStore>,
            Duration::from_secs(60),
        );

        let errors_before = SNAPSHOT_WRITES.with_label_values(&["error"]).get();
        assert!(worker.persist_once().await.is_err());
        assert!(SNAPSHOT_WRITES.with_label_values(&["error"]).get() > errors_before);

        // In-memory state is untouched by the failed write.
        assert_eq!(state.watermark().current(), 40);
        assert!(state.registry().is_subscribed(SubscriberId(9)));
        assert!(store.inner.load().unwrap().is_none());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.attempts(), 2);
        assert!(store.inner.load().unwrap().is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.attempts(), 3);
        let saved = store.inner.load().unwrap().unwrap();
        assert_eq!(saved.last_seen_proposal, 40);
        assert!(saved.chat_ids.contains_key(&9));

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_reply_times_out() {
        let state = Arc::new(WatchState::new());
        let worker = CommandWorker::new(
            Arc::new(ScriptedSource {
                batches: Mutex::new(VecDeque::new()),
            }),
            Arc::new(CommandHandler::new(Arc::clone(&state))),
            Arc::new(StallingNotifier),
            Arc::clone(&state),
        )
        .with_delivery_timeout(Duration::from_secs(2));

        let outcome = worker
            .handle_message(IncomingMessage {
                sender: SubscriberId(4),
                text: "/start".to_string(),
            })
            .await;

        assert_eq!(
            outcome,
            DeliveryOutcome::Failed(DeliveryError::Timeout { after_ms: 2000 })
        );
        assert!(state.registry().is_subscribed(SubscriberId(4)));
    }

    #[tokio::test]
    async fn test_command_reply_delivered() {
        let state = Arc::new(WatchState::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let worker = CommandWorker::new(
            Arc::new(ScriptedSource {
                batches: Mutex::new(VecDeque::new()),
            }),
            Arc::new(CommandHandler::new(Arc::clone(&state))),
            notifier.clone() as Arc<dyn Notifier>,
            Arc::clone(&state),
        );

        let outcome = worker
            .handle_message(IncomingMessage {
                sender: SubscriberId(8),
                text: "/start".to_string(),
            })
            .await;

        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert!(state.registry().is_subscribed(SubscriberId(8)));
        assert_eq!(notifier.sent.lock()[0].0, SubscriberId(8));
    }

    #[tokio::test]
    async fn test_unreachable_reply_unsubscribes() {
        let state = Arc::new(WatchState::new());
        let notifier = Arc::new(RecordingNotifier {
            unreachable: true,
            ..RecordingNotifier::default()
        });
        let worker = CommandWorker::new(
            Arc::new(ScriptedSource {
                batches: Mutex::new(VecDeque::new()),
            }),
            Arc::new(CommandHandler::new(Arc::clone(&state))),
            notifier,
            Arc::clone(&state),
        );

        worker
            .handle_message(IncomingMessage {
                sender: SubscriberId(8),
                text: "/start".to_string(),
            })
            .await;
        assert!(!state.registry().is_subscribed(SubscriberId(8)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_worker_survives_channel_errors() {
        let state = Arc::new(WatchState::new());
        let source = Arc::new(ScriptedSource {
            batches: Mutex::new(VecDeque::from(vec![
                Err(ChannelError::Transport("reset".to_string())),
                Ok(vec![IncomingMessage {
                    sender: SubscriberId(3),
                    text: "/start".to_string(),
                }]),
            ])),
        });
        let worker = CommandWorker::new(
            source,
            Arc::new(CommandHandler::new(Arc::clone(&state))),
            Arc::new(RecordingNotifier::default()),
            Arc::clone(&state),
        )
        .with_retry_delay(Duration::from_secs(1));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(state.registry().is_subscribed(SubscriberId(3)));

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
