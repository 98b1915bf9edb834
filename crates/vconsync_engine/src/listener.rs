//! Live change-event listener.

use crate::channel::key_from_channel;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vconsync_store::{ChangeEvent, DestinationStore, SourceStore};

/// Write-class operation tags that trigger replication.
///
/// Anything outside this allow-list (expiry, deletion, renames, ...) is
/// silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Plain string write (`SET`).
    Set,
    /// Hash field write (`HSET`).
    HashSet,
    /// Structured JSON document write (`JSON.SET`).
    JsonSet,
}

impl WriteKind {
    /// Maps a notification tag onto the allow-list; `None` for everything
    /// outside it.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "set" => Some(Self::Set),
            "hset" => Some(Self::HashSet),
            "json.set" => Some(Self::JsonSet),
            _ => None,
        }
    }
}

/// Lifecycle state of the change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Issuing the pattern subscription.
    Subscribing,
    /// Waiting for and processing events.
    Listening,
    /// Subscription ended; no further events will be processed.
    Terminated,
}

/// Counters for listener activity.
#[derive(Debug, Clone, Default)]
pub struct ListenerStats {
    /// Events received on the subscription.
    pub events_seen: u64,
    /// Events whose kind is outside the allow-list.
    pub events_ignored: u64,
    /// Events applied to the destination.
    pub events_applied: u64,
    /// Events whose key had no value by fetch time.
    pub events_missing: u64,
    /// Events whose decode, fetch or upsert failed.
    pub events_failed: u64,
}

/// Subscribes to keyspace notifications and replays each mutation into the
/// destination.
///
/// Events are processed strictly one at a time, in arrival order, with no
/// overlap between one event's fetch/upsert and the next event's dequeue.
/// Every event re-fetches the key's current value rather than replaying a
/// payload, so out-of-order delivery across events for the same key cannot
/// produce a stale overwrite.
pub struct ChangeListener<S, D> {
    config: EngineConfig,
    source: Arc<S>,
    destination: Arc<D>,
    state: RwLock<ListenerState>,
    stats: RwLock<ListenerStats>,
}

impl<S: SourceStore, D: DestinationStore> ChangeListener<S, D> {
    /// Creates a listener over the two stores.
    pub fn new(config: EngineConfig, source: Arc<S>, destination: Arc<D>) -> Self {
        Self {
            config,
            source,
            destination,
            state: RwLock::new(ListenerState::Subscribing),
            stats: RwLock::new(ListenerStats::default()),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        *self.state.read()
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> ListenerStats {
        self.stats.read().clone()
    }

    fn set_state(&self, state: ListenerState) {
        *self.state.write() = state;
    }

    /// Runs the subscription until cancellation or a connection fault.
    ///
    /// Per-event failures are logged and counted without terminating the
    /// listener; only a failure of the subscription itself is fatal.
    pub async fn run(&self, cancel: CancellationToken) -> EngineResult<()> {
        self.set_state(ListenerState::Subscribing);
        let pattern = self.config.channel_pattern();
        let mut events = match self.source.subscribe(&pattern).await {
            Ok(stream) => stream,
            Err(e) => {
                self.set_state(ListenerState::Terminated);
                return Err(EngineError::SubscriptionLost(e.to_string()));
            }
        };
        self.set_state(ListenerState::Listening);
        info!(pattern = %pattern, "subscribed to keyspace events");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.set_state(ListenerState::Terminated);
                    info!("change listener stopped");
                    return Ok(());
                }
                next = events.next() => match next {
                    Some(Ok(event)) => self.handle_event(&event).await,
                    Some(Err(e)) => {
                        self.set_state(ListenerState::Terminated);
                        return Err(EngineError::SubscriptionLost(e.to_string()));
                    }
                    None => {
                        self.set_state(ListenerState::Terminated);
                        return Err(EngineError::SubscriptionLost(
                            "event stream ended".into(),
                        ));
                    }
                }
            }
        }
    }

    async fn handle_event(&self, event: &ChangeEvent) {
        self.stats.write().events_seen += 1;

        if WriteKind::from_tag(&event.kind).is_none() {
            self.stats.write().events_ignored += 1;
            return;
        }

        let key = match key_from_channel(&event.channel) {
            Ok(key) => key,
            Err(e) => {
                self.stats.write().events_failed += 1;
                warn!(channel = %event.channel, error = %e, "skipping unparseable notification");
                return;
            }
        };

        match self.source.get_json(key).await {
            Ok(Some(value)) => match self.destination.upsert(key, &value).await {
                Ok(()) => {
                    self.stats.write().events_applied += 1;
                    info!(key, kind = %event.kind, "applied change event");
                }
                Err(e) => {
                    self.stats.write().events_failed += 1;
                    error!(key, error = %e, "failed to upsert changed key");
                }
            },
            Ok(None) => {
                self.stats.write().events_missing += 1;
                warn!(key, "changed key has no JSON value");
            }
            Err(e) => {
                self.stats.write().events_failed += 1;
                error!(key, error = %e, "failed to read changed key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use vconsync_store::{MemoryDestination, MemorySource};

    fn listener(
        source: &Arc<MemorySource>,
        destination: &Arc<MemoryDestination>,
    ) -> Arc<ChangeListener<MemorySource, MemoryDestination>> {
        Arc::new(ChangeListener::new(
            EngineConfig::default(),
            Arc::clone(source),
            Arc::clone(destination),
        ))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn write_kind_allow_list() {
        assert_eq!(WriteKind::from_tag("set"), Some(WriteKind::Set));
        assert_eq!(WriteKind::from_tag("hset"), Some(WriteKind::HashSet));
        assert_eq!(WriteKind::from_tag("json.set"), Some(WriteKind::JsonSet));
        assert_eq!(WriteKind::from_tag("expire"), None);
        assert_eq!(WriteKind::from_tag("del"), None);
        assert_eq!(WriteKind::from_tag(""), None);
    }

    #[tokio::test]
    async fn applies_write_events() {
        let source = Arc::new(MemorySource::new());
        let destination = Arc::new(MemoryDestination::new());
        let listener = listener(&source, &destination);

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let listener = Arc::clone(&listener);
            let cancel = cancel.clone();
            async move { listener.run(cancel).await }
        });
        wait_until(|| listener.state() == ListenerState::Listening).await;

        source.set_json("vcon:1", json!({ "a": 1 }));
        wait_until(|| destination.get("vcon:1").is_some()).await;
        assert_eq!(destination.get("vcon:1").unwrap(), json!({ "a": 1 }));

        // Convergence: the last processed event writes the latest value.
        source.set_json("vcon:1", json!({ "a": 9 }));
        wait_until(|| destination.get("vcon:1") == Some(json!({ "a": 9 }))).await;

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(listener.state(), ListenerState::Terminated);
        assert_eq!(listener.stats().events_applied, 2);
    }

    #[tokio::test]
    async fn unrecognized_event_kind_is_ignored() {
        let source = Arc::new(MemorySource::new());
        let destination = Arc::new(MemoryDestination::new());
        source.set_json("vcon:1", json!({ "a": 1 }));
        let listener = listener(&source, &destination);

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let listener = Arc::clone(&listener);
            let cancel = cancel.clone();
            async move { listener.run(cancel).await }
        });
        wait_until(|| listener.state() == ListenerState::Listening).await;

        source.emit("vcon:1", "expire");
        wait_until(|| listener.stats().events_ignored == 1).await;
        assert!(destination.is_empty());
        assert_eq!(listener.stats().events_applied, 0);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn event_for_missing_key_is_skipped() {
        let source = Arc::new(MemorySource::new());
        let destination = Arc::new(MemoryDestination::new());
        let listener = listener(&source, &destination);

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let listener = Arc::clone(&listener);
            let cancel = cancel.clone();
            async move { listener.run(cancel).await }
        });
        wait_until(|| listener.state() == ListenerState::Listening).await;

        // A set notification for a key that is gone by fetch time.
        source.emit("vcon:ghost", "set");
        wait_until(|| listener.stats().events_missing == 1).await;
        assert!(destination.is_empty());

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn upsert_failure_does_not_terminate_listener() {
        let source = Arc::new(MemorySource::new());
        let destination = Arc::new(MemoryDestination::new());
        destination.fail_on("vcon:poison");
        let listener = listener(&source, &destination);

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let listener = Arc::clone(&listener);
            let cancel = cancel.clone();
            async move { listener.run(cancel).await }
        });
        wait_until(|| listener.state() == ListenerState::Listening).await;

        source.set_json("vcon:poison", json!({ "bad": true }));
        source.set_json("vcon:2", json!({ "good": true }));

        wait_until(|| destination.get("vcon:2").is_some()).await;
        assert_eq!(listener.stats().events_failed, 1);
        assert_eq!(listener.state(), ListenerState::Listening);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn subscription_fault_terminates_listener() {
        let source = Arc::new(MemorySource::new());
        let destination = Arc::new(MemoryDestination::new());
        let listener = listener(&source, &destination);

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let listener = Arc::clone(&listener);
            let cancel = cancel.clone();
            async move { listener.run(cancel).await }
        });
        wait_until(|| listener.state() == ListenerState::Listening).await;

        source.drop_subscriptions();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(EngineError::SubscriptionLost(_))));
        assert_eq!(listener.state(), ListenerState::Terminated);
    }

    #[tokio::test]
    async fn failed_subscribe_is_a_fault() {
        let source = Arc::new(MemorySource::new());
        source.drop_subscriptions();
        let destination = Arc::new(MemoryDestination::new());
        let listener = listener(&source, &destination);

        let result = listener.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(EngineError::SubscriptionLost(_))));
        assert_eq!(listener.state(), ListenerState::Terminated);
    }
}
