//! In-memory store doubles for testing.

use crate::dest::DestinationStore;
use crate::error::{StoreError, StoreResult};
use crate::event::ChangeEvent;
use crate::source::{EventStream, KeyPage, ScanCursor, SourceStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Matches the single-trailing-`*` glob subset used by keyspace patterns.
fn matches(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => candidate.starts_with(prefix),
        None => candidate == pattern,
    }
}

/// An in-memory source store for testing.
///
/// Emulates the parts of Redis the engine relies on: a cursor-paged key
/// scan, JSON values, and keyspace notifications on
/// `__keyspace@<db>__:<key>` channels. [`MemorySource::drop_subscriptions`]
/// simulates a connection fault by ending every live event stream.
pub struct MemorySource {
    data: RwLock<BTreeMap<String, Option<Value>>>,
    events: RwLock<Option<broadcast::Sender<ChangeEvent>>>,
    database: u32,
}

impl MemorySource {
    /// Creates an empty source on database index 0.
    pub fn new() -> Self {
        Self::with_database(0)
    }

    /// Creates an empty source on the given database index.
    pub fn with_database(database: u32) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            data: RwLock::new(BTreeMap::new()),
            events: RwLock::new(Some(sender)),
            database,
        }
    }

    /// Stores a JSON value and emits a `json.set` notification.
    pub fn set_json(&self, key: &str, value: Value) {
        self.data.write().insert(key.to_owned(), Some(value));
        self.emit(key, "json.set");
    }

    /// Makes `key` appear in scans with no fetchable value, as if it were
    /// deleted between enumeration and fetch.
    pub fn set_phantom(&self, key: &str) {
        self.data.write().insert(key.to_owned(), None);
    }

    /// Removes a key without emitting a notification.
    pub fn remove(&self, key: &str) {
        self.data.write().remove(key);
    }

    /// Emits a raw keyspace notification without touching stored data.
    pub fn emit(&self, key: &str, kind: &str) {
        if let Some(sender) = self.events.read().as_ref() {
            let channel = format!("__keyspace@{}__:{key}", self.database);
            let _ = sender.send(ChangeEvent::new(channel, kind));
        }
    }

    /// Drops the notification channel, ending every live subscription.
    pub fn drop_subscriptions(&self) {
        *self.events.write() = None;
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    async fn scan_page(
        &self,
        cursor: ScanCursor,
        pattern: &str,
        count: usize,
    ) -> StoreResult<KeyPage> {
        let data = self.data.read();
        let matching: Vec<&String> = data.keys().filter(|k| matches(pattern, k)).collect();
        let start = (cursor.as_raw() as usize).min(matching.len());
        let end = (start + count.max(1)).min(matching.len());
        let keys = matching[start..end].iter().map(|k| (*k).clone()).collect();
        let cursor = if end >= matching.len() {
            ScanCursor::START
        } else {
            ScanCursor::from_raw(end as u64)
        };
        Ok(KeyPage { keys, cursor })
    }

    async fn get_json(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.data.read().get(key).cloned().flatten())
    }

    async fn subscribe(&self, pattern: &str) -> StoreResult<EventStream> {
        let receiver = match self.events.read().as_ref() {
            Some(sender) => sender.subscribe(),
            None => return Err(StoreError::subscription("notification channel closed")),
        };
        let pattern = pattern.to_owned();
        let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(event) if matches(&pattern, &event.channel) => Some(Ok(event)),
            Ok(_) => None,
            // Lag means notifications were lost, which is a subscription
            // fault, not a skippable event.
            Err(e) => Some(Err(StoreError::subscription(e.to_string()))),
        });
        Ok(Box::pin(stream))
    }
}

/// An in-memory destination store for testing.
///
/// Records every upsert and can be told to fail writes for specific ids to
/// exercise per-key fault isolation.
pub struct MemoryDestination {
    documents: RwLock<HashMap<String, Value>>,
    fail_ids: RwLock<HashSet<String>>,
    upserts: AtomicU64,
}

impl MemoryDestination {
    /// Creates an empty destination.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            fail_ids: RwLock::new(HashSet::new()),
            upserts: AtomicU64::new(0),
        }
    }

    /// Returns the stored document for `id`, if any.
    pub fn get(&self, id: &str) -> Option<Value> {
        self.documents.read().get(id).cloned()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// True when no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Total number of accepted upserts.
    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Makes every upsert for `id` fail.
    pub fn fail_on(&self, id: &str) {
        self.fail_ids.write().insert(id.to_owned());
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DestinationStore for MemoryDestination {
    async fn upsert(&self, id: &str, record: &Value) -> StoreResult<()> {
        if self.fail_ids.read().contains(id) {
            return Err(StoreError::backend(format!("write rejected for {id}")));
        }
        self.documents.write().insert(id.to_owned(), record.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
