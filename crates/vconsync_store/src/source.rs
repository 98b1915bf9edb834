//! Source store abstraction and the Redis backend.

use crate::error::{StoreError, StoreResult};
use crate::event::ChangeEvent;
use async_trait::async_trait;
use serde_json::Value;
use std::pin::Pin;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// Opaque progress token for a paged keyspace scan.
///
/// Follows the Redis `SCAN` convention: a scan starts at
/// [`ScanCursor::START`] and is complete once the store hands the sentinel
/// start value back. The token is only meaningful to the store that issued
/// it and is never persisted across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanCursor(u64);

impl ScanCursor {
    /// The sentinel cursor a scan starts from.
    pub const START: ScanCursor = ScanCursor(0);

    /// Wraps the store's raw cursor token.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token to hand back to the store for the next page.
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// True once the cursor has wrapped back to the sentinel.
    pub fn is_complete(&self) -> bool {
        self.0 == 0
    }
}

/// One page of keys from a cursor scan.
#[derive(Debug, Clone, Default)]
pub struct KeyPage {
    /// Keys discovered in this page. May be empty mid-scan.
    pub keys: Vec<String>,
    /// Cursor for the next page request.
    pub cursor: ScanCursor,
}

/// An infinite stream of change notifications.
///
/// Yields one item per matching mutation in the source store. The stream
/// never completes under normal operation; an `Err` item or end-of-stream
/// signals a subscription fault.
pub type EventStream = Pin<Box<dyn Stream<Item = StoreResult<ChangeEvent>> + Send>>;

/// Read access to the source key-value store.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetches one page of keys matching `pattern`, advancing `cursor`.
    ///
    /// The enumeration is cursor-based, not snapshot-based: duplicates or
    /// rare misses under concurrent mutation are tolerated, but the scan
    /// always terminates. `count` is a page-size hint, not a guarantee.
    async fn scan_page(
        &self,
        cursor: ScanCursor,
        pattern: &str,
        count: usize,
    ) -> StoreResult<KeyPage>;

    /// Fetches the current JSON value of `key`.
    ///
    /// Returns `Ok(None)` when the key has no JSON value or no longer
    /// exists; absence is an expected outcome, not a failure.
    async fn get_json(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Subscribes to change notifications on channels matching `pattern`.
    ///
    /// The returned stream yields for the lifetime of the subscription and
    /// ends only on cancellation or a connection fault.
    async fn subscribe(&self, pattern: &str) -> StoreResult<EventStream>;
}

#[async_trait]
impl<T: SourceStore + ?Sized> SourceStore for std::sync::Arc<T> {
    async fn scan_page(
        &self,
        cursor: ScanCursor,
        pattern: &str,
        count: usize,
    ) -> StoreResult<KeyPage> {
        (**self).scan_page(cursor, pattern, count).await
    }

    async fn get_json(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).get_json(key).await
    }

    async fn subscribe(&self, pattern: &str) -> StoreResult<EventStream> {
        (**self).subscribe(pattern).await
    }
}

/// Source store backed by Redis with the RedisJSON module.
///
/// Regular commands go through a cloned multiplexed connection; each
/// subscription opens its own pub/sub connection, since a connection in
/// subscriber mode cannot issue regular commands.
pub struct RedisSource {
    client: redis::Client,
    connection: redis::aio::MultiplexedConnection,
}

impl RedisSource {
    /// Connects to the Redis server at `host:port`, selecting `database`.
    pub async fn connect(host: &str, port: u16, database: u32) -> StoreResult<Self> {
        let url = format!("redis://{host}:{port}/{database}");
        Self::connect_url(&url).await
    }

    /// Connects using a full Redis URL,
    /// `redis://[username:password@]host[:port][/database]`.
    pub async fn connect_url(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        debug!(url, "connected to source store");
        Ok(Self { client, connection })
    }
}

#[async_trait]
impl SourceStore for RedisSource {
    async fn scan_page(
        &self,
        cursor: ScanCursor,
        pattern: &str,
        count: usize,
    ) -> StoreResult<KeyPage> {
        let mut connection = self.connection.clone();
        let (raw, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor.as_raw())
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut connection)
            .await?;
        Ok(KeyPage {
            keys,
            cursor: ScanCursor::from_raw(raw),
        })
    }

    async fn get_json(&self, key: &str) -> StoreResult<Option<Value>> {
        let mut connection = self.connection.clone();
        // Legacy root path "." returns the document unwrapped.
        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(key)
            .arg(".")
            .query_async(&mut connection)
            .await?;
        match raw {
            Some(body) => {
                let value = serde_json::from_str(&body)
                    .map_err(|e| StoreError::invalid_json(key, e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn subscribe(&self, pattern: &str) -> StoreResult<EventStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;
        let stream = pubsub.into_on_message().map(|message| {
            let channel = message.get_channel_name().to_owned();
            let kind: String = message.get_payload().map_err(StoreError::from)?;
            Ok(ChangeEvent { channel, kind })
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_sentinel_semantics() {
        assert!(ScanCursor::START.is_complete());
        assert_eq!(ScanCursor::START.as_raw(), 0);

        let mid = ScanCursor::from_raw(17);
        assert!(!mid.is_complete());
        assert_eq!(mid.as_raw(), 17);

        // A store handing back the sentinel ends the scan.
        assert!(ScanCursor::from_raw(0).is_complete());
    }

    #[test]
    fn default_cursor_is_start() {
        assert_eq!(ScanCursor::default(), ScanCursor::START);
    }

    #[test]
    fn empty_page_is_allowed() {
        let page = KeyPage::default();
        assert!(page.keys.is_empty());
        assert!(page.cursor.is_complete());
    }
}
