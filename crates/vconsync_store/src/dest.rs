//! Destination store abstraction and the MongoDB backend.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection};
use serde_json::Value;
use tracing::debug;

/// Write access to the destination document store.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Idempotently writes `record` as the document identified by `id`,
    /// replacing any prior document with that identifier in full.
    ///
    /// Safe to call concurrently for disjoint ids and repeatedly for the
    /// same id; no partial merge, no versioning.
    async fn upsert(&self, id: &str, record: &Value) -> StoreResult<()>;
}

#[async_trait]
impl<T: DestinationStore + ?Sized> DestinationStore for std::sync::Arc<T> {
    async fn upsert(&self, id: &str, record: &Value) -> StoreResult<()> {
        (**self).upsert(id, record).await
    }
}

/// Destination store backed by a MongoDB collection.
///
/// The source key becomes the document `_id` verbatim, so both stores share
/// a primary-key space by construction.
pub struct MongoDestination {
    collection: Collection<Document>,
}

impl MongoDestination {
    /// Connects to MongoDB and binds the target collection.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let collection = client.database(database).collection::<Document>(collection);
        debug!(database, collection = collection.name(), "bound destination collection");
        Ok(Self { collection })
    }
}

#[async_trait]
impl DestinationStore for MongoDestination {
    async fn upsert(&self, id: &str, record: &Value) -> StoreResult<()> {
        let mut document = mongodb::bson::to_document(record)
            .map_err(|e| StoreError::record_not_document(id, e.to_string()))?;
        document.insert("_id", id);
        self.collection
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await?;
        Ok(())
    }
}
