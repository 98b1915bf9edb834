//! # vconsync Store Clients
//!
//! Client abstractions for the two stores vconsync replicates between.
//!
//! This crate provides:
//! - [`SourceStore`]: paged keyspace scan, JSON value fetch, and change
//!   subscription against the source key-value store
//! - [`DestinationStore`]: idempotent full-document upsert against the
//!   destination document store
//! - [`RedisSource`] and [`MongoDestination`] production backends
//! - [`MemorySource`] and [`MemoryDestination`] in-memory doubles for tests
//!
//! ## Key invariants
//!
//! - A key is globally unique in both stores; the destination document
//!   identifier is the source key verbatim
//! - An absent value is an expected outcome of [`SourceStore::get_json`],
//!   never an error
//! - [`DestinationStore::upsert`] is a pure overwrite: repeating it with the
//!   same key and record leaves the destination unchanged

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dest;
mod error;
mod event;
mod memory;
mod source;

pub use dest::{DestinationStore, MongoDestination};
pub use error::{StoreError, StoreResult};
pub use event::ChangeEvent;
pub use memory::{MemoryDestination, MemorySource};
pub use source::{EventStream, KeyPage, RedisSource, ScanCursor, SourceStore};
