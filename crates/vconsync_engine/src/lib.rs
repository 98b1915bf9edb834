//! # vconsync Engine
//!
//! The replication core: keeps a destination document store eventually
//! consistent with a namespaced, JSON-valued subset of a source key-value
//! store.
//!
//! This crate provides:
//! - [`Reconciler`]: one-shot full keyspace scan establishing the
//!   destination baseline
//! - [`ChangeListener`]: keyspace-notification subscriber keeping the
//!   baseline current
//! - [`SyncEngine`]: scan-first-then-listen orchestration and listener
//!   supervision
//! - [`EngineConfig`]: key prefix, database index and scan page size
//!
//! ## Key invariants
//!
//! - The reconciliation scan completes before the listener subscribes, so
//!   the baseline is well-defined before incremental updates apply
//! - Both paths converge on the same idempotent upsert; a mutation observed
//!   by both is harmlessly written twice
//! - Failures are contained per key and per event and never abort the scan
//!   or the subscription
//! - Every event re-fetches the key's current value, so out-of-order
//!   delivery cannot produce a stale overwrite

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod engine;
mod error;
mod listener;
mod reconciler;

pub use channel::key_from_channel;
pub use config::{EngineConfig, DEFAULT_KEY_PREFIX};
pub use engine::{ListenerHandle, SyncEngine};
pub use error::{EngineError, EngineResult};
pub use listener::{ChangeListener, ListenerState, ListenerStats, WriteKind};
pub use reconciler::{Reconciler, ScanReport};
