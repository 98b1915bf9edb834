//! Baseline reconciliation scan.

use crate::config::EngineConfig;
use crate::error::EngineResult;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use vconsync_store::{DestinationStore, ScanCursor, SourceStore};

/// Outcome of one full reconciliation scan.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Keys yielded by the scan cursor. Duplicates under concurrent
    /// mutation are counted once per sighting.
    pub keys_scanned: u64,
    /// Keys whose value was written to the destination.
    pub upserted: u64,
    /// Keys that had no JSON value by fetch time.
    pub missing: u64,
    /// Keys whose fetch or upsert failed.
    pub failed: u64,
    /// Wall time of the scan.
    pub duration: Duration,
}

/// Establishes or repairs the destination baseline from the full source
/// keyspace, once, synchronously.
///
/// Each key is an independent unit of work: a failed fetch or upsert is
/// logged and counted but never aborts the scan. There is no retry within a
/// run; the next reconciliation naturally retries failed keys.
pub struct Reconciler<S, D> {
    config: EngineConfig,
    source: Arc<S>,
    destination: Arc<D>,
}

impl<S: SourceStore, D: DestinationStore> Reconciler<S, D> {
    /// Creates a reconciler over the two stores.
    pub fn new(config: EngineConfig, source: Arc<S>, destination: Arc<D>) -> Self {
        Self {
            config,
            source,
            destination,
        }
    }

    /// Runs the scan to completion.
    ///
    /// Only a failed page request is fatal, since the cursor cannot advance
    /// without one. An empty keyspace is a zero-iteration success.
    pub async fn run(&self) -> EngineResult<ScanReport> {
        let start = Instant::now();
        let pattern = self.config.scan_pattern();
        info!(pattern = %pattern, "starting reconciliation scan");

        let mut report = ScanReport::default();
        let mut cursor = ScanCursor::START;
        loop {
            let page = self
                .source
                .scan_page(cursor, &pattern, self.config.scan_page_size)
                .await?;
            for key in &page.keys {
                report.keys_scanned += 1;
                self.sync_key(key, &mut report).await;
            }
            cursor = page.cursor;
            if cursor.is_complete() {
                break;
            }
        }

        report.duration = start.elapsed();
        info!(
            scanned = report.keys_scanned,
            upserted = report.upserted,
            missing = report.missing,
            failed = report.failed,
            "reconciliation scan finished"
        );
        Ok(report)
    }

    async fn sync_key(&self, key: &str, report: &mut ScanReport) {
        match self.source.get_json(key).await {
            Ok(Some(value)) => match self.destination.upsert(key, &value).await {
                Ok(()) => {
                    report.upserted += 1;
                    info!(key, "synchronized key");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(key, error = %e, "failed to upsert key");
                }
            },
            Ok(None) => {
                report.missing += 1;
                warn!(key, "key has no JSON value");
            }
            Err(e) => {
                report.failed += 1;
                error!(key, error = %e, "failed to read key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vconsync_store::{MemoryDestination, MemorySource};

    fn reconciler(
        source: &Arc<MemorySource>,
        destination: &Arc<MemoryDestination>,
    ) -> Reconciler<MemorySource, MemoryDestination> {
        Reconciler::new(
            EngineConfig::default().with_scan_page_size(2),
            Arc::clone(source),
            Arc::clone(destination),
        )
    }

    #[tokio::test]
    async fn baseline_completeness() {
        let source = Arc::new(MemorySource::new());
        let destination = Arc::new(MemoryDestination::new());
        for i in 0..5 {
            source.set_json(&format!("vcon:{i}"), json!({ "i": i }));
        }
        source.set_json("other:ignored", json!({ "x": true }));

        let report = reconciler(&source, &destination).run().await.unwrap();

        assert_eq!(report.keys_scanned, 5);
        assert_eq!(report.upserted, 5);
        assert_eq!(report.failed, 0);
        assert_eq!(destination.len(), 5);
        for i in 0..5 {
            assert_eq!(
                destination.get(&format!("vcon:{i}")).unwrap(),
                json!({ "i": i })
            );
        }
        assert!(destination.get("other:ignored").is_none());
    }

    #[tokio::test]
    async fn empty_keyspace_is_success() {
        let source = Arc::new(MemorySource::new());
        let destination = Arc::new(MemoryDestination::new());

        let report = reconciler(&source, &destination).run().await.unwrap();

        assert_eq!(report.keys_scanned, 0);
        assert_eq!(report.upserted, 0);
        assert!(destination.is_empty());
    }

    #[tokio::test]
    async fn per_key_failure_does_not_abort_scan() {
        let source = Arc::new(MemorySource::new());
        let destination = Arc::new(MemoryDestination::new());
        for i in 0..4 {
            source.set_json(&format!("vcon:{i}"), json!({ "i": i }));
        }
        destination.fail_on("vcon:1");

        let report = reconciler(&source, &destination).run().await.unwrap();

        assert_eq!(report.keys_scanned, 4);
        assert_eq!(report.upserted, 3);
        assert_eq!(report.failed, 1);
        assert!(destination.get("vcon:1").is_none());
        assert!(destination.get("vcon:3").is_some());
    }

    #[tokio::test]
    async fn absent_key_is_skipped_without_upsert() {
        let source = Arc::new(MemorySource::new());
        let destination = Arc::new(MemoryDestination::new());
        source.set_json("vcon:present", json!({ "ok": true }));
        source.set_phantom("vcon:gone");

        let report = reconciler(&source, &destination).run().await.unwrap();

        assert_eq!(report.keys_scanned, 2);
        assert_eq!(report.upserted, 1);
        assert_eq!(report.missing, 1);
        assert_eq!(destination.upsert_count(), 1);
        assert!(destination.get("vcon:gone").is_none());
    }
}
