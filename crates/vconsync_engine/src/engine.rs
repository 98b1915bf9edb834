//! Orchestration: scan first, then listen.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::listener::{ChangeListener, ListenerState, ListenerStats};
use crate::reconciler::{Reconciler, ScanReport};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vconsync_store::{DestinationStore, SourceStore};

/// Handle to the background change-listener task.
///
/// The engine owns one of these for the process lifetime; [`stop`]
/// cancels the task and waits for it to wind down, [`join`] waits for it to
/// finish on its own (normally only on a subscription fault).
///
/// [`stop`]: ListenerHandle::stop
/// [`join`]: ListenerHandle::join
pub struct ListenerHandle {
    task: JoinHandle<EngineResult<()>>,
    cancel: CancellationToken,
}

impl ListenerHandle {
    /// Requests cancellation and waits for the task to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }

    /// Waits for the task to finish on its own.
    pub async fn join(self) -> EngineResult<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::SubscriptionLost(e.to_string())),
        }
    }
}

/// The replication engine: one reconciliation scan, then a live listener.
///
/// Owns both the [`Reconciler`] and the [`ChangeListener`] and enforces the
/// sequencing contract: the full scan completes before the listener
/// subscribes, so the baseline is well-defined before incremental updates
/// apply. A mutation during the scan is covered either by the scan itself
/// or by the listener afterwards; at worst it is written twice, which the
/// idempotent upsert absorbs.
pub struct SyncEngine<S, D> {
    config: EngineConfig,
    source: Arc<S>,
    destination: Arc<D>,
    listener: Arc<ChangeListener<S, D>>,
}

impl<S, D> SyncEngine<S, D>
where
    S: SourceStore + 'static,
    D: DestinationStore + 'static,
{
    /// Creates an engine over the two stores.
    pub fn new(config: EngineConfig, source: S, destination: D) -> Self {
        let source = Arc::new(source);
        let destination = Arc::new(destination);
        let listener = Arc::new(ChangeListener::new(
            config.clone(),
            Arc::clone(&source),
            Arc::clone(&destination),
        ));
        Self {
            config,
            source,
            destination,
            listener,
        }
    }

    /// Lifecycle state of the change listener.
    pub fn listener_state(&self) -> ListenerState {
        self.listener.state()
    }

    /// Activity counters of the change listener.
    pub fn listener_stats(&self) -> ListenerStats {
        self.listener.stats()
    }

    /// Runs the baseline reconciliation scan to completion.
    pub async fn reconcile(&self) -> EngineResult<ScanReport> {
        let reconciler = Reconciler::new(
            self.config.clone(),
            Arc::clone(&self.source),
            Arc::clone(&self.destination),
        );
        reconciler.run().await
    }

    /// Spawns the change listener as a background task.
    ///
    /// Must only be called after [`reconcile`](SyncEngine::reconcile) has
    /// completed; [`run`](SyncEngine::run) enforces this ordering.
    pub fn spawn_listener(&self) -> ListenerHandle {
        let cancel = CancellationToken::new();
        let listener = Arc::clone(&self.listener);
        let token = cancel.clone();
        let task = tokio::spawn(async move { listener.run(token).await });
        ListenerHandle { task, cancel }
    }

    /// Runs the full engine: reconcile, listen, then idle until `shutdown`
    /// resolves.
    ///
    /// A listener fault is logged and absorbed: the engine keeps waiting for
    /// shutdown without live updates, leaving the restart decision to the
    /// operator (no internal reconnect). Shutdown cancels the listener task
    /// without waiting for an in-flight event.
    pub async fn run<F>(&self, shutdown: F) -> EngineResult<ScanReport>
    where
        F: Future<Output = ()>,
    {
        let report = self.reconcile().await?;

        let ListenerHandle { mut task, cancel } = self.spawn_listener();
        tokio::pin!(shutdown);

        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, stopping change listener");
                cancel.cancel();
                let _ = (&mut task).await;
                return Ok(report);
            }
            result = &mut task => {
                match result {
                    Ok(Ok(())) => info!("change listener exited"),
                    Ok(Err(e)) => {
                        error!(error = %e, "change listener terminated, live updates stopped");
                    }
                    Err(e) => error!(error = %e, "change listener task failed"),
                }
            }
        }

        // Listener is gone; stay alive so the operator decides when to
        // restart the process.
        shutdown.await;
        info!("shutdown requested");
        Ok(report)
    }
}
