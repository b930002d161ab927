//! Periodic synchronization driver.
//!
//! One tokio task owns the fetch-and-reconcile loop, so at most one run is
//! ever in flight. The interval uses [`MissedTickBehavior::Delay`], which
//! makes a run that overshoots its period push the next tick out instead
//! of firing a burst of catch-up runs.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::{
    error::CadastreError,
    reconcile::{Reconciler, SyncReport},
    source::SnapshotSource,
};

/// Handle to the background synchronization task.
pub struct SyncService {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SyncService {
    /// Spawn the loop. The first run starts immediately, subsequent runs
    /// fire once per `period`.
    pub fn spawn<S>(source: S, reconciler: Reconciler, period: Duration) -> SyncService
    where
        S: SnapshotSource + 'static,
    {
        let (shutdown, stop) = watch::channel(false);
        let handle = tokio::spawn(run_loop(source, reconciler, period, stop));
        SyncService { shutdown, handle }
    }

    /// Single fetch-and-reconcile pass, usable outside the loop (startup
    /// priming, tests). `cancel` is forwarded to the reconciler and checked
    /// between its batch phases.
    pub async fn run_once<S: SnapshotSource>(
        source: &S,
        reconciler: &Reconciler,
        cancel: &watch::Receiver<bool>,
    ) -> Result<SyncReport, CadastreError> {
        let snapshot = source.fetch_snapshot().await?;
        reconciler.run_with_cancel(&snapshot, cancel).await
    }

    /// Signal the loop to stop and wait for it to wind down. An in-flight
    /// run finishes its current batch phase and then aborts.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn run_loop<S: SnapshotSource>(
    source: S,
    reconciler: Reconciler,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let cancel = stop.clone();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match SyncService::run_once(&source, &reconciler, &cancel).await {
                    Ok(report) if report.is_noop() => {
                        tracing::debug!("Catalog already current");
                    }
                    Ok(report) => {
                        tracing::info!(?report, "Catalog synchronized");
                    }
                    Err(CadastreError::Cancelled) => {
                        tracing::info!("Synchronization cancelled by shutdown");
                        return;
                    }
                    Err(err) => {
                        // Abandon the run; the next tick re-diffs from
                        // whatever state the store is in.
                        tracing::error!("Synchronization run failed: {err}");
                    }
                }
            }
            _ = stop.changed() => {
                if *stop.borrow() {
                    tracing::debug!("Synchronization loop shutting down");
                    return;
                }
            }
        }
    }
}
