//! Background synchronization loop.

mod common;

use std::time::Duration;

use tempfile::TempDir;
use test_log::test;

use cadastre_core::{reconcile::Reconciler, service::SyncService};

use common::{asset, category, test_store, StubSource};

#[test(tokio::test)]
async fn spawned_loop_populates_the_store_and_shuts_down() {
    let temp = TempDir::new().unwrap();
    let store = test_store(&temp).await;
    let reconciler = Reconciler::new(store.clone(), vec!["Apartment".to_string()]);

    let apartment = category(1, "Apartment");
    let source = StubSource(vec![
        asset(11, "apt1", &apartment, &[]),
        asset(12, "apt2", &apartment, &[]),
    ]);

    let service = SyncService::spawn(source, reconciler, Duration::from_secs(3600));

    // The first run fires immediately; poll until it lands.
    let mut assets = Vec::new();
    for _ in 0..50 {
        assets = store.assets().await.unwrap();
        if !assets.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(assets.len(), 2);

    service.shutdown().await;
}

#[test(tokio::test)]
async fn run_once_reports_the_applied_delta() {
    let temp = TempDir::new().unwrap();
    let store = test_store(&temp).await;
    let reconciler = Reconciler::new(store.clone(), vec!["Apartment".to_string()]);

    let apartment = category(1, "Apartment");
    let source = StubSource(vec![asset(11, "apt1", &apartment, &[])]);
    let (_tx, cancel) = tokio::sync::watch::channel(false);

    let report = SyncService::run_once(&source, &reconciler, &cancel)
        .await
        .unwrap();
    assert_eq!(report.assets.created, 1);

    let again = SyncService::run_once(&source, &reconciler, &cancel)
        .await
        .unwrap();
    assert!(again.is_noop());
}

#[test(tokio::test)]
async fn cancelled_run_aborts_between_phases() {
    let temp = TempDir::new().unwrap();
    let store = test_store(&temp).await;
    let reconciler = Reconciler::new(store.clone(), vec!["Apartment".to_string()]);

    let apartment = category(1, "Apartment");
    let source = StubSource(vec![asset(11, "apt1", &apartment, &[])]);
    let (tx, cancel) = tokio::sync::watch::channel(false);
    tx.send(true).unwrap();

    let err = SyncService::run_once(&source, &reconciler, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, cadastre_core::CadastreError::Cancelled));
}
