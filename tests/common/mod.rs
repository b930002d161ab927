//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::future::Future;

use tempfile::TempDir;
use uuid::Uuid;

use cadastre_core::{
    config::CadastreConfig,
    error::CadastreError,
    source::{AssetRecord, CategoryRecord, SnapshotSource},
    store::{db_init, CatalogStore, CATALOG_DB},
};

/// In-memory snapshot source returning a fixed record set.
pub struct StubSource(pub Vec<AssetRecord>);

impl SnapshotSource for StubSource {
    fn fetch_snapshot(
        &self,
    ) -> impl Future<Output = Result<Vec<AssetRecord>, CadastreError>> + Send {
        let snapshot = self.0.clone();
        async move { Ok(snapshot) }
    }
}

/// Deterministic external id from a small integer.
#[allow(dead_code)]
pub fn eid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

#[allow(dead_code)]
pub fn category(n: u128, name: &str) -> CategoryRecord {
    CategoryRecord {
        id: eid(n),
        name: name.to_string(),
        area_id: eid(0xA0EA),
        parents: Vec::new(),
    }
}

#[allow(dead_code)]
pub fn asset(n: u128, name: &str, category: &CategoryRecord, parents: &[u128]) -> AssetRecord {
    AssetRecord {
        id: eid(n),
        name: name.to_string(),
        area_id: eid(0xA0EA),
        parents: parents.iter().map(|p| eid(*p)).collect(),
        category: category.clone(),
        parameters: Vec::new(),
    }
}

/// Fresh store backed by a sqlite file under `temp`.
#[allow(dead_code)]
pub async fn test_store(temp: &TempDir) -> CatalogStore {
    let pool = db_init(temp.path().join(CATALOG_DB)).await.unwrap();
    CatalogStore(pool)
}

#[allow(dead_code)]
pub fn test_config() -> CadastreConfig {
    CadastreConfig {
        source_host: "http://localhost".to_string(),
        ..CadastreConfig::default()
    }
}
