//! External catalog source contract.
//!
//! The authoritative service exposes a single operation: fetch the full
//! catalog snapshot. Each snapshot record embeds its category and carries
//! parent links expressed in the *external* identifier space; translation
//! into local identifiers happens in [`crate::reconcile`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CadastreError;

/// Category as the external service reports it. Parent category links are
/// part of the wire contract but are not persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: Uuid,
    pub name: String,
    pub area_id: Uuid,
    #[serde(default)]
    pub parents: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatesRecord {
    pub lat: f64,
    pub lng: f64,
    pub alt: f64,
}

/// Free-form named parameter attached to an external asset. Only the
/// coordinates of the first parameter survive into the local schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterRecord {
    pub id: Uuid,
    pub name: String,
    pub coordinates: CoordinatesRecord,
}

/// One asset in the external snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: Uuid,
    pub name: String,
    pub area_id: Uuid,
    #[serde(default)]
    pub parents: Vec<Uuid>,
    pub category: CategoryRecord,
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
}

impl AssetRecord {
    /// Geographic position of the asset, taken from the first parameter
    /// record when one is present.
    pub fn place(&self) -> (Option<f64>, Option<f64>) {
        match self.parameters.first() {
            Some(param) => (Some(param.coordinates.lat), Some(param.coordinates.lng)),
            None => (None, None),
        }
    }
}

/// Read side of the external catalog. There is deliberately no delta
/// protocol; every fetch returns the complete current catalog.
pub trait SnapshotSource: Send + Sync {
    fn fetch_snapshot(
        &self,
    ) -> impl Future<Output = Result<Vec<AssetRecord>, CadastreError>> + Send;
}

/// HTTP implementation of [`SnapshotSource`] against the authoritative
/// asset service.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CadastreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpSnapshotSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch_snapshot(
        &self,
    ) -> impl Future<Output = Result<Vec<AssetRecord>, CadastreError>> + Send {
        async move {
            let url = format!("{}/api/assets", self.base_url);
            tracing::debug!("Fetching catalog snapshot from {url}");
            let response = self.client.get(&url).send().await?.error_for_status()?;
            let snapshot = response.json::<Vec<AssetRecord>>().await?;
            tracing::debug!("Snapshot contains {} asset records", snapshot.len());
            Ok(snapshot)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_record_decodes_external_contract() {
        let raw = r#"{
            "id": "11111111-1111-1111-1111-111111111111",
            "name": "Building 4",
            "areaId": "22222222-2222-2222-2222-222222222222",
            "parents": ["33333333-3333-3333-3333-333333333333"],
            "category": {
                "id": "44444444-4444-4444-4444-444444444444",
                "name": "Building",
                "areaId": "22222222-2222-2222-2222-222222222222",
                "parents": []
            },
            "parameters": [
                {
                    "id": "55555555-5555-5555-5555-555555555555",
                    "name": "entrance",
                    "coordinates": { "lat": 59.93, "lng": 30.31, "alt": 12.0 }
                }
            ]
        }"#;

        let record: AssetRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.name, "Building 4");
        assert_eq!(record.parents.len(), 1);
        assert_eq!(record.category.name, "Building");
        assert_eq!(record.place(), (Some(59.93), Some(30.31)));
    }

    #[test]
    fn parameters_and_parents_default_to_empty() {
        let raw = r#"{
            "id": "11111111-1111-1111-1111-111111111111",
            "name": "Lone asset",
            "areaId": "22222222-2222-2222-2222-222222222222",
            "category": {
                "id": "44444444-4444-4444-4444-444444444444",
                "name": "Complex",
                "areaId": "22222222-2222-2222-2222-222222222222"
            }
        }"#;

        let record: AssetRecord = serde_json::from_str(raw).unwrap();
        assert!(record.parents.is_empty());
        assert_eq!(record.place(), (None, None));
    }
}
