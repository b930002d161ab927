//! Persisted catalog entities and the caller-facing asset view.
//!
//! `Category` and `Asset` mirror the two local tables. Local `id`s are
//! assigned by this service at insert time; `integration_id` is the
//! identifier the external catalog uses and only participates in
//! reconciliation equality checks. Callers never see it.

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use uuid::Uuid;

/// A recognized asset classification ("Apartment", "Complex", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub integration_id: Uuid,
    pub name: String,
    pub area_id: Uuid,
}

/// One unit of the mirrored catalog. `parents` holds local ids of the
/// assets this one belongs to; an asset may sit in several ownership
/// branches at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub integration_id: Uuid,
    pub name: String,
    pub area_id: Uuid,
    pub category_id: Uuid,
    pub parents: Vec<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Category fields exposed through the query surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: Uuid,
    pub name: String,
    pub area_id: Uuid,
}

/// Point-lookup view of one asset joined with its category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub id: Uuid,
    pub name: String,
    pub area_id: Uuid,
    pub parents: Vec<Uuid>,
    pub category: CategoryInfo,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<(Asset, Category)> for AssetInfo {
    fn from((asset, category): (Asset, Category)) -> AssetInfo {
        AssetInfo {
            id: asset.id,
            name: asset.name,
            area_id: asset.area_id,
            parents: asset.parents,
            category: CategoryInfo {
                id: category.id,
                name: category.name,
                area_id: category.area_id,
            },
            latitude: asset.latitude,
            longitude: asset.longitude,
        }
    }
}

fn decode_uuid(row: &SqliteRow, column: &str) -> sqlx::Result<Uuid> {
    let raw: &str = row.try_get(column)?;
    Uuid::parse_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl FromRow<'_, SqliteRow> for Category {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Category {
            id: decode_uuid(row, "id")?,
            integration_id: decode_uuid(row, "integration_id")?,
            name: row.try_get::<&str, _>("name")?.to_string(),
            area_id: decode_uuid(row, "area_id")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for Asset {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let parents_json: &str = row.try_get("parents")?;
        let parents: Vec<Uuid> =
            serde_json::from_str(parents_json).map_err(|e| sqlx::Error::ColumnDecode {
                index: "parents".to_string(),
                source: Box::new(e),
            })?;

        Ok(Asset {
            id: decode_uuid(row, "id")?,
            integration_id: decode_uuid(row, "integration_id")?,
            name: row.try_get::<&str, _>("name")?.to_string(),
            area_id: decode_uuid(row, "area_id")?,
            category_id: decode_uuid(row, "category_id")?,
            parents,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
        })
    }
}
