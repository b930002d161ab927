//! Snapshot reconciliation.
//!
//! Brings the local `categories` and `assets` tables into agreement with a
//! full external snapshot using set-difference semantics over the external
//! identifiers: create what only the snapshot has, delete what only the
//! store has, overwrite the mutable fields of what both have. Categories
//! go first because assets reference them.
//!
//! Each of the six batch phases commits independently. A failure mid-run
//! leaves the phases that already committed in place; the next run
//! re-diffs from whatever state exists, so no checkpointing is needed and
//! a run repeated against an unchanged snapshot is a no-op.

use std::collections::{HashMap, HashSet};

use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    error::CadastreError,
    model::{Asset, Category},
    source::AssetRecord,
    store::CatalogStore,
};

/// Create/update/delete counts for one table in one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TableDelta {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl TableDelta {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub categories: TableDelta,
    pub assets: TableDelta,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.categories.is_noop() && self.assets.is_noop()
    }
}

struct DiffPlan<T> {
    create: Vec<T>,
    update: Vec<T>,
    delete: Vec<Uuid>,
}

impl<T> DiffPlan<T> {
    fn delta(&self) -> TableDelta {
        TableDelta {
            created: self.create.len(),
            updated: self.update.len(),
            deleted: self.delete.len(),
        }
    }
}

/// Three-way diff keyed by external identifier. Rows present on both
/// sides land in `update` only when their mutable fields differ, so an
/// unchanged snapshot plans zero operations.
fn plan<T, K, C>(incoming: Vec<T>, local: &[T], key: K, changed: C) -> DiffPlan<T>
where
    K: Fn(&T) -> Uuid,
    C: Fn(&T, &T) -> bool,
{
    let local_by_key: HashMap<Uuid, &T> = local.iter().map(|row| (key(row), row)).collect();
    let incoming_keys: HashSet<Uuid> = incoming.iter().map(&key).collect();

    let mut create = Vec::new();
    let mut update = Vec::new();
    for row in incoming {
        match local_by_key.get(&key(&row)) {
            None => create.push(row),
            Some(existing) if changed(&row, existing) => update.push(row),
            Some(_) => {}
        }
    }
    let delete = local
        .iter()
        .map(&key)
        .filter(|k| !incoming_keys.contains(k))
        .collect();

    DiffPlan {
        create,
        update,
        delete,
    }
}

fn category_changed(incoming: &Category, local: &Category) -> bool {
    incoming.name != local.name || incoming.area_id != local.area_id
}

fn asset_changed(incoming: &Asset, local: &Asset) -> bool {
    incoming.name != local.name
        || incoming.area_id != local.area_id
        || incoming.category_id != local.category_id
        || incoming.parents != local.parents
        || incoming.latitude != local.latitude
        || incoming.longitude != local.longitude
}

/// One representative per distinct external category id (first occurrence
/// wins), restricted to the recognized category names. Fresh local ids are
/// assigned here; update phases match on the external id and never touch
/// the local id column.
fn distinct_categories(snapshot: &[AssetRecord], allowed: &[String]) -> Vec<Category> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    snapshot
        .iter()
        .filter(|record| seen.insert(record.category.id))
        .filter(|record| allowed.contains(&record.category.name))
        .map(|record| Category {
            id: Uuid::new_v4(),
            integration_id: record.category.id,
            name: record.category.name.clone(),
            area_id: record.category.area_id,
        })
        .collect()
}

/// Map snapshot assets into local records. Assets whose category was
/// filtered out are silently dropped. Parent links arrive in the external
/// id space and are remapped to local asset ids; a parent that does not
/// resolve to an asset retained from this snapshot is dropped from the
/// list, so a parent leaving the catalog never lingers as a dangling
/// local reference.
fn map_assets(
    snapshot: &[AssetRecord],
    category_local_by_integration: &HashMap<Uuid, Uuid>,
    local_assets: &[Asset],
) -> Vec<Asset> {
    let existing: HashMap<Uuid, Uuid> = local_assets
        .iter()
        .map(|asset| (asset.integration_id, asset.id))
        .collect();

    let mut retained_ids: HashMap<Uuid, Uuid> = HashMap::new();
    let retained: Vec<(&AssetRecord, Uuid, Uuid)> = snapshot
        .iter()
        .filter_map(|record| {
            category_local_by_integration
                .get(&record.category.id)
                .map(|category_id| (record, *category_id))
        })
        .map(|(record, category_id)| {
            let local_id = existing
                .get(&record.id)
                .copied()
                .unwrap_or_else(Uuid::new_v4);
            retained_ids.insert(record.id, local_id);
            (record, category_id, local_id)
        })
        .collect();

    retained
        .into_iter()
        .map(|(record, category_id, local_id)| {
            let (latitude, longitude) = record.place();
            Asset {
                id: local_id,
                integration_id: record.id,
                name: record.name.clone(),
                area_id: record.area_id,
                category_id,
                parents: record
                    .parents
                    .iter()
                    .filter_map(|external| retained_ids.get(external).copied())
                    .collect(),
                latitude,
                longitude,
            }
        })
        .collect()
}

fn ensure_live(cancel: &watch::Receiver<bool>) -> Result<(), CadastreError> {
    if *cancel.borrow() {
        return Err(CadastreError::Cancelled);
    }
    Ok(())
}

/// Applies external snapshots to the catalog store.
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: CatalogStore,
    allowed_categories: Vec<String>,
}

impl Reconciler {
    pub fn new(store: CatalogStore, allowed_categories: Vec<String>) -> Reconciler {
        Reconciler {
            store,
            allowed_categories,
        }
    }

    pub async fn run(&self, snapshot: &[AssetRecord]) -> Result<SyncReport, CadastreError> {
        let (_tx, rx) = watch::channel(false);
        self.run_with_cancel(snapshot, &rx).await
    }

    /// Full reconciliation pass. `cancel` is checked between batch phases;
    /// cancellation aborts cleanly with already-committed phases left in
    /// place for the next run to re-diff against.
    pub async fn run_with_cancel(
        &self,
        snapshot: &[AssetRecord],
        cancel: &watch::Receiver<bool>,
    ) -> Result<SyncReport, CadastreError> {
        let incoming_categories = distinct_categories(snapshot, &self.allowed_categories);
        let local_categories = self.store.categories().await?;
        let category_plan = plan(
            incoming_categories,
            &local_categories,
            |c| c.integration_id,
            category_changed,
        );
        let categories_delta = category_plan.delta();

        tracing::info!(
            "Updating categories: {} to create, {} to delete, {} to update",
            categories_delta.created,
            categories_delta.deleted,
            categories_delta.updated
        );
        ensure_live(cancel)?;
        self.store.insert_categories(&category_plan.create).await?;
        ensure_live(cancel)?;
        self.store
            .delete_categories_by_integration(&category_plan.delete)
            .await?;
        ensure_live(cancel)?;
        self.store.update_categories(&category_plan.update).await?;

        // Re-read so freshly created categories contribute their local ids
        // to the asset mapping below.
        let refreshed = self.store.categories().await?;
        let category_local_by_integration: HashMap<Uuid, Uuid> = refreshed
            .iter()
            .map(|category| (category.integration_id, category.id))
            .collect();

        let local_assets = self.store.assets().await?;
        let incoming_assets = map_assets(snapshot, &category_local_by_integration, &local_assets);
        let asset_plan = plan(
            incoming_assets,
            &local_assets,
            |a| a.integration_id,
            asset_changed,
        );
        let assets_delta = asset_plan.delta();

        tracing::info!(
            "Updating assets: {} to create, {} to delete, {} to update",
            assets_delta.created,
            assets_delta.deleted,
            assets_delta.updated
        );
        ensure_live(cancel)?;
        self.store.insert_assets(&asset_plan.create).await?;
        ensure_live(cancel)?;
        self.store
            .delete_assets_by_integration(&asset_plan.delete)
            .await?;
        ensure_live(cancel)?;
        self.store.update_assets(&asset_plan.update).await?;

        Ok(SyncReport {
            categories: categories_delta,
            assets: assets_delta,
        })
    }
}
