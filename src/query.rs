//! Read-side queries over the mirrored catalog.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    config::CadastreConfig,
    error::CadastreError,
    model::AssetInfo,
    store::CatalogStore,
    structure::{build_forest, TreeNode},
};

/// Answers structural queries against the local mirror. Holds the category
/// policy (which category counts as a leaf unit, which categories augment
/// roots) resolved from configuration at construction.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: CatalogStore,
    leaf_category: String,
    auxiliary_categories: Vec<String>,
}

impl QueryService {
    pub fn new(store: CatalogStore, config: &CadastreConfig) -> QueryService {
        QueryService {
            store,
            leaf_category: config.leaf_category.clone(),
            auxiliary_categories: config.auxiliary_categories.clone(),
        }
    }

    /// Ownership forest for a set of leaf-unit asset ids, climbed to the
    /// top-level roots, with auxiliary assets (grounds owned by the root)
    /// attached to each root as leaf children.
    ///
    /// Duplicated ids are collapsed. Every id must name an existing asset
    /// of the leaf category; any that do not fail the whole query with
    /// [`CadastreError::NotFound`] listing the offenders.
    pub async fn get_structure(&self, ids: &[Uuid]) -> Result<Vec<TreeNode>, CadastreError> {
        if ids.is_empty() {
            return Err(CadastreError::Validation(
                "at least one asset id is required".to_string(),
            ));
        }
        let mut seen: HashSet<Uuid> = HashSet::new();
        let ids: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let leaves = self
            .store
            .assets_in_category(&ids, &self.leaf_category)
            .await?;
        let unknown: Vec<String> = ids
            .iter()
            .filter(|id| !leaves.contains(id))
            .map(ToString::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(CadastreError::NotFound(format!(
                "no '{}' asset with id(s) {}",
                self.leaf_category,
                unknown.join(", ")
            )));
        }

        let asset_by_id = self.store.asset_map().await?;
        let start_parents: Vec<(Uuid, Vec<Uuid>)> = ids
            .iter()
            .map(|id| {
                asset_by_id
                    .get(id)
                    .map(|asset| (*id, asset.parents.clone()))
                    .ok_or_else(|| CadastreError::NotFound(format!("no asset with id {id}")))
            })
            .collect::<Result<_, _>>()?;
        let mut forest = build_forest(&asset_by_id, &start_parents)?;

        let auxiliary_ids = self
            .store
            .category_ids_by_names(&self.auxiliary_categories)
            .await?;
        for root in &mut forest {
            let auxiliary = self
                .store
                .assets_by_parent_and_categories(root.id, &auxiliary_ids)
                .await?;
            root.children
                .extend(auxiliary.into_iter().map(|a| TreeNode::leaf(a.id, a.name)));
        }
        Ok(forest)
    }

    /// Point lookup of one asset joined with its category.
    pub async fn get_asset_info(&self, id: Uuid) -> Result<AssetInfo, CadastreError> {
        self.store
            .asset_with_category(id)
            .await?
            .map(AssetInfo::from)
            .ok_or_else(|| CadastreError::NotFound(format!("no asset with id {id}")))
    }
}
