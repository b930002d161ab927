//! Ancestor-forest construction over the multi-parent asset graph.
//!
//! Assets form a DAG: each asset lists the ids of the assets that own it,
//! and an asset may belong to several ownership branches. Given a set of
//! starting assets, [`build_forest`] climbs every parent edge until it
//! reaches assets with no further parents and returns those as roots.
//!
//! The builder is an explicit work queue over an arena of in-progress
//! nodes keyed by asset id. A node for a given id is created at most once
//! per run, so converging paths (two apartments under one complex, a
//! ground shared by two buildings) collapse into one shared subtree
//! instead of duplicating it. The parent relation is assumed acyclic; a
//! cycle in the catalog would not terminate here.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::CadastreError, model::Asset};

/// Query-time tree node. Built fresh per query, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: Uuid,
    pub name: String,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(id: Uuid, name: String) -> TreeNode {
        TreeNode {
            id,
            name,
            children: Vec::new(),
        }
    }
}

struct PendingNode {
    name: String,
    children: Vec<Uuid>,
}

fn asset_name(asset_by_id: &HashMap<Uuid, Asset>, id: Uuid) -> Result<String, CadastreError> {
    asset_by_id
        .get(&id)
        .map(|asset| asset.name.clone())
        .ok_or_else(|| {
            CadastreError::NotFound(format!(
                "asset {id} is referenced in the catalog hierarchy but missing from the asset map"
            ))
        })
}

/// Build the forest of ancestor trees for `start_parents`, a list of
/// `(starting asset id, its immediate parent ids)` pairs. `asset_by_id`
/// must contain every asset reachable by climbing parent links.
///
/// Roots come out in the order the climb completes them; each starting
/// asset is reachable from exactly one root.
pub fn build_forest(
    asset_by_id: &HashMap<Uuid, Asset>,
    start_parents: &[(Uuid, Vec<Uuid>)],
) -> Result<Vec<TreeNode>, CadastreError> {
    let mut arena: HashMap<Uuid, PendingNode> = HashMap::new();
    let mut queue: VecDeque<(Uuid, Option<Uuid>)> = VecDeque::new();

    for (child_id, parent_ids) in start_parents {
        let name = asset_name(asset_by_id, *child_id)?;
        arena.entry(*child_id).or_insert(PendingNode {
            name,
            children: Vec::new(),
        });

        if parent_ids.is_empty() {
            // Nothing to climb; the starting asset is its own root.
            queue.push_back((*child_id, None));
            continue;
        }
        for parent_id in parent_ids {
            attach(&mut arena, &mut queue, asset_by_id, *parent_id, *child_id)?;
        }
    }

    let mut roots: Vec<Uuid> = Vec::new();
    let mut emitted: HashSet<Uuid> = HashSet::new();
    let mut emit = |roots: &mut Vec<Uuid>, emitted: &mut HashSet<Uuid>, id: Uuid| {
        if emitted.insert(id) {
            roots.push(id);
        }
    };

    while let Some((node_id, maybe_parent)) = queue.pop_front() {
        let Some(parent_id) = maybe_parent else {
            emit(&mut roots, &mut emitted, node_id);
            continue;
        };

        let grandparent_ids = asset_by_id
            .get(&parent_id)
            .map(|asset| asset.parents.clone())
            .ok_or_else(|| {
                CadastreError::NotFound(format!(
                    "asset {parent_id} is referenced in the catalog hierarchy but missing from the asset map"
                ))
            })?;

        if grandparent_ids.is_empty() {
            emit(&mut roots, &mut emitted, parent_id);
            continue;
        }
        for grandparent_id in grandparent_ids {
            attach(&mut arena, &mut queue, asset_by_id, grandparent_id, parent_id)?;
        }
    }

    Ok(roots
        .into_iter()
        .map(|root| materialize(&arena, root))
        .collect())
}

/// Record `child_id` under `parent_id`, creating the parent's pending node
/// on first sight. Only a freshly created parent is enqueued to climb
/// further; an id already in the arena has its climb scheduled or done, so
/// converging paths of any depth merge into it instead of re-climbing.
fn attach(
    arena: &mut HashMap<Uuid, PendingNode>,
    queue: &mut VecDeque<(Uuid, Option<Uuid>)>,
    asset_by_id: &HashMap<Uuid, Asset>,
    parent_id: Uuid,
    child_id: Uuid,
) -> Result<(), CadastreError> {
    match arena.get_mut(&parent_id) {
        Some(pending) => {
            if !pending.children.contains(&child_id) {
                pending.children.push(child_id);
            }
        }
        None => {
            let name = asset_name(asset_by_id, parent_id)?;
            arena.insert(
                parent_id,
                PendingNode {
                    name,
                    children: vec![child_id],
                },
            );
            queue.push_back((child_id, Some(parent_id)));
        }
    }
    Ok(())
}

fn materialize(arena: &HashMap<Uuid, PendingNode>, id: Uuid) -> TreeNode {
    let Some(pending) = arena.get(&id) else {
        debug_assert!(false, "arena is missing node {id}");
        return TreeNode::leaf(id, String::new());
    };
    TreeNode {
        id,
        name: pending.name.clone(),
        children: pending
            .children
            .iter()
            .map(|child| materialize(arena, *child))
            .collect(),
    }
}
