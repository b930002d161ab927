//! `cadastre-core` maintains a local SQLite mirror of a hierarchical asset
//! catalog owned by an external authoritative service and answers
//! structural queries against the mirror.
//!
//! The write side is a periodic full-snapshot reconciliation
//! ([`service::SyncService`] driving [`reconcile::Reconciler`]): the
//! external catalog is fetched whole, diffed against the local tables on
//! the external identifiers, and applied as minimal create, delete, and
//! update batches. The read side ([`query::QueryService`]) climbs the
//! multi-parent ownership graph from leaf units up to top-level roots
//! ([`structure::build_forest`]) and decorates each root with its
//! auxiliary assets.

pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod reconcile;
pub mod service;
pub mod source;
pub mod store;
pub mod structure;

pub use error::CadastreError;
