//! SQLite-backed catalog store.
//!
//! Keyed CRUD over the `categories` and `assets` tables with the batch
//! operations the reconciler needs and the membership filters the query
//! service needs. Asset rows cascade-delete with their category; foreign
//! keys are enabled on every connection.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

use futures_core::future::BoxFuture;
use sqlx::{
    error::BoxDynError,
    migrate::{
        MigrateDatabase, Migration as SqlxMigration, MigrationSource, MigrationType, Migrator,
    },
    sqlite::{Sqlite, SqliteConnectOptions},
    ConnectOptions, Pool, QueryBuilder,
};
use uuid::Uuid;

use crate::{
    error::CadastreError,
    model::{Asset, Category},
};

pub const CATALOG_DB: &str = "catalog_mirror.db";

/// Stay well under SQLite's bound-variable ceiling when batching rows.
///
/// <https://www.sqlite.org/limits.html#max_variable_number>
const BATCH_ROWS: usize = 1000;

#[derive(Debug, Clone)]
pub struct CatalogStore(pub Pool<Sqlite>);

fn push_uuid_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
}

fn parents_json(parents: &[Uuid]) -> Result<String, CadastreError> {
    Ok(serde_json::to_string(parents)?)
}

impl CatalogStore {
    pub async fn categories(&self) -> Result<Vec<Category>, CadastreError> {
        Ok(sqlx::query_as::<_, Category>("SELECT * FROM categories")
            .fetch_all(&self.0)
            .await?)
    }

    pub async fn assets(&self) -> Result<Vec<Asset>, CadastreError> {
        Ok(sqlx::query_as::<_, Asset>("SELECT * FROM assets")
            .fetch_all(&self.0)
            .await?)
    }

    /// Full id-keyed asset map, the tree builder's lookup structure.
    pub async fn asset_map(&self) -> Result<HashMap<Uuid, Asset>, CadastreError> {
        Ok(self
            .assets()
            .await?
            .into_iter()
            .map(|asset| (asset.id, asset))
            .collect())
    }

    pub async fn asset_with_category(
        &self,
        id: Uuid,
    ) -> Result<Option<(Asset, Category)>, CadastreError> {
        let asset = sqlx::query_as::<_, Asset>("SELECT * FROM assets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.0)
            .await?;
        let Some(asset) = asset else {
            return Ok(None);
        };
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(asset.category_id.to_string())
            .fetch_one(&self.0)
            .await?;
        Ok(Some((asset, category)))
    }

    /// Of `ids`, the subset that exists as an asset of the named category.
    pub async fn assets_in_category(
        &self,
        ids: &[Uuid],
        category_name: &str,
    ) -> Result<HashSet<Uuid>, CadastreError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT assets.id FROM assets \
             JOIN categories ON categories.id = assets.category_id \
             WHERE categories.name = ",
        );
        qb.push_bind(category_name.to_string());
        qb.push(" AND assets.id IN (");
        push_uuid_list(&mut qb, ids);
        qb.push(")");

        let rows: Vec<(String,)> = qb.build_query_as().fetch_all(&self.0).await?;
        rows.into_iter()
            .map(|(raw,)| Uuid::parse_str(&raw).map_err(CadastreError::from))
            .collect()
    }

    pub async fn category_ids_by_names(
        &self,
        names: &[String],
    ) -> Result<Vec<Uuid>, CadastreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM categories WHERE name IN (");
        let mut separated = qb.separated(", ");
        for name in names {
            separated.push_bind(name.clone());
        }
        qb.push(")");

        let rows: Vec<(String,)> = qb.build_query_as().fetch_all(&self.0).await?;
        rows.into_iter()
            .map(|(raw,)| Uuid::parse_str(&raw).map_err(CadastreError::from))
            .collect()
    }

    /// Assets whose parent list contains `parent_id` and whose category is
    /// one of `category_ids`. Parent membership is evaluated with SQLite's
    /// `json_each` over the stored JSON array.
    pub async fn assets_by_parent_and_categories(
        &self,
        parent_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<Vec<Asset>, CadastreError> {
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT assets.* FROM assets, json_each(assets.parents) \
             WHERE json_each.value = ",
        );
        qb.push_bind(parent_id.to_string());
        qb.push(" AND assets.category_id IN (");
        push_uuid_list(&mut qb, category_ids);
        qb.push(")");

        Ok(qb.build_query_as::<Asset>().fetch_all(&self.0).await?)
    }

    pub async fn insert_categories(&self, rows: &[Category]) -> Result<(), CadastreError> {
        for chunk in rows.chunks(BATCH_ROWS) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO categories (id, integration_id, name, area_id) ",
            );
            qb.push_values(chunk, |mut b, category| {
                b.push_bind(category.id.to_string())
                    .push_bind(category.integration_id.to_string())
                    .push_bind(category.name.clone())
                    .push_bind(category.area_id.to_string());
            });
            qb.build().execute(&self.0).await?;
        }
        Ok(())
    }

    pub async fn delete_categories_by_integration(
        &self,
        integration_ids: &[Uuid],
    ) -> Result<(), CadastreError> {
        if integration_ids.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM categories WHERE integration_id IN (");
        push_uuid_list(&mut qb, integration_ids);
        qb.push(")");
        qb.build().execute(&self.0).await?;
        Ok(())
    }

    /// Overwrite the mutable category fields, matching rows on the external
    /// identifier.
    pub async fn update_categories(&self, rows: &[Category]) -> Result<(), CadastreError> {
        for category in rows {
            sqlx::query("UPDATE categories SET name = ?, area_id = ? WHERE integration_id = ?")
                .bind(category.name.clone())
                .bind(category.area_id.to_string())
                .bind(category.integration_id.to_string())
                .execute(&self.0)
                .await?;
        }
        Ok(())
    }

    pub async fn insert_assets(&self, rows: &[Asset]) -> Result<(), CadastreError> {
        for chunk in rows.chunks(BATCH_ROWS) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO assets \
                 (id, integration_id, name, area_id, category_id, parents, latitude, longitude) ",
            );
            // push_values closures cannot bubble errors, so parent lists are
            // serialized up front.
            let mut encoded = Vec::with_capacity(chunk.len());
            for asset in chunk {
                encoded.push((asset, parents_json(&asset.parents)?));
            }
            qb.push_values(encoded, |mut b, (asset, parents)| {
                b.push_bind(asset.id.to_string())
                    .push_bind(asset.integration_id.to_string())
                    .push_bind(asset.name.clone())
                    .push_bind(asset.area_id.to_string())
                    .push_bind(asset.category_id.to_string())
                    .push_bind(parents)
                    .push_bind(asset.latitude)
                    .push_bind(asset.longitude);
            });
            qb.build().execute(&self.0).await?;
        }
        Ok(())
    }

    pub async fn delete_assets_by_integration(
        &self,
        integration_ids: &[Uuid],
    ) -> Result<(), CadastreError> {
        if integration_ids.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM assets WHERE integration_id IN (");
        push_uuid_list(&mut qb, integration_ids);
        qb.push(")");
        qb.build().execute(&self.0).await?;
        Ok(())
    }

    /// Overwrite the mutable asset fields, matching rows on the external
    /// identifier.
    pub async fn update_assets(&self, rows: &[Asset]) -> Result<(), CadastreError> {
        for asset in rows {
            sqlx::query(
                "UPDATE assets SET name = ?, area_id = ?, category_id = ?, parents = ?, \
                 latitude = ?, longitude = ? WHERE integration_id = ?",
            )
            .bind(asset.name.clone())
            .bind(asset.area_id.to_string())
            .bind(asset.category_id.to_string())
            .bind(parents_json(&asset.parents)?)
            .bind(asset.latitude)
            .bind(asset.longitude)
            .bind(asset.integration_id.to_string())
            .execute(&self.0)
            .await?;
        }
        Ok(())
    }
}

/// A migration definition.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
    pub kind: MigrationType,
}

#[derive(Debug, Clone)]
struct MigrationList(Vec<Migration>);

impl MigrationSource<'static> for MigrationList {
    fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
        Box::pin(async move {
            let mut migrations = Vec::new();
            for migration in self.0 {
                migrations.push(SqlxMigration::new(
                    migration.version,
                    migration.description.into(),
                    migration.kind,
                    migration.sql.into(),
                    false,
                ));
            }
            Ok(migrations)
        })
    }
}

pub async fn db_init(db_path: PathBuf) -> Result<Pool<Sqlite>, sqlx::Error> {
    let fqdb = format!("sqlite:{}", db_path.display());
    tracing::debug!("Initializing catalog db from file: {:?}", fqdb);
    if !Sqlite::database_exists(&fqdb).await.unwrap_or(false) {
        Sqlite::create_database(&fqdb).await?;
    }
    let options = SqliteConnectOptions::from_str(&fqdb)?
        .read_only(false)
        .foreign_keys(true)
        .disable_statement_logging()
        .create_if_missing(true);
    let pool = Pool::<Sqlite>::connect_with(options).await?;

    let migrations = MigrationList(vec![
        Migration {
            version: 1,
            description: "create_catalog_tables",
            sql: "\
            CREATE TABLE categories (\
                id TEXT PRIMARY KEY, \
                integration_id TEXT NOT NULL UNIQUE, \
                name TEXT NOT NULL, \
                area_id TEXT NOT NULL); \
            CREATE TABLE assets (\
                id TEXT PRIMARY KEY, \
                integration_id TEXT NOT NULL UNIQUE, \
                name TEXT NOT NULL, \
                area_id TEXT NOT NULL, \
                category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE, \
                parents TEXT NOT NULL DEFAULT '[]'); \
            CREATE INDEX idx_assets_category_id ON assets(category_id);",
            kind: MigrationType::Simple,
        },
        Migration {
            version: 2,
            description: "add_place_data",
            sql: "\
            ALTER TABLE assets ADD COLUMN latitude REAL; \
            ALTER TABLE assets ADD COLUMN longitude REAL;",
            kind: MigrationType::Simple,
        },
    ]);
    let migrator = Migrator::new(migrations).await?;
    migrator.run(&pool).await?;

    tracing::info!("Catalog store initialized at {:?}", db_path);
    Ok(pool)
}
