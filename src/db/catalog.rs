//! Catalog publishing and the read-only projections the selector runs on.

use crate::error::{Error, Result};
use crate::model::catalog::*;
use tracing::info;
use uuid::Uuid;

impl super::Db {
    /// Create an empty, active catalog. Titles are unique.
    pub async fn create_catalog(&self, new: NewCatalog) -> Result<Catalog> {
        let id = CatalogId::new();
        let row: Option<CatalogRow> = sqlx::query_as(
            "INSERT INTO catalogs (id, title, description, active)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (title) DO NOTHING
             RETURNING id, title, description, active, created_at",
        )
        .bind(id.0)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.active)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Catalog::from).ok_or_else(|| {
            Error::InvalidCatalog(format!("a catalog titled {:?} already exists", new.title))
        })
    }

    /// Whether no catalog uses `title` yet.
    pub async fn title_available(&self, title: &str) -> Result<bool> {
        let (taken,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM catalogs WHERE title = $1)")
                .bind(title)
                .fetch_one(&self.pool)
                .await?;
        Ok(!taken)
    }

    /// Get a catalog by ID.
    pub async fn get_catalog(&self, id: CatalogId) -> Result<Catalog> {
        let row: Option<CatalogRow> = sqlx::query_as(
            "SELECT id, title, description, active, created_at FROM catalogs WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Catalog::from)
            .ok_or_else(|| Error::NotFound(format!("catalog {id}")))
    }

    /// Publish the items of a catalog in one transaction.
    ///
    /// Items are immutable afterwards, so a catalog can only be published once.
    pub async fn publish_catalog(
        &self,
        catalog_id: CatalogId,
        items: Vec<NewWorkItem>,
    ) -> Result<Vec<WorkItem>> {
        if items.is_empty() {
            return Err(Error::InvalidCatalog(format!(
                "catalog {catalog_id}: nothing to publish"
            )));
        }

        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent publishes of the same catalog.
        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM catalogs WHERE id = $1 FOR UPDATE")
                .bind(catalog_id.0)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("catalog {catalog_id}")));
        }

        let (already,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM work_items WHERE catalog_id = $1")
                .bind(catalog_id.0)
                .fetch_one(&mut *tx)
                .await?;
        if already > 0 {
            return Err(Error::InvalidCatalog(format!(
                "catalog {catalog_id} is already published ({already} items)"
            )));
        }

        let mut published = Vec::with_capacity(items.len());
        for item in items {
            let id = WorkItemId(Uuid::new_v4());
            sqlx::query(
                "INSERT INTO work_items (id, catalog_id, order_key, kind, external_ref)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id.0)
            .bind(catalog_id.0)
            .bind(item.order_key)
            .bind(item.kind.to_string())
            .bind(item.external_ref)
            .execute(&mut *tx)
            .await?;

            published.push(WorkItem {
                id,
                catalog_id,
                order_key: item.order_key,
                kind: item.kind,
                external_ref: item.external_ref,
            });
        }

        tx.commit().await?;
        info!(catalog.id = %catalog_id, items = published.len(), "catalog published");
        Ok(published)
    }

    /// Get a work item by ID.
    pub async fn get_work_item(&self, id: WorkItemId) -> Result<WorkItem> {
        let row: Option<WorkItemRow> = sqlx::query_as(
            "SELECT id, catalog_id, order_key, kind, external_ref FROM work_items WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("work item {id}")))?
            .try_into_work_item()
    }

    /// All items of a catalog in processing order.
    pub async fn list_work_items(&self, catalog_id: CatalogId) -> Result<Vec<WorkItem>> {
        let rows: Vec<WorkItemRow> = sqlx::query_as(
            "SELECT id, catalog_id, order_key, kind, external_ref FROM work_items
             WHERE catalog_id = $1
             ORDER BY order_key, id",
        )
        .bind(catalog_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(WorkItemRow::try_into_work_item)
            .collect()
    }

    /// Highest order key among shared items claimed by anyone in the catalog.
    ///
    /// Computed from the claims table on every call, never cached, so any
    /// number of engine instances agree on it.
    pub async fn shared_high_water_mark(&self, catalog_id: CatalogId) -> Result<Option<i64>> {
        let (mark,): (Option<i64>,) = sqlx::query_as(
            "SELECT max(w.order_key) FROM claims c
             JOIN work_items w ON w.id = c.work_item_id
             WHERE w.catalog_id = $1 AND c.item_kind = 'shared'",
        )
        .bind(catalog_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(mark)
    }

    /// Lowest-order shared item with an order key strictly above `greater_than`.
    pub async fn min_order_shared(
        &self,
        catalog_id: CatalogId,
        greater_than: Option<i64>,
    ) -> Result<Option<WorkItem>> {
        let row: Option<WorkItemRow> = sqlx::query_as(
            "SELECT id, catalog_id, order_key, kind, external_ref FROM work_items
             WHERE catalog_id = $1 AND kind = 'shared'
             AND ($2::bigint IS NULL OR order_key > $2)
             ORDER BY order_key, id
             LIMIT 1",
        )
        .bind(catalog_id.0)
        .bind(greater_than)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkItemRow::try_into_work_item).transpose()
    }

    /// Lowest-order recurring item the worker has never claimed.
    pub async fn min_order_recurring_unclaimed_by(
        &self,
        catalog_id: CatalogId,
        worker_id: &str,
    ) -> Result<Option<WorkItem>> {
        let row: Option<WorkItemRow> = sqlx::query_as(
            "SELECT w.id, w.catalog_id, w.order_key, w.kind, w.external_ref FROM work_items w
             WHERE w.catalog_id = $1 AND w.kind = 'recurring'
             AND NOT EXISTS (
                 SELECT 1 FROM claims c WHERE c.work_item_id = w.id AND c.worker_id = $2
             )
             ORDER BY w.order_key, w.id
             LIMIT 1",
        )
        .bind(catalog_id.0)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkItemRow::try_into_work_item).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct CatalogRow {
    id: Uuid,
    title: String,
    description: String,
    active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<CatalogRow> for Catalog {
    fn from(row: CatalogRow) -> Self {
        Catalog {
            id: CatalogId(row.id),
            title: row.title,
            description: row.description,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: Uuid,
    catalog_id: Uuid,
    order_key: i64,
    kind: String,
    external_ref: i64,
}

impl WorkItemRow {
    fn try_into_work_item(self) -> Result<WorkItem> {
        Ok(WorkItem {
            id: WorkItemId(self.id),
            catalog_id: CatalogId(self.catalog_id),
            order_key: self.order_key,
            kind: self.kind.parse()?,
            external_ref: self.external_ref,
        })
    }
}
