//! Claim ledger: who holds which item, and whether they finished it.
//!
//! The ledger takes no locks of its own. Two workers racing for the same
//! shared item both attempt the insert; the unique indexes on `claims` pick
//! the winner.

use crate::error::{Error, Result};
use crate::model::catalog::{CatalogId, WorkItemId};
use crate::model::claim::*;
use crate::telemetry::metrics;
use tracing::{error, warn};
use uuid::Uuid;

/// Result of an atomic claim attempt.
#[derive(Debug)]
pub enum ClaimAttempt {
    /// The insert committed; the worker now holds the item.
    Claimed(Claim),
    /// The store refused the claim: the item is gone, a concurrent worker won
    /// it, or this worker already holds it.
    Rejected,
}

const CLAIM_COLUMNS: &str = "id, work_item_id, item_kind, worker_id, completed, seq, created_at";

impl super::Db {
    /// The worker's open claim in this catalog, if any.
    ///
    /// More than one open claim means the single-open-claim invariant was
    /// broken; that is reported as an error instead of picking one.
    pub async fn find_incomplete(
        &self,
        catalog_id: CatalogId,
        worker_id: &str,
    ) -> Result<Option<Claim>> {
        let rows: Vec<ClaimRow> = sqlx::query_as(
            "SELECT c.id, c.work_item_id, c.item_kind, c.worker_id, c.completed, c.seq, c.created_at
             FROM claims c
             JOIN work_items w ON w.id = c.work_item_id
             WHERE w.catalog_id = $1 AND c.worker_id = $2 AND NOT c.completed
             ORDER BY c.seq
             LIMIT 2",
        )
        .bind(catalog_id.0)
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rows = rows.into_iter();
        match (rows.next(), rows.next()) {
            (None, _) => Ok(None),
            (Some(row), None) => row.try_into_claim().map(Some),
            (Some(first), Some(second)) => {
                error!(
                    worker.id = worker_id,
                    catalog.id = %catalog_id,
                    first = %first.id,
                    second = %second.id,
                    "worker holds more than one open claim"
                );
                Err(Error::InvariantViolation(format!(
                    "worker {worker_id} has multiple open claims in catalog {catalog_id}"
                )))
            }
        }
    }

    /// Atomically insert a claim for `worker_id` on `work_item_id`.
    ///
    /// Uniqueness and foreign-key checks happen inside the single statement.
    /// A refused insert returns [`ClaimAttempt::Rejected`]; any other store
    /// failure is an error.
    pub async fn try_claim(&self, work_item_id: WorkItemId, worker_id: &str) -> Result<ClaimAttempt> {
        let row: Option<ClaimRow> = sqlx::query_as(&format!(
            "INSERT INTO claims (id, work_item_id, item_kind, worker_id)
             SELECT $1, w.id, w.kind, $3 FROM work_items w WHERE w.id = $2
             ON CONFLICT DO NOTHING
             RETURNING {CLAIM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(work_item_id.0)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(ClaimAttempt::Claimed(row.try_into_claim()?)),
            None => {
                warn!(worker.id = worker_id, work_item.id = %work_item_id, "claim rejected");
                metrics::claims_rejected().add(1, &[]);
                Ok(ClaimAttempt::Rejected)
            }
        }
    }

    /// Mark a claim complete. Repeating the call is harmless.
    pub async fn mark_complete(&self, claim_id: ClaimId) -> Result<()> {
        mark_complete_on(&self.pool, claim_id).await
    }

    /// Get a claim by ID.
    pub async fn get_claim(&self, id: ClaimId) -> Result<Claim> {
        let row: Option<ClaimRow> =
            sqlx::query_as(&format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE id = $1"))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or_else(|| Error::NotFound(format!("claim {id}")))?
            .try_into_claim()
    }

    /// Every claim made against a catalog, in creation order.
    pub async fn list_claims(&self, catalog_id: CatalogId) -> Result<Vec<Claim>> {
        let rows: Vec<ClaimRow> = sqlx::query_as(
            "SELECT c.id, c.work_item_id, c.item_kind, c.worker_id, c.completed, c.seq, c.created_at
             FROM claims c
             JOIN work_items w ON w.id = c.work_item_id
             WHERE w.catalog_id = $1
             ORDER BY c.seq",
        )
        .bind(catalog_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ClaimRow::try_into_claim).collect()
    }
}

/// Flip `completed` on any executor, so it can join a wider transaction.
pub(crate) async fn mark_complete_on<'e, E>(executor: E, claim_id: ClaimId) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows_affected = sqlx::query("UPDATE claims SET completed = true WHERE id = $1")
        .bind(claim_id.0)
        .execute(executor)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(Error::NotFound(format!("claim {claim_id}")));
    }
    Ok(())
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ClaimRow {
    id: Uuid,
    work_item_id: Uuid,
    item_kind: String,
    worker_id: String,
    completed: bool,
    seq: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl ClaimRow {
    fn try_into_claim(self) -> Result<Claim> {
        Ok(Claim {
            id: ClaimId(self.id),
            work_item_id: WorkItemId(self.work_item_id),
            kind: self.item_kind.parse()?,
            worker_id: self.worker_id,
            completed: self.completed,
            seq: self.seq,
            created_at: self.created_at,
        })
    }
}
