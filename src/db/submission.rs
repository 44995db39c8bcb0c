//! Submitted payloads: storage, atomic completion, and the catalog report.

use crate::error::Result;
use crate::model::catalog::CatalogId;
use crate::model::claim::{ClaimId, ReportRow};
use crate::model::payload::Payload;
use uuid::Uuid;

use super::ledger::mark_complete_on;

const UPSERT_PAYLOAD: &str = "INSERT INTO submitted_payloads
    (claim_id, external_ref, x, y, invalid_structure, no_street_view, cbfips, occtype, st_damcat,
     found_ht, num_story, sqft, found_type, rsmeans_type, quality, const_type, garage, roof_style, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, now())
    ON CONFLICT (claim_id) DO UPDATE SET
        external_ref = EXCLUDED.external_ref, x = EXCLUDED.x, y = EXCLUDED.y,
        invalid_structure = EXCLUDED.invalid_structure, no_street_view = EXCLUDED.no_street_view,
        cbfips = EXCLUDED.cbfips, occtype = EXCLUDED.occtype, st_damcat = EXCLUDED.st_damcat,
        found_ht = EXCLUDED.found_ht, num_story = EXCLUDED.num_story, sqft = EXCLUDED.sqft,
        found_type = EXCLUDED.found_type, rsmeans_type = EXCLUDED.rsmeans_type,
        quality = EXCLUDED.quality, const_type = EXCLUDED.const_type, garage = EXCLUDED.garage,
        roof_style = EXCLUDED.roof_style, updated_at = EXCLUDED.updated_at";

impl super::Db {
    /// The payload previously submitted for a claim, if any.
    pub async fn find_payload(&self, claim_id: ClaimId) -> Result<Option<Payload>> {
        let row: Option<PayloadRow> = sqlx::query_as(
            "SELECT claim_id, external_ref, x, y, invalid_structure, no_street_view, cbfips, occtype,
                    st_damcat, found_ht, num_story, sqft, found_type, rsmeans_type, quality,
                    const_type, garage, roof_style
             FROM submitted_payloads WHERE claim_id = $1",
        )
        .bind(claim_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Payload::from))
    }

    /// Store `payload` for `claim_id` and close the claim, in one transaction.
    ///
    /// Later submissions for the same claim overwrite every field. An unknown
    /// claim is `NotFound`. If either statement fails the transaction is
    /// dropped and rolls back.
    pub async fn record_completion(&self, claim_id: ClaimId, payload: &Payload) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Runs first so a missing claim is reported before the payload's
        // foreign key trips.
        mark_complete_on(&mut *tx, claim_id).await?;

        sqlx::query(UPSERT_PAYLOAD)
            .bind(claim_id.0)
            .bind(payload.external_ref)
            .bind(payload.x)
            .bind(payload.y)
            .bind(payload.invalid_structure)
            .bind(payload.no_street_view)
            .bind(&payload.cbfips)
            .bind(&payload.occupancy_type)
            .bind(&payload.damage_category)
            .bind(payload.found_ht)
            .bind(payload.stories)
            .bind(payload.sq_ft)
            .bind(&payload.found_type)
            .bind(&payload.rsmeans_type)
            .bind(&payload.quality)
            .bind(&payload.const_type)
            .bind(&payload.garage)
            .bind(&payload.roof_style)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Every claim in a catalog with its submission, open claims included.
    pub async fn catalog_report(&self, catalog_id: CatalogId) -> Result<Vec<ReportRow>> {
        let rows: Vec<ReportDbRow> = sqlx::query_as(
            "SELECT c.id, c.seq, c.worker_id, c.completed, c.item_kind, w.order_key,
                    w.external_ref AS item_ref,
                    p.claim_id, p.external_ref, p.x, p.y, p.invalid_structure, p.no_street_view,
                    p.cbfips, p.occtype, p.st_damcat, p.found_ht, p.num_story, p.sqft,
                    p.found_type, p.rsmeans_type, p.quality, p.const_type, p.garage, p.roof_style
             FROM claims c
             JOIN work_items w ON w.id = c.work_item_id
             LEFT JOIN submitted_payloads p ON p.claim_id = c.id
             WHERE w.catalog_id = $1
             ORDER BY c.seq",
        )
        .bind(catalog_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReportDbRow::try_into_report_row).collect()
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct PayloadRow {
    claim_id: Uuid,
    external_ref: i64,
    x: f64,
    y: f64,
    invalid_structure: bool,
    no_street_view: bool,
    cbfips: String,
    occtype: String,
    st_damcat: String,
    found_ht: f64,
    num_story: i32,
    sqft: f64,
    found_type: String,
    rsmeans_type: String,
    quality: String,
    const_type: String,
    garage: String,
    roof_style: String,
}

impl From<PayloadRow> for Payload {
    fn from(row: PayloadRow) -> Self {
        Payload {
            claim_id: ClaimId(row.claim_id),
            external_ref: row.external_ref,
            x: row.x,
            y: row.y,
            invalid_structure: row.invalid_structure,
            no_street_view: row.no_street_view,
            cbfips: row.cbfips,
            occupancy_type: row.occtype,
            damage_category: row.st_damcat,
            found_ht: row.found_ht,
            stories: row.num_story,
            sq_ft: row.sqft,
            found_type: row.found_type,
            rsmeans_type: row.rsmeans_type,
            quality: row.quality,
            const_type: row.const_type,
            garage: row.garage,
            roof_style: row.roof_style,
        }
    }
}

/// Claim columns plus an optional payload from the left join.
#[derive(sqlx::FromRow)]
struct ReportDbRow {
    id: Uuid,
    seq: i64,
    worker_id: String,
    completed: bool,
    item_kind: String,
    order_key: i64,
    item_ref: i64,
    claim_id: Option<Uuid>,
    external_ref: Option<i64>,
    x: Option<f64>,
    y: Option<f64>,
    invalid_structure: Option<bool>,
    no_street_view: Option<bool>,
    cbfips: Option<String>,
    occtype: Option<String>,
    st_damcat: Option<String>,
    found_ht: Option<f64>,
    num_story: Option<i32>,
    sqft: Option<f64>,
    found_type: Option<String>,
    rsmeans_type: Option<String>,
    quality: Option<String>,
    const_type: Option<String>,
    garage: Option<String>,
    roof_style: Option<String>,
}

impl ReportDbRow {
    fn try_into_report_row(self) -> Result<ReportRow> {
        // Every payload column is NOT NULL, so claim_id alone tells whether
        // the join matched.
        let payload = self.claim_id.map(|claim_id| Payload {
            claim_id: ClaimId(claim_id),
            external_ref: self.external_ref.unwrap_or(self.item_ref),
            x: self.x.unwrap_or_default(),
            y: self.y.unwrap_or_default(),
            invalid_structure: self.invalid_structure.unwrap_or_default(),
            no_street_view: self.no_street_view.unwrap_or_default(),
            cbfips: self.cbfips.unwrap_or_default(),
            occupancy_type: self.occtype.unwrap_or_default(),
            damage_category: self.st_damcat.unwrap_or_default(),
            found_ht: self.found_ht.unwrap_or_default(),
            stories: self.num_story.unwrap_or_default(),
            sq_ft: self.sqft.unwrap_or_default(),
            found_type: self.found_type.unwrap_or_default(),
            rsmeans_type: self.rsmeans_type.unwrap_or_default(),
            quality: self.quality.unwrap_or_default(),
            const_type: self.const_type.unwrap_or_default(),
            garage: self.garage.unwrap_or_default(),
            roof_style: self.roof_style.unwrap_or_default(),
        });

        Ok(ReportRow {
            claim_id: ClaimId(self.id),
            seq: self.seq,
            worker_id: self.worker_id,
            completed: self.completed,
            kind: self.item_kind.parse()?,
            order_key: self.order_key,
            external_ref: self.item_ref,
            payload,
        })
    }
}
