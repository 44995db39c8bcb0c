//! Postgres-backed reference dataset.

use crate::engine::resolver::ReferenceDataset;
use crate::error::Result;
use crate::model::payload::DefaultFields;

impl super::Db {
    /// Load or refresh reference rows, keyed by external reference.
    pub async fn import_reference(&self, rows: &[DefaultFields]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for row in rows {
            written += sqlx::query(
                "INSERT INTO reference_structures
                    (external_ref, x, y, cbfips, occtype, st_damcat, found_ht, found_type)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (external_ref) DO UPDATE SET
                    x = EXCLUDED.x, y = EXCLUDED.y, cbfips = EXCLUDED.cbfips,
                    occtype = EXCLUDED.occtype, st_damcat = EXCLUDED.st_damcat,
                    found_ht = EXCLUDED.found_ht, found_type = EXCLUDED.found_type",
            )
            .bind(row.external_ref)
            .bind(row.x)
            .bind(row.y)
            .bind(&row.cbfips)
            .bind(&row.occupancy_type)
            .bind(&row.damage_category)
            .bind(row.found_ht)
            .bind(&row.found_type)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(written)
    }
}

impl ReferenceDataset for super::Db {
    async fn lookup(&self, external_ref: i64) -> Result<Option<DefaultFields>> {
        let row: Option<ReferenceRow> = sqlx::query_as(
            "SELECT external_ref, x, y, cbfips, occtype, st_damcat, found_ht, found_type
             FROM reference_structures WHERE external_ref = $1",
        )
        .bind(external_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DefaultFields::from))
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ReferenceRow {
    external_ref: i64,
    x: f64,
    y: f64,
    cbfips: String,
    occtype: String,
    st_damcat: String,
    found_ht: f64,
    found_type: String,
}

impl From<ReferenceRow> for DefaultFields {
    fn from(row: ReferenceRow) -> Self {
        DefaultFields {
            external_ref: row.external_ref,
            x: row.x,
            y: row.y,
            cbfips: row.cbfips,
            occupancy_type: row.occtype,
            damage_category: row.st_damcat,
            found_ht: row.found_ht,
            found_type: row.found_type,
        }
    }
}
