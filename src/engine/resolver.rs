//! Payload resolution for a claimed item.

use std::future::Future;

use tracing::debug;

use super::Dispatcher;
use crate::error::{Error, Result};
use crate::model::{Claim, DefaultFields, Payload};

/// Source of default fields for items nobody has submitted yet.
pub trait ReferenceDataset: Send + Sync {
    /// Fields for `external_ref`, or `None` if the dataset has no such row.
    fn lookup(
        &self,
        external_ref: i64,
    ) -> impl Future<Output = Result<Option<DefaultFields>>> + Send;
}

impl<R: ReferenceDataset> Dispatcher<R> {
    /// What to show for `claim`: the last submission if there is one,
    /// otherwise a blank payload built from the reference dataset.
    ///
    /// Read-only; safe to call any number of times before completion.
    pub async fn resolve(&self, claim: &Claim) -> Result<Payload> {
        if let Some(payload) = self.db.find_payload(claim.id).await? {
            debug!(claim.id = %claim.id, "returning submitted payload");
            return Ok(payload);
        }

        let item = self.db.get_work_item(claim.work_item_id).await?;
        let defaults = self
            .reference
            .lookup(item.external_ref)
            .await?
            .ok_or_else(|| Error::NotFound(format!("reference row {}", item.external_ref)))?;

        Ok(Payload::from_defaults(claim.id, defaults))
    }
}
