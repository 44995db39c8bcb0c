//! Survey payloads: what a surveyor sees and submits for a claim.

use serde::{Deserialize, Serialize};

use super::claim::ClaimId;

/// Structure attributes recorded by a surveyor for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub claim_id: ClaimId,
    pub external_ref: i64,
    pub x: f64,
    pub y: f64,
    pub invalid_structure: bool,
    pub no_street_view: bool,
    pub cbfips: String,
    pub occupancy_type: String,
    pub damage_category: String,
    pub found_ht: f64,
    pub stories: i32,
    pub sq_ft: f64,
    pub found_type: String,
    pub rsmeans_type: String,
    pub quality: String,
    pub const_type: String,
    pub garage: String,
    pub roof_style: String,
}

/// Fields the reference dataset supplies for an item nobody has surveyed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultFields {
    pub external_ref: i64,
    pub x: f64,
    pub y: f64,
    pub cbfips: String,
    pub occupancy_type: String,
    pub damage_category: String,
    pub found_ht: f64,
    pub found_type: String,
}

impl Payload {
    /// Build the blank payload shown for a fresh claim.
    ///
    /// Surveyor-entered fields start empty; the occupancy type is cut down to
    /// its primary class (`RES1-1SNB` becomes `RES1`).
    pub fn from_defaults(claim_id: ClaimId, defaults: DefaultFields) -> Self {
        Self {
            claim_id,
            external_ref: defaults.external_ref,
            x: defaults.x,
            y: defaults.y,
            invalid_structure: false,
            no_street_view: false,
            cbfips: defaults.cbfips,
            occupancy_type: primary_category(&defaults.occupancy_type).to_string(),
            damage_category: defaults.damage_category,
            found_ht: defaults.found_ht,
            stories: 0,
            sq_ft: 0.0,
            found_type: defaults.found_type,
            rsmeans_type: String::new(),
            quality: String::new(),
            const_type: String::new(),
            garage: String::new(),
            roof_style: String::new(),
        }
    }
}

/// First `-`-delimited segment of a composite category.
pub fn primary_category(category: &str) -> &str {
    category
        .split_once('-')
        .map_or(category, |(head, _)| head)
}
