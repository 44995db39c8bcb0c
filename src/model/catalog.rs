//! Catalogs and their work items.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Newtype for catalog IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogId(pub Uuid);

impl CatalogId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CatalogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CatalogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItemId(pub Uuid);

impl std::fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Item kind
// ---------------------------------------------------------------------------

/// How a work item is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Consumed by exactly one surveyor, ever.
    Shared,
    /// Quality-control item consumed once by every surveyor.
    Recurring,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemKind::Shared => "shared",
            ItemKind::Recurring => "recurring",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ItemKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shared" => Ok(ItemKind::Shared),
            "recurring" => Ok(ItemKind::Recurring),
            other => Err(Error::Other(format!("unknown item kind: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A survey catalog. Its items are fixed once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub id: CatalogId,
    pub title: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a catalog.
#[derive(Debug, Clone)]
pub struct NewCatalog {
    pub title: String,
    pub description: String,
    pub active: bool,
}

impl NewCatalog {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            active: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of work in a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub catalog_id: CatalogId,
    /// Processing sequence within the catalog. Not necessarily unique.
    pub order_key: i64,
    pub kind: ItemKind,
    /// Key into the reference dataset used to build the default payload.
    pub external_ref: i64,
}

/// A work item waiting to be published into a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkItem {
    #[serde(rename = "order")]
    pub order_key: i64,
    pub kind: ItemKind,
    pub external_ref: i64,
}

impl NewWorkItem {
    pub fn shared(order_key: i64, external_ref: i64) -> Self {
        Self {
            order_key,
            kind: ItemKind::Shared,
            external_ref,
        }
    }

    pub fn recurring(order_key: i64, external_ref: i64) -> Self {
        Self {
            order_key,
            kind: ItemKind::Recurring,
            external_ref,
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Operator-authored list of items to publish, read from TOML.
///
/// ```toml
/// [[item]]
/// order = 1
/// kind = "shared"
/// external_ref = 11357491
/// ```
#[derive(Debug, Deserialize)]
pub struct CatalogManifest {
    #[serde(default, rename = "item")]
    pub items: Vec<NewWorkItem>,
}

impl CatalogManifest {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::InvalidCatalog(format!("manifest parse error: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Other(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }
}
