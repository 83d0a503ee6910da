//! Multi-tenant site dimension.
//!
//! Every stored score is scoped to a [`Site`]. A storage backend is
//! configured with one *current* site and all identifier generation and
//! queries default to it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type-safe key of a site row.
///
/// Wraps the small integer primary key used by the `sites` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(i32);

impl SiteId {
    /// Creates a `SiteId` from a raw integer key.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the raw integer key.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for SiteId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<SiteId> for i32 {
    fn from(id: SiteId) -> Self {
        id.0
    }
}

/// One tenant of the store.
///
/// Mirrors the classic sites table: an integer key plus the domain and
/// display name of the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Site key, referenced by every stored score.
    pub id: SiteId,
    /// Fully qualified domain, e.g. `"shop.example.com"`.
    pub domain: String,
    /// Human-readable name.
    pub name: String,
}

impl Site {
    /// Creates a new `Site`.
    #[must_use]
    pub fn new(id: SiteId, domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            domain: domain.into(),
            name: name.into(),
        }
    }
}
