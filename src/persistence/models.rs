//! Row and batch types crossing the storage boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Identifier, UserId};

/// A stored item-to-item affinity row.
///
/// One row per (target, related) pair; the score is overwritten in place
/// whenever the engine republishes the pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Auto-increment row ID.
    pub id: i64,
    /// Object the row ranks neighbours for.
    pub target: Identifier,
    /// The neighbouring object.
    pub related: Identifier,
    /// Precomputed affinity score.
    pub score: f64,
    /// Server-side timestamp of the last score write.
    pub updated_at: DateTime<Utc>,
}

/// A stored per-user suggestion row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Auto-increment row ID.
    pub id: i64,
    /// User the object was ranked for.
    pub user: UserId,
    /// The suggested object.
    pub object: Identifier,
    /// Precomputed ranking score.
    pub score: f64,
    /// Server-side timestamp of the last score write.
    pub updated_at: DateTime<Utc>,
}

/// One scored object inside a batch produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredObject {
    /// Score assigned by the engine.
    pub score: f64,
    /// Object the score applies to.
    pub object: Identifier,
}

impl ScoredObject {
    /// Creates a new scored object.
    #[must_use]
    pub const fn new(score: f64, object: Identifier) -> Self {
        Self { score, object }
    }
}

/// Engine output for one target object: its scored neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityUpdate {
    /// Object the neighbours were computed for.
    pub target: Identifier,
    /// Scored neighbours, in no particular order.
    pub related: Vec<ScoredObject>,
}

/// Engine output for one user: their ranked suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecommendations {
    /// User the rankings were computed for.
    pub user: UserId,
    /// Scored objects, in no particular order.
    pub rankings: Vec<ScoredObject>,
}

/// Rejects `NaN` and infinite scores before they reach a backend.
pub(crate) fn ensure_finite(score: f64) -> Result<(), crate::error::StoreError> {
    if score.is_finite() {
        Ok(())
    } else {
        Err(crate::error::StoreError::InvalidScore(score))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn finite_scores_pass() {
        assert!(ensure_finite(0.0).is_ok());
        assert!(ensure_finite(-3.5).is_ok());
    }

    #[test]
    fn non_finite_scores_fail() {
        assert!(ensure_finite(f64::NAN).is_err());
        assert!(ensure_finite(f64::INFINITY).is_err());
        assert!(ensure_finite(f64::NEG_INFINITY).is_err());
    }
}
