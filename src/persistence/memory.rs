//! In-process implementation of the storage boundary.
//!
//! [`MemoryStorage`] keeps everything in `RwLock`-guarded maps. It backs
//! unit tests throughout the crate and serves hosts that want the full
//! storage contract without a database (single-process demos, fixtures).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use async_trait::async_trait;

use crate::domain::{Identifiable, Identifier, ObjectRef, Site, SiteId, UserId};
use crate::error::StoreError;
use crate::persistence::models::{
    Recommendation, SimilarityResult, SimilarityUpdate, UserRecommendations, ensure_finite,
};
use crate::persistence::storage::RecommendationStorage;

#[derive(Debug, Clone)]
struct ScoreRow {
    id: i64,
    score: f64,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    sites: HashMap<SiteId, Site>,
    similarities: HashMap<(Identifier, Identifier), ScoreRow>,
    recommendations: HashMap<(UserId, Identifier), ScoreRow>,
    next_id: i64,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Map-backed score store.
///
/// Rows are keyed exactly like the relational unique constraints, so
/// upsert semantics match [`super::PostgresStorage`] row for row.
#[derive(Debug)]
pub struct MemoryStorage {
    site_id: SiteId,
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    /// Creates an empty store scoped to the given site.
    ///
    /// The site still has to be registered via
    /// [`RecommendationStorage::register_site`] before lookups that
    /// return [`Site`] rows succeed.
    #[must_use]
    pub fn new(site_id: SiteId) -> Self {
        Self {
            site_id,
            inner: RwLock::new(Inner::default()),
        }
    }

    async fn site_by_id(&self, id: SiteId) -> Result<Site, StoreError> {
        self.inner
            .read()
            .await
            .sites
            .get(&id)
            .cloned()
            .ok_or(StoreError::SiteNotFound(id))
    }
}

#[async_trait]
impl RecommendationStorage for MemoryStorage {
    fn identifier_for(
        &self,
        obj: &dyn Identifiable,
        site: Option<SiteId>,
    ) -> Result<Identifier, StoreError> {
        Identifier::for_object(obj, site.unwrap_or(self.site_id))
    }

    async fn resolve_identifier(&self, raw: &str) -> Result<(ObjectRef, Site), StoreError> {
        let ident: Identifier = raw.parse()?;
        let site = self.site_by_id(ident.site).await?;
        Ok((ident.object, site))
    }

    async fn current_site(&self) -> Result<Site, StoreError> {
        self.site_by_id(self.site_id).await
    }

    async fn register_site(&self, site: &Site) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .sites
            .insert(site.id, site.clone());
        Ok(())
    }

    async fn similarities_for_object(
        &self,
        obj: &dyn Identifiable,
        limit: u32,
    ) -> Result<Vec<SimilarityResult>, StoreError> {
        let target = self.identifier_for(obj, None)?;

        let inner = self.inner.read().await;
        let mut rows: Vec<SimilarityResult> = inner
            .similarities
            .iter()
            .filter(|((row_target, _), row)| *row_target == target && row.score > 0.0)
            .map(|((row_target, related), row)| SimilarityResult {
                id: row.id,
                target: row_target.clone(),
                related: related.clone(),
                score: row.score,
                updated_at: row.updated_at,
            })
            .collect();
        drop(inner);

        rows.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn recommendations_for_user(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<Recommendation>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Recommendation> = inner
            .recommendations
            .iter()
            .filter(|((row_user, object), _)| *row_user == user && object.site == self.site_id)
            .map(|((row_user, object), row)| Recommendation {
                id: row.id,
                user: *row_user,
                object: object.clone(),
                score: row.score,
                updated_at: row.updated_at,
            })
            .collect();
        drop(inner);

        rows.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn store_similarities(&self, updates: &[SimilarityUpdate]) -> Result<u64, StoreError> {
        for update in updates {
            for scored in &update.related {
                ensure_finite(scored.score)?;
            }
        }

        let mut inner = self.inner.write().await;
        let mut written = 0u64;
        for update in updates {
            for scored in &update.related {
                let key = (update.target.clone(), scored.object.clone());
                let existing = inner.similarities.get(&key).map(|row| row.id);
                let id = match existing {
                    Some(id) => id,
                    None => inner.allocate_id(),
                };
                inner.similarities.insert(
                    key,
                    ScoreRow {
                        id,
                        score: scored.score,
                        updated_at: Utc::now(),
                    },
                );
                written = written.saturating_add(1);
            }
        }

        tracing::debug!(written, "stored similarity scores");
        Ok(written)
    }

    async fn store_recommendations(
        &self,
        batches: &[UserRecommendations],
    ) -> Result<u64, StoreError> {
        for batch in batches {
            for scored in &batch.rankings {
                ensure_finite(scored.score)?;
            }
        }

        let mut inner = self.inner.write().await;
        let mut written = 0u64;
        for batch in batches {
            for scored in &batch.rankings {
                let key = (batch.user, scored.object.clone());
                let existing = inner.recommendations.get(&key).map(|row| row.id);
                let id = match existing {
                    Some(id) => id,
                    None => inner.allocate_id(),
                };
                inner.recommendations.insert(
                    key,
                    ScoreRow {
                        id,
                        score: scored.score,
                        updated_at: Utc::now(),
                    },
                );
                written = written.saturating_add(1);
            }
        }

        tracing::debug!(written, "stored recommendation scores");
        Ok(written)
    }

    async fn remove_similarities_for_object(
        &self,
        obj: &dyn Identifiable,
    ) -> Result<u64, StoreError> {
        let ident = self.identifier_for(obj, None)?;

        let mut inner = self.inner.write().await;
        let before = inner.similarities.len();
        inner
            .similarities
            .retain(|(target, related), _| *target != ident && *related != ident);
        let removed = (before - inner.similarities.len()) as u64;
        drop(inner);

        tracing::info!(identifier = %ident, removed, "removed similarity rows");
        Ok(removed)
    }

    async fn remove_recommendations_for_object(
        &self,
        obj: &dyn Identifiable,
    ) -> Result<u64, StoreError> {
        let ident = self.identifier_for(obj, None)?;

        let mut inner = self.inner.write().await;
        let before = inner.recommendations.len();
        inner.recommendations.retain(|(_, object), _| *object != ident);
        let removed = (before - inner.recommendations.len()) as u64;
        drop(inner);

        tracing::info!(identifier = %ident, removed, "removed recommendation rows");
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::models::ScoredObject;

    struct Product {
        sku: &'static str,
    }

    impl Identifiable for Product {
        fn kind(&self) -> &str {
            "catalog.product"
        }

        fn object_id(&self) -> String {
            self.sku.to_string()
        }
    }

    fn product_ident(sku: &str, site: i32) -> Identifier {
        let Ok(object) = ObjectRef::new("catalog.product", sku) else {
            panic!("valid object ref");
        };
        Identifier::new(object, SiteId::new(site))
    }

    async fn seeded_store() -> MemoryStorage {
        let store = MemoryStorage::new(SiteId::new(1));
        let site = Site::new(SiteId::new(1), "shop.example.com", "Shop");
        let Ok(()) = store.register_site(&site).await else {
            panic!("site registration failed");
        };
        store
    }

    fn scores_of(rows: &[SimilarityResult]) -> Vec<f64> {
        rows.iter().map(|row| row.score).collect()
    }

    #[tokio::test]
    async fn register_and_read_current_site() {
        let store = seeded_store().await;
        let site = store.current_site().await;
        let Ok(site) = site else {
            panic!("current site missing");
        };
        assert_eq!(site.domain, "shop.example.com");
    }

    #[tokio::test]
    async fn unregistered_current_site_errors() {
        let store = MemoryStorage::new(SiteId::new(9));
        let result = store.current_site().await;
        assert!(matches!(result, Err(StoreError::SiteNotFound(_))));
    }

    #[tokio::test]
    async fn identifier_defaults_to_current_site() {
        let store = seeded_store().await;
        let product = Product { sku: "sku-1" };

        let ident = store.identifier_for(&product, None);
        let Ok(ident) = ident else {
            panic!("identifier failed");
        };
        assert_eq!(ident.to_string(), "catalog.product:1:sku-1");

        let overridden = store.identifier_for(&product, Some(SiteId::new(4)));
        let Ok(overridden) = overridden else {
            panic!("identifier failed");
        };
        assert_eq!(overridden.site, SiteId::new(4));
    }

    #[tokio::test]
    async fn resolve_identifier_returns_object_and_site() {
        let store = seeded_store().await;
        let resolved = store.resolve_identifier("catalog.product:1:sku-1").await;
        let Ok((object, site)) = resolved else {
            panic!("resolve failed");
        };
        assert_eq!(object.kind, "catalog.product");
        assert_eq!(object.object_id, "sku-1");
        assert_eq!(site.id, SiteId::new(1));
    }

    #[tokio::test]
    async fn resolve_identifier_rejects_unknown_site() {
        let store = seeded_store().await;
        let result = store.resolve_identifier("catalog.product:2:sku-1").await;
        assert!(matches!(result, Err(StoreError::SiteNotFound(_))));
    }

    #[tokio::test]
    async fn similarities_are_ordered_and_positive_only() {
        let store = seeded_store().await;
        let update = SimilarityUpdate {
            target: product_ident("sku-1", 1),
            related: vec![
                ScoredObject::new(0.2, product_ident("sku-2", 1)),
                ScoredObject::new(0.9, product_ident("sku-3", 1)),
                ScoredObject::new(-0.5, product_ident("sku-4", 1)),
                ScoredObject::new(0.0, product_ident("sku-5", 1)),
            ],
        };
        let Ok(written) = store.store_similarities(&[update]).await else {
            panic!("store failed");
        };
        assert_eq!(written, 4);

        let rows = store
            .similarities_for_object(&Product { sku: "sku-1" }, 10)
            .await;
        let Ok(rows) = rows else {
            panic!("query failed");
        };
        assert_eq!(scores_of(&rows), vec![0.9, 0.2]);
    }

    #[tokio::test]
    async fn similarities_respect_limit() {
        let store = seeded_store().await;
        let update = SimilarityUpdate {
            target: product_ident("sku-1", 1),
            related: vec![
                ScoredObject::new(0.3, product_ident("sku-2", 1)),
                ScoredObject::new(0.7, product_ident("sku-3", 1)),
                ScoredObject::new(0.5, product_ident("sku-4", 1)),
            ],
        };
        let _ = store.store_similarities(&[update]).await;

        let rows = store
            .similarities_for_object(&Product { sku: "sku-1" }, 2)
            .await;
        let Ok(rows) = rows else {
            panic!("query failed");
        };
        assert_eq!(scores_of(&rows), vec![0.7, 0.5]);

        let none = store
            .similarities_for_object(&Product { sku: "sku-1" }, 0)
            .await;
        let Ok(none) = none else {
            panic!("query failed");
        };
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn storing_pair_twice_keeps_latest_score() {
        let store = seeded_store().await;
        let first = SimilarityUpdate {
            target: product_ident("sku-1", 1),
            related: vec![ScoredObject::new(0.4, product_ident("sku-2", 1))],
        };
        let second = SimilarityUpdate {
            target: product_ident("sku-1", 1),
            related: vec![ScoredObject::new(0.8, product_ident("sku-2", 1))],
        };
        let _ = store.store_similarities(&[first]).await;
        let _ = store.store_similarities(&[second]).await;

        let rows = store
            .similarities_for_object(&Product { sku: "sku-1" }, 10)
            .await;
        let Ok(rows) = rows else {
            panic!("query failed");
        };
        assert_eq!(scores_of(&rows), vec![0.8]);
    }

    #[tokio::test]
    async fn non_finite_score_rejected_before_writing() {
        let store = seeded_store().await;
        let update = SimilarityUpdate {
            target: product_ident("sku-1", 1),
            related: vec![
                ScoredObject::new(0.4, product_ident("sku-2", 1)),
                ScoredObject::new(f64::NAN, product_ident("sku-3", 1)),
            ],
        };
        let result = store.store_similarities(&[update]).await;
        assert!(matches!(result, Err(StoreError::InvalidScore(_))));

        let rows = store
            .similarities_for_object(&Product { sku: "sku-1" }, 10)
            .await;
        let Ok(rows) = rows else {
            panic!("query failed");
        };
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn empty_batches_write_nothing() {
        let store = seeded_store().await;
        let Ok(written) = store.store_similarities(&[]).await else {
            panic!("store failed");
        };
        assert_eq!(written, 0);

        let Ok(written) = store.store_recommendations(&[]).await else {
            panic!("store failed");
        };
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn similarities_are_scoped_to_current_site() {
        let store = seeded_store().await;
        let other_site = SimilarityUpdate {
            target: product_ident("sku-1", 2),
            related: vec![ScoredObject::new(0.9, product_ident("sku-2", 2))],
        };
        let _ = store.store_similarities(&[other_site]).await;

        let rows = store
            .similarities_for_object(&Product { sku: "sku-1" }, 10)
            .await;
        let Ok(rows) = rows else {
            panic!("query failed");
        };
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn recommendations_keep_non_positive_scores() {
        let store = seeded_store().await;
        let user = UserId::new();
        let batch = UserRecommendations {
            user,
            rankings: vec![
                ScoredObject::new(0.6, product_ident("sku-1", 1)),
                ScoredObject::new(-0.2, product_ident("sku-2", 1)),
            ],
        };
        let _ = store.store_recommendations(&[batch]).await;

        let rows = store.recommendations_for_user(user, 10).await;
        let Ok(rows) = rows else {
            panic!("query failed");
        };
        let scores: Vec<f64> = rows.iter().map(|row| row.score).collect();
        assert_eq!(scores, vec![0.6, -0.2]);
    }

    #[tokio::test]
    async fn recommendations_are_scoped_to_user_and_site() {
        let store = seeded_store().await;
        let user = UserId::new();
        let other_user = UserId::new();
        let batches = vec![
            UserRecommendations {
                user,
                rankings: vec![ScoredObject::new(0.5, product_ident("sku-1", 2))],
            },
            UserRecommendations {
                user: other_user,
                rankings: vec![ScoredObject::new(0.7, product_ident("sku-1", 1))],
            },
        ];
        let _ = store.store_recommendations(&batches).await;

        let rows = store.recommendations_for_user(user, 10).await;
        let Ok(rows) = rows else {
            panic!("query failed");
        };
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn remove_similarities_covers_both_sides() {
        let store = seeded_store().await;
        let updates = vec![
            SimilarityUpdate {
                target: product_ident("sku-1", 1),
                related: vec![ScoredObject::new(0.9, product_ident("sku-2", 1))],
            },
            SimilarityUpdate {
                target: product_ident("sku-3", 1),
                related: vec![
                    ScoredObject::new(0.8, product_ident("sku-1", 1)),
                    ScoredObject::new(0.7, product_ident("sku-4", 1)),
                ],
            },
        ];
        let _ = store.store_similarities(&updates).await;

        let Ok(removed) = store
            .remove_similarities_for_object(&Product { sku: "sku-1" })
            .await
        else {
            panic!("remove failed");
        };
        assert_eq!(removed, 2);

        let rows = store
            .similarities_for_object(&Product { sku: "sku-3" }, 10)
            .await;
        let Ok(rows) = rows else {
            panic!("query failed");
        };
        assert_eq!(scores_of(&rows), vec![0.7]);
    }

    #[tokio::test]
    async fn remove_recommendations_for_object() {
        let store = seeded_store().await;
        let user = UserId::new();
        let batch = UserRecommendations {
            user,
            rankings: vec![
                ScoredObject::new(0.6, product_ident("sku-1", 1)),
                ScoredObject::new(0.4, product_ident("sku-2", 1)),
            ],
        };
        let _ = store.store_recommendations(&[batch]).await;

        let Ok(removed) = store
            .remove_recommendations_for_object(&Product { sku: "sku-1" })
            .await
        else {
            panic!("remove failed");
        };
        assert_eq!(removed, 1);

        let rows = store.recommendations_for_user(user, 10).await;
        let Ok(rows) = rows else {
            panic!("query failed");
        };
        let skus: Vec<&str> = rows
            .iter()
            .map(|row| row.object.object.object_id.as_str())
            .collect();
        assert_eq!(skus, vec!["sku-2"]);
    }
}
