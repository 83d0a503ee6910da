//! Storage backend abstraction trait.
//!
//! [`RecommendationStorage`] is the seam between the recommendation
//! engine and whatever holds its precomputed output. Backends are
//! interchangeable: engine code holds an `Arc<dyn RecommendationStorage>`
//! and never learns whether scores live in PostgreSQL or in memory.

use async_trait::async_trait;

use crate::domain::{Identifiable, Identifier, ObjectRef, Site, SiteId, UserId};
use crate::error::StoreError;
use crate::persistence::models::{
    Recommendation, SimilarityResult, SimilarityUpdate, UserRecommendations,
};

/// Persistence boundary for precomputed similarity and recommendation
/// scores.
///
/// Every backend is scoped to one *current* site; identifier generation
/// and all queries default to it. Site scoping keeps tenants from seeing
/// each other's scores even when their object ids collide.
#[async_trait]
pub trait RecommendationStorage: Send + Sync {
    /// Builds the storage identifier for a domain object.
    ///
    /// Uses the backend's current site when `site` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKind`] or
    /// [`StoreError::IdentifierFormat`] when the object yields invalid
    /// identity parts.
    fn identifier_for(
        &self,
        obj: &dyn Identifiable,
        site: Option<SiteId>,
    ) -> Result<Identifier, StoreError>;

    /// Parses an identifier string and resolves its site.
    ///
    /// Returns the site-free object reference together with the stored
    /// [`Site`] the identifier was scoped to.
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed input and
    /// [`StoreError::SiteNotFound`] when the site is not registered.
    async fn resolve_identifier(&self, raw: &str) -> Result<(ObjectRef, Site), StoreError>;

    /// Returns the site this backend is scoped to.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SiteNotFound`] when the configured site has
    /// not been registered.
    async fn current_site(&self) -> Result<Site, StoreError>;

    /// Creates or updates a site row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn register_site(&self, site: &Site) -> Result<(), StoreError>;

    /// Returns the top `limit` objects most similar to `obj` on the
    /// current site, highest score first. Only strictly positive scores
    /// are returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn similarities_for_object(
        &self,
        obj: &dyn Identifiable,
        limit: u32,
    ) -> Result<Vec<SimilarityResult>, StoreError>;

    /// Returns the top `limit` suggestions for `user` on the current
    /// site, highest score first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn recommendations_for_user(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<Recommendation>, StoreError>;

    /// Upserts one similarity row per (target, related) pair, returning
    /// the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidScore`] if any score is not finite;
    /// no rows are written in that case.
    async fn store_similarities(&self, updates: &[SimilarityUpdate]) -> Result<u64, StoreError>;

    /// Upserts one recommendation row per (user, object) pair, returning
    /// the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidScore`] if any score is not finite;
    /// no rows are written in that case.
    async fn store_recommendations(
        &self,
        batches: &[UserRecommendations],
    ) -> Result<u64, StoreError>;

    /// Deletes every similarity row in which `obj` appears on either
    /// side, scoped to the current site. Returns the rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn remove_similarities_for_object(
        &self,
        obj: &dyn Identifiable,
    ) -> Result<u64, StoreError>;

    /// Deletes every suggestion row pointing at `obj` on the current
    /// site. Returns the rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn remove_recommendations_for_object(
        &self,
        obj: &dyn Identifiable,
    ) -> Result<u64, StoreError>;
}
