//! PostgreSQL implementation of the storage boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::StoreConfig;
use crate::domain::{Identifiable, Identifier, ObjectRef, Site, SiteId, UserId};
use crate::error::StoreError;
use crate::persistence::models::{
    Recommendation, SimilarityResult, SimilarityUpdate, UserRecommendations, ensure_finite,
};
use crate::persistence::storage::RecommendationStorage;

/// PostgreSQL-backed score store using `sqlx::PgPool`.
///
/// Holds the connection pool and the site the instance is scoped to.
/// Cloning is cheap; the pool is internally reference-counted.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
    site_id: SiteId,
}

impl PostgresStorage {
    /// Creates a store with an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool, site_id: SiteId) -> Self {
        Self { pool, site_id }
    }

    /// Builds a connection pool from configuration and wraps it.
    ///
    /// Runs the embedded migrations first when
    /// [`StoreConfig::auto_migrate`] is set.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError::Database`] when the pool cannot be
    /// established or a migration fails.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await?;

        if config.auto_migrate {
            sqlx::migrate!().run(&pool).await?;
        }

        tracing::info!(site_id = %config.site_id, "connected score store");
        Ok(Self::new(pool, config.site_id))
    }

    /// Returns a reference to the inner connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn site_by_id(&self, id: SiteId) -> Result<Site, StoreError> {
        let row = sqlx::query_as::<_, (i32, String, String)>(
            "SELECT id, domain, name FROM sites WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, domain, name)| Site::new(SiteId::new(id), domain, name))
            .ok_or(StoreError::SiteNotFound(id))
    }
}

#[async_trait]
impl RecommendationStorage for PostgresStorage {
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
        sqlx::query(
            "INSERT INTO sites (id, domain, name) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET domain = EXCLUDED.domain, name = EXCLUDED.name",
        )
        .bind(site.id.get())
        .bind(&site.domain)
        .bind(&site.name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn similarities_for_object(
        &self,
        obj: &dyn Identifiable,
        limit: u32,
    ) -> Result<Vec<SimilarityResult>, StoreError> {
        let target = self.identifier_for(obj, None)?;

        let rows = sqlx::query_as::<
            _,
            (i64, String, String, i32, String, String, i32, f64, DateTime<Utc>),
        >(
            "SELECT id, target_kind, target_id, target_site_id, \
                    related_kind, related_id, related_site_id, score, updated_at \
             FROM similarity_results \
             WHERE target_kind = $1 AND target_id = $2 AND target_site_id = $3 AND score > 0 \
             ORDER BY score DESC \
             LIMIT $4",
        )
        .bind(&target.object.kind)
        .bind(&target.object.object_id)
        .bind(target.site.get())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    id,
                    target_kind,
                    target_id,
                    target_site_id,
                    related_kind,
                    related_id,
                    related_site_id,
                    score,
                    updated_at,
                )| SimilarityResult {
                    id,
                    target: Identifier::new(
                        ObjectRef {
                            kind: target_kind,
                            object_id: target_id,
                        },
                        SiteId::new(target_site_id),
                    ),
                    related: Identifier::new(
                        ObjectRef {
                            kind: related_kind,
                            object_id: related_id,
                        },
                        SiteId::new(related_site_id),
                    ),
                    score,
                    updated_at,
                },
            )
            .collect())
    }

    async fn recommendations_for_user(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<Recommendation>, StoreError> {
        let rows = sqlx::query_as::<
            _,
            (i64, uuid::Uuid, String, String, i32, f64, DateTime<Utc>),
        >(
            "SELECT id, user_id, object_kind, object_id, object_site_id, score, updated_at \
             FROM recommendations \
             WHERE user_id = $1 AND object_site_id = $2 \
             ORDER BY score DESC \
             LIMIT $3",
        )
        .bind(user.as_uuid())
        .bind(self.site_id.get())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, user_id, object_kind, object_id, object_site_id, score, updated_at)| {
                    Recommendation {
                        id,
                        user: UserId::from_uuid(user_id),
                        object: Identifier::new(
                            ObjectRef {
                                kind: object_kind,
                                object_id,
                            },
                            SiteId::new(object_site_id),
                        ),
                        score,
                        updated_at,
                    }
                },
            )
            .collect())
    }

    async fn store_similarities(&self, updates: &[SimilarityUpdate]) -> Result<u64, StoreError> {
        for update in updates {
            for scored in &update.related {
                ensure_finite(scored.score)?;
            }
        }

        let mut written = 0u64;
        for update in updates {
            for scored in &update.related {
                let result = sqlx::query(
                    "INSERT INTO similarity_results \
                         (target_kind, target_id, target_site_id, \
                          related_kind, related_id, related_site_id, score) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) \
                     ON CONFLICT (target_kind, target_id, target_site_id, \
                                  related_kind, related_id, related_site_id) \
                     DO UPDATE SET score = EXCLUDED.score, updated_at = now()",
                )
                .bind(&update.target.object.kind)
                .bind(&update.target.object.object_id)
                .bind(update.target.site.get())
                .bind(&scored.object.object.kind)
                .bind(&scored.object.object.object_id)
                .bind(scored.object.site.get())
                .bind(scored.score)
                .execute(&self.pool)
                .await?;

                written = written.saturating_add(result.rows_affected());
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

        let mut written = 0u64;
        for batch in batches {
            for scored in &batch.rankings {
                let result = sqlx::query(
                    "INSERT INTO recommendations \
                         (user_id, object_kind, object_id, object_site_id, score) \
                     VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (user_id, object_kind, object_id, object_site_id) \
                     DO UPDATE SET score = EXCLUDED.score, updated_at = now()",
                )
                .bind(batch.user.as_uuid())
                .bind(&scored.object.object.kind)
                .bind(&scored.object.object.object_id)
                .bind(scored.object.site.get())
                .bind(scored.score)
                .execute(&self.pool)
                .await?;

                written = written.saturating_add(result.rows_affected());
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

        let result = sqlx::query(
            "DELETE FROM similarity_results \
             WHERE (target_kind = $1 AND target_id = $2 AND target_site_id = $3) \
                OR (related_kind = $1 AND related_id = $2 AND related_site_id = $3)",
        )
        .bind(&ident.object.kind)
        .bind(&ident.object.object_id)
        .bind(ident.site.get())
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        tracing::info!(identifier = %ident, removed, "removed similarity rows");
        Ok(removed)
    }

    async fn remove_recommendations_for_object(
        &self,
        obj: &dyn Identifiable,
    ) -> Result<u64, StoreError> {
        let ident = self.identifier_for(obj, None)?;

        let result = sqlx::query(
            "DELETE FROM recommendations \
             WHERE object_kind = $1 AND object_id = $2 AND object_site_id = $3",
        )
        .bind(&ident.object.kind)
        .bind(&ident.object.object_id)
        .bind(ident.site.get())
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        tracing::info!(identifier = %ident, removed, "removed recommendation rows");
        Ok(removed)
    }
}
