//! Persistence boundary: pluggable storage of precomputed scores.
//!
//! Provides the [`RecommendationStorage`] trait for durable storage of
//! item-to-item similarity scores and per-user recommendation rankings,
//! together with two implementations: [`PostgresStorage`] backed by
//! `sqlx::PgPool` and [`MemoryStorage`] for in-process use and tests.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod storage;

pub use memory::MemoryStorage;
pub use models::{Recommendation, ScoredObject, SimilarityResult, SimilarityUpdate, UserRecommendations};
pub use postgres::PostgresStorage;
pub use storage::RecommendationStorage;
