//! # recommend-store
//!
//! Pluggable persistence boundary for a recommendation engine.
//!
//! The engine that computes similarity and recommendation scores lives
//! elsewhere — this crate only stores and retrieves its precomputed
//! output, keyed by opaque object identifiers and scoped by a
//! multi-tenant site dimension.
//!
//! ## Architecture
//!
//! ```text
//! Recommendation engine (out of scope)
//!     │
//!     ├── RecommendationStorage (persistence/)
//!     │       ├── PostgresStorage — sqlx::PgPool
//!     │       └── MemoryStorage — in-process maps
//!     │
//!     └── Identity (domain/)
//!             Identifiable / ResolveIdentifier ⇄ "kind:site:object_id"
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod persistence;
