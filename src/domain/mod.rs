//! Domain layer: object identity and tenancy types.
//!
//! This module contains the identity abstraction that turns arbitrary
//! domain objects into stable string identifiers and back, plus the
//! site (tenant) and user key types those identifiers are scoped by.

pub mod identifier;
pub mod site;
pub mod user_id;

pub use identifier::{Identifiable, Identifier, ObjectRef, ResolveIdentifier};
pub use site::{Site, SiteId};
pub use user_id::UserId;
