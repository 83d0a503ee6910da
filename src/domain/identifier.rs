//! Object identity: stable string identifiers for arbitrary domain objects.
//!
//! The store never sees host-application types directly. Anything that can
//! be recommended implements [`Identifiable`], which yields a dotted *kind*
//! (e.g. `"catalog.product"`) and an opaque object id. Together with the
//! tenant site these form an [`Identifier`], whose canonical text form
//!
//! ```text
//! <kind>:<site_id>:<object_id>
//! ```
//!
//! is the key every score row is stored under. The inverse direction is
//! typed: a host type implements [`ResolveIdentifier`] and callers use
//! [`Identifier::decode`] to get the object back, with kind mismatches
//! rejected instead of silently crossing types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::SiteId;
use crate::error::StoreError;

/// Converts a domain object into identity parts.
///
/// `kind` must be stable across releases and unique per logical type;
/// `object_id` must be stable for the lifetime of the object. Both end up
/// inside stored identifiers, so changing either orphans existing rows.
pub trait Identifiable: Send + Sync {
    /// Stable dotted type name, e.g. `"catalog.product"`.
    ///
    /// Allowed characters: ASCII lowercase, digits, `.`, `_`, `-`.
    fn kind(&self) -> &str;

    /// Stable primary-key string of this object. May contain any
    /// character, including `:`.
    fn object_id(&self) -> String;
}

/// Typed inverse of [`Identifiable`].
///
/// Implemented by host types that can be reconstructed (or looked up)
/// from their object id alone. Used via [`Identifier::decode`].
pub trait ResolveIdentifier: Sized {
    /// The kind string this type is stored under. Must match what the
    /// type's [`Identifiable`] implementation returns.
    const KIND: &'static str;

    /// Rebuilds the object from its id, or `None` when no such object
    /// exists.
    fn from_object_id(object_id: &str) -> Option<Self>;
}

/// Site-free reference to a domain object: a kind plus an object id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Stable dotted type name.
    pub kind: String,
    /// Opaque primary-key string.
    pub object_id: String,
}

impl ObjectRef {
    /// Creates a reference after validating both parts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKind`] if the kind is empty or uses
    /// characters outside the allowed set, and
    /// [`StoreError::IdentifierFormat`] if the object id is empty.
    pub fn new(kind: impl Into<String>, object_id: impl Into<String>) -> Result<Self, StoreError> {
        let kind = kind.into();
        if !is_valid_kind(&kind) {
            return Err(StoreError::InvalidKind(kind));
        }
        let object_id = object_id.into();
        if object_id.is_empty() {
            return Err(StoreError::IdentifierFormat(format!("{kind}:<empty id>")));
        }
        Ok(Self { kind, object_id })
    }

    /// Creates a reference for a domain object.
    ///
    /// # Errors
    ///
    /// Propagates the validation errors of [`ObjectRef::new`].
    pub fn for_object(obj: &dyn Identifiable) -> Result<Self, StoreError> {
        Self::new(obj.kind(), obj.object_id())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.object_id)
    }
}

/// Opaque storage key: an object reference scoped to a tenant site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// The object being identified.
    pub object: ObjectRef,
    /// Tenant the object belongs to.
    pub site: SiteId,
}

impl Identifier {
    /// Creates an identifier from already-validated parts.
    #[must_use]
    pub const fn new(object: ObjectRef, site: SiteId) -> Self {
        Self { object, site }
    }

    /// Creates an identifier for a domain object under the given site.
    ///
    /// # Errors
    ///
    /// Propagates the validation errors of [`ObjectRef::for_object`].
    pub fn for_object(obj: &dyn Identifiable, site: SiteId) -> Result<Self, StoreError> {
        Ok(Self::new(ObjectRef::for_object(obj)?, site))
    }

    /// Converts the identifier back into a typed domain object.
    ///
    /// Returns the object together with the site the identifier was
    /// scoped to.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KindMismatch`] when `T` is stored under a
    /// different kind, and [`StoreError::ObjectNotFound`] when `T` cannot
    /// be rebuilt from the object id.
    pub fn decode<T: ResolveIdentifier>(&self) -> Result<(T, SiteId), StoreError> {
        if self.object.kind != T::KIND {
            return Err(StoreError::KindMismatch {
                expected: T::KIND.to_string(),
                found: self.object.kind.clone(),
            });
        }
        let obj = T::from_object_id(&self.object.object_id)
            .ok_or_else(|| StoreError::ObjectNotFound(self.to_string()))?;
        Ok((obj, self.site))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.object.kind, self.site, self.object.object_id
        )
    }
}

impl FromStr for Identifier {
    type Err = StoreError;

    /// Parses the canonical `kind:site_id:object_id` form.
    ///
    /// The object id is the remainder after the second `:`, so ids
    /// containing `:` round-trip unchanged.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.splitn(3, ':');
        let (Some(kind), Some(site), Some(object_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(StoreError::IdentifierFormat(raw.to_string()));
        };
        let site: i32 = site
            .parse()
            .map_err(|_| StoreError::IdentifierFormat(raw.to_string()))?;
        Ok(Self::new(
            ObjectRef::new(kind, object_id)?,
            SiteId::new(site),
        ))
    }
}

/// A kind is a non-empty run of ASCII lowercase, digits, `.`, `_`, `-`.
fn is_valid_kind(kind: &str) -> bool {
    !kind.is_empty()
        && kind
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
}
