//! Core identity types for the verification harness.
//!
//! Aggregate types are identified by explicit [`TypeTag`]s and the
//! [`Aggregate`] capability trait rather than runtime reflection. A tag
//! carries the full type path for equality and renders the short name for
//! transcripts. Specialization between aggregate types is declared through
//! [`Aggregate::lineage`], which lists every tag a type can stand in for.

use std::fmt;

use uuid::Uuid;

/// Returns the unqualified name of a type path, keeping generic arguments.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// An explicit tag identifying one aggregate (or event) type.
///
/// Equality compares the full type path; [`fmt::Display`] renders the short
/// name, which is what transcripts and error messages show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag {
    name: &'static str,
}

impl TypeTag {
    /// Creates the tag for a concrete type.
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
        }
    }

    /// The full type path behind this tag.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(short_type_name(self.name))
    }
}

/// Capability trait for aggregate types the harness can script against.
///
/// The default implementations cover the common case of a standalone
/// aggregate. A specialized aggregate overrides [`Aggregate::lineage`] to
/// include the tags of the types it specializes, most specific first.
pub trait Aggregate: 'static {
    /// The tag identifying this aggregate type.
    fn tag() -> TypeTag {
        TypeTag::of::<Self>()
    }

    /// Every tag this aggregate type can stand in for, starting with its own.
    fn lineage() -> Vec<TypeTag> {
        vec![Self::tag()]
    }
}

/// A synthetic identity naming one aggregate instance during a scenario.
///
/// Two identities with the same tag and string form are the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    tag: TypeTag,
    lineage: Vec<TypeTag>,
    value: String,
}

impl Id {
    /// Parses a string form into an identity of the given aggregate type.
    pub fn of<A: Aggregate>(value: impl Into<String>) -> Self {
        Self {
            tag: A::tag(),
            lineage: A::lineage(),
            value: value.into(),
        }
    }

    /// Produces a new identity from discriminating arguments.
    ///
    /// With no arguments the string form is a fresh `UUIDv7`; otherwise the
    /// arguments are joined with `-`. The identity is not registered; the
    /// caller decides whether to hand it to the registry.
    pub fn generate<A: Aggregate>(args: &[&str]) -> Self {
        let value = if args.is_empty() {
            Uuid::now_v7().to_string()
        } else {
            args.join("-")
        };
        Self::of::<A>(value)
    }

    /// The tag of the aggregate type this identity was declared for.
    pub const fn tag(&self) -> TypeTag {
        self.tag
    }

    /// The tags this identity's aggregate type can stand in for.
    pub fn lineage(&self) -> &[TypeTag] {
        &self.lineage
    }

    /// The human-readable string form.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
