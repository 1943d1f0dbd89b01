//! # metaprop — Reflective Meta-Object Property System
//!
//! A runtime meta-object model: objects are named bags of typed, observable
//! properties, stamped out from registered prototypes, serializable to an
//! indented text or compact binary document, and addressable through
//! compiled slash-delimited paths.
//!
//! ## Design Principles
//!
//! 1. **Closed kind set**: twelve leaf value kinds plus nested objects —
//!    dispatch is a plain `enum`, never `dyn Any`
//! 2. **One write path**: every mutation funnels through
//!    [`Property::set_value`], which gates on writability, index and range
//!    and is the single hook for observers and replication
//! 3. **Explicit context**: identifier generation, the prototype registry
//!    and the replication hub live in a [`MetaContext`] handle the caller
//!    owns — no hidden global
//! 4. **Whole-tree codecs**: a document either round-trips completely or the
//!    pass fails; partial trees are never surfaced
//!
//! ## Quick Start
//!
//! ```rust
//! use metaprop::{MetaContext, Object};
//!
//! # fn example() -> metaprop::Result<()> {
//! let ctx = MetaContext::new();
//!
//! // Build an object with two typed properties.
//! let mut camera = Object::new(&ctx, "camera")?;
//! camera.add_property(&ctx, "exposure", 125u32)?;
//! camera.add_property(&ctx, "label", String::from("left"))?;
//! camera.at_mut::<u32>("exposure").set(250);
//!
//! // Round-trip through the document format; reading back also compiles
//! // the path map.
//! let document = metaprop::serialize::serialize_object(&camera)?;
//! let tree = metaprop::serialize::deserialize_dynamic(&ctx, &document)?;
//!
//! assert_eq!(*tree.root.at::<u32>("exposure").value(), 250);
//! assert!(tree.paths.contains("/exposure"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod context;
pub mod model;
pub mod paths;
pub mod prototype;
pub mod replication;
pub mod serialize;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Object, ObjectId, ObjectRef, ObserverId, Property, PropertyId, PropertyMap,
    PropertyScalar, PropertyValueKind, PropertyVariant, StructureType, WideString,
};

// ============================================================================
// Re-exports: Context and prototypes
// ============================================================================

pub use context::MetaContext;
pub use prototype::{CreatorFn, Prototype};

// ============================================================================
// Re-exports: Replication
// ============================================================================

pub use replication::{Replicated, ReplicationValue};

// ============================================================================
// Re-exports: Serialization and paths
// ============================================================================

pub use paths::{PathMap, PathSegment, PropertyAddress};
pub use serialize::{DeserializedTree, SerializedDocument};

// ============================================================================
// Errors
// ============================================================================

/// Everything that can go wrong across the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A property name must be non-empty.
    #[error("property name is empty")]
    PropertyIdIsEmpty,

    /// Each property name appears at most once per object.
    #[error("property already added: {0}")]
    PropertyAlreadyAdded(String),

    /// Lookup by name or path found nothing.
    #[error("property not found: {0}")]
    PropertyNotFound(String),

    /// A typed access named a kind the property does not hold.
    #[error("incompatible property type: expected {expected}, got {got}")]
    IncompatiblePropertyType {
        expected: PropertyValueKind,
        got: PropertyValueKind,
    },

    /// A value index at or beyond the property's capacity.
    #[error("value index {index} out of bounds (capacity {capacity})")]
    ValueIndexOutOfBounds { index: usize, capacity: usize },

    /// Instantiation named a prototype the registry does not know.
    #[error("prototype not found: {0}")]
    PrototypeNotFound(String),

    /// The shared 16-bit identifier counter ran out.
    #[error("identifier space exhausted")]
    IdSpaceExhausted,

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
