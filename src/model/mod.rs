//! # Meta-object data model
//!
//! The types that cross every boundary in the crate: kinds and identifiers,
//! typed properties, the property variant, and the object itself.
//!
//! Design rule: this module is pure data plus synchronous mutation — no I/O,
//! no locking, no async. Shared state lives in [`crate::context`].

pub mod kind;
pub mod object;
pub mod property;
pub mod property_map;
pub mod variant;

pub use kind::{ObjectId, PropertyId, PropertyValueKind, StructureType, WideString};
pub use object::{Object, ObjectRef};
pub use property::{NumericScalar, ObserverId, Property, PropertyScalar};
pub use property_map::PropertyMap;
pub use variant::PropertyVariant;

pub(crate) use variant::dispatch_variant;
