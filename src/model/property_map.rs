//! The property map shared by objects and prototypes.

use std::collections::BTreeMap;

use crate::model::variant::PropertyVariant;

/// Ordered mapping of property name to property. Ordering is deliberate:
/// serialization iterates this map, and deterministic iteration keeps
/// repeated serializations of one tree byte-identical.
pub type PropertyMap = BTreeMap<String, PropertyVariant>;
