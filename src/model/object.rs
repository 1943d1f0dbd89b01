//! The meta-object: a named, ordered bag of typed properties.
//!
//! Objects own every property and, transitively, every nested object
//! reachable through an object-kind property. There is no aliasing across a
//! property boundary — assigning an object value moves or clones a whole
//! subtree.

use std::sync::Arc;

use crate::context::MetaContext;
use crate::model::kind::ObjectId;
use crate::model::property::{Property, PropertyScalar};
use crate::model::property_map::PropertyMap;
use crate::model::variant::{PropertyVariant, dispatch_variant};
use crate::prototype::Prototype;
use crate::serialize::{PropertyDeserializer, PropertySerializer};
use crate::{Error, Result};

/// An object-kind property slot: either empty or one owned subtree.
pub type ObjectRef = Option<Box<Object>>;

// ============================================================================
// Object
// ============================================================================

/// A named, ordered mapping of property name to [`PropertyVariant`],
/// optionally bound to the [`Prototype`] that stamped it out.
///
/// The map is ordered (`BTreeMap`): serialization iterates it directly, and
/// a stable iteration order is what makes repeated serializations of the
/// same tree byte-identical.
#[derive(Debug, Clone)]
pub struct Object {
    uid: ObjectId,
    name: String,
    prototype: Option<Arc<Prototype>>,
    properties: PropertyMap,
}

impl Object {
    /// Create an empty, prototype-less object with a context-issued id.
    pub fn new(ctx: &MetaContext, name: impl Into<String>) -> Result<Object> {
        Ok(Object::with_uid(ctx.next_object_id()?, name))
    }

    /// Direct constructor; `uid` may be [`ObjectId::UNASSIGNED`] for trees
    /// that get their identity backfilled later.
    pub fn with_uid(uid: ObjectId, name: impl Into<String>) -> Object {
        Object { uid, name: name.into(), prototype: None, properties: PropertyMap::new() }
    }

    /// Assemble an object from finished parts. This is the shape creator
    /// functions produce; replication wiring happens afterwards in
    /// [`Prototype::instantiate`].
    pub fn assemble(
        prototype: Option<Arc<Prototype>>,
        uid: ObjectId,
        name: impl Into<String>,
        properties: PropertyMap,
    ) -> Object {
        Object { uid, name: name.into(), prototype, properties }
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn uid(&self) -> ObjectId {
        self.uid
    }

    pub(crate) fn set_uid(&mut self, uid: ObjectId) {
        self.uid = uid;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prototype(&self) -> Option<&Arc<Prototype>> {
        self.prototype.as_ref()
    }

    // ------------------------------------------------------------------
    // Property management
    // ------------------------------------------------------------------

    /// Add a property holding `initial` at slot 0. Allocates a fresh
    /// property id and registers the property with the context so a
    /// replicate-flagged property is wired into the fan-out.
    pub fn add_property<T: PropertyScalar>(
        &mut self,
        ctx: &MetaContext,
        name: &str,
        initial: T,
    ) -> Result<&mut Property<T>> {
        if name.is_empty() {
            return Err(Error::PropertyIdIsEmpty);
        }
        if self.properties.contains_key(name) {
            return Err(Error::PropertyAlreadyAdded(name.to_owned()));
        }

        let id = ctx.next_property_id()?;
        let mut variant: PropertyVariant = Property::with_id(id, name, initial).into();
        ctx.register_variant(&mut variant);

        let stored = self.properties.entry(name.to_owned()).or_insert(variant);
        match T::from_variant_mut(stored) {
            Some(property) => Ok(property),
            None => unreachable!("freshly inserted property changed kind"),
        }
    }

    /// Look up the raw variant.
    pub fn get(&self, name: &str) -> Result<&PropertyVariant> {
        if name.is_empty() {
            return Err(Error::PropertyIdIsEmpty);
        }
        self.properties.get(name).ok_or_else(|| Error::PropertyNotFound(name.to_owned()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut PropertyVariant> {
        if name.is_empty() {
            return Err(Error::PropertyIdIsEmpty);
        }
        self.properties.get_mut(name).ok_or_else(|| Error::PropertyNotFound(name.to_owned()))
    }

    /// Typed lookup.
    pub fn property<T: PropertyScalar>(&self, name: &str) -> Result<&Property<T>> {
        let variant = self.get(name)?;
        T::from_variant(variant).ok_or(Error::IncompatiblePropertyType {
            expected: T::KIND,
            got: variant.kind(),
        })
    }

    pub fn property_mut<T: PropertyScalar>(&mut self, name: &str) -> Result<&mut Property<T>> {
        let variant = self.get_mut(name)?;
        let got = variant.kind();
        T::from_variant_mut(variant)
            .ok_or(Error::IncompatiblePropertyType { expected: T::KIND, got })
    }

    /// Typed convenience accessor.
    ///
    /// # Panics
    /// If the property is missing (including: was removed) or holds a
    /// different kind. Use [`property`](Self::property) for a fallible
    /// lookup.
    pub fn at<T: PropertyScalar>(&self, name: &str) -> &Property<T> {
        match self.property::<T>(name) {
            Ok(property) => property,
            Err(err) => panic!("property access '{name}' on object '{}': {err}", self.name),
        }
    }

    pub fn at_mut<T: PropertyScalar>(&mut self, name: &str) -> &mut Property<T> {
        let object_name = self.name.clone();
        match self.property_mut::<T>(name) {
            Ok(property) => property,
            Err(err) => panic!("property access '{name}' on object '{object_name}': {err}"),
        }
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyMap {
        &mut self.properties
    }

    /// Erase a property. A later typed access to the removed name panics
    /// through [`at`](Self::at).
    pub fn remove_property(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::PropertyIdIsEmpty);
        }
        self.properties
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::PropertyNotFound(name.to_owned()))
    }

    // ------------------------------------------------------------------
    // Cloning
    // ------------------------------------------------------------------

    /// Deep copy with fresh identity.
    ///
    /// Prototype-bound objects re-run prototype instantiation with the
    /// current property set as overrides; unbound objects copy their map
    /// manually. Either way every object and property in the copy carries a
    /// freshly issued id, recursively through nested subtrees.
    pub fn deep_clone(&self, ctx: &MetaContext) -> Result<Object> {
        let uid = ctx.next_object_id()?;
        match &self.prototype {
            Some(prototype) => Prototype::instantiate(
                prototype,
                ctx,
                uid,
                &self.name,
                self.properties.clone(),
            ),
            None => {
                let mut properties = self.properties.clone();
                for variant in properties.values_mut() {
                    reissue_ids(ctx, variant)?;
                }
                Ok(Object { uid, name: self.name.clone(), prototype: None, properties })
            }
        }
    }

    // ------------------------------------------------------------------
    // Serialization accept methods
    // ------------------------------------------------------------------

    /// Write order: identity attributes (uid, name, prototypeId), then the
    /// properties block.
    pub(crate) fn accept_serializer<S: PropertySerializer>(&self, serializer: &mut S) -> bool {
        let prototype_id = self.prototype.as_ref().map(|p| p.name()).unwrap_or("");

        let mut ok = true;
        ok = ok && serializer.write_u16("uid", self.uid.0);
        ok = ok && serializer.write_str("name", &self.name);
        ok = ok && serializer.write_str("prototypeId", prototype_id);

        ok = ok && serializer.begin_properties();
        for (name, variant) in &self.properties {
            ok = ok && dispatch_variant!(variant, p => serializer.write_property(name, p));
        }
        ok = ok && serializer.commit_properties();
        ok
    }

    /// The identity attributes are prefetched by the deserializer (it needs
    /// the prototype id before this object can exist); only the properties
    /// block is read here, onto the already-shaped property set.
    pub(crate) fn accept_deserializer<D: PropertyDeserializer>(
        &mut self,
        deserializer: &mut D,
    ) -> bool {
        let mut ok = true;
        ok = ok && deserializer.begin_properties();
        for (name, variant) in self.properties.iter_mut() {
            ok = ok && dispatch_variant!(variant, p => deserializer.read_property(name, p));
        }
        ok = ok && deserializer.commit_properties();
        ok
    }
}

/// Issue fresh ids to a property and every nested subtree it owns.
fn reissue_ids(ctx: &MetaContext, variant: &mut PropertyVariant) -> Result<()> {
    variant.set_id(ctx.next_property_id()?);
    if let Some(property) = variant.downcast_mut::<ObjectRef>() {
        if let Some(nested) = property.default_mut() {
            reissue_object_ids(ctx, nested)?;
        }
        for slot in property.values_mut() {
            if let Some(nested) = slot {
                reissue_object_ids(ctx, nested)?;
            }
        }
    }
    Ok(())
}

fn reissue_object_ids(ctx: &MetaContext, object: &mut Object) -> Result<()> {
    object.set_uid(ctx.next_object_id()?);
    for variant in object.properties.values_mut() {
        reissue_ids(ctx, variant)?;
    }
    Ok(())
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.name == other.name
            && self.prototype.as_ref().map(|p| p.name())
                == other.prototype.as_ref().map(|p| p.name())
            && self.properties == other.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::kind::PropertyValueKind;

    #[test]
    fn test_add_and_lookup() {
        let ctx = MetaContext::new();
        let mut object = Object::new(&ctx, "sensor").unwrap();

        object.add_property(&ctx, "width", 640u32).unwrap();
        object.add_property(&ctx, "label", String::from("left")).unwrap();

        assert_eq!(object.property_count(), 2);
        assert!(object.has_property("width"));
        assert_eq!(*object.at::<u32>("width").value(), 640);
        assert_eq!(object.at::<String>("label").value(), "left");
    }

    #[test]
    fn test_add_rejects_duplicates_and_empty_names() {
        let ctx = MetaContext::new();
        let mut object = Object::new(&ctx, "sensor").unwrap();

        object.add_property(&ctx, "width", 640u32).unwrap();
        assert!(matches!(
            object.add_property(&ctx, "width", 1u32),
            Err(Error::PropertyAlreadyAdded(_))
        ));
        assert!(matches!(
            object.add_property(&ctx, "", 1u32),
            Err(Error::PropertyIdIsEmpty)
        ));
    }

    #[test]
    fn test_typed_lookup_mismatch() {
        let ctx = MetaContext::new();
        let mut object = Object::new(&ctx, "sensor").unwrap();
        object.add_property(&ctx, "width", 640u32).unwrap();

        let err = object.property::<i8>("width").unwrap_err();
        assert!(matches!(
            err,
            Error::IncompatiblePropertyType {
                expected: PropertyValueKind::Int8,
                got: PropertyValueKind::UInt32,
            }
        ));
        assert!(matches!(
            object.property::<u32>("missing"),
            Err(Error::PropertyNotFound(_))
        ));
    }

    #[test]
    #[should_panic(expected = "property access")]
    fn test_at_after_remove_panics() {
        let ctx = MetaContext::new();
        let mut object = Object::new(&ctx, "sensor").unwrap();
        object.add_property(&ctx, "width", 640u32).unwrap();
        object.remove_property("width").unwrap();
        let _ = object.at::<u32>("width");
    }

    #[test]
    fn test_remove_missing_is_an_error() {
        let ctx = MetaContext::new();
        let mut object = Object::new(&ctx, "sensor").unwrap();
        assert!(matches!(
            object.remove_property("ghost"),
            Err(Error::PropertyNotFound(_))
        ));
    }

    #[test]
    fn test_deep_clone_reissues_ids() {
        let ctx = MetaContext::new();
        let mut inner = Object::new(&ctx, "inner").unwrap();
        inner.add_property(&ctx, "depth", 3i16).unwrap();

        let mut outer = Object::new(&ctx, "outer").unwrap();
        outer.add_property(&ctx, "child", Some(Box::new(inner))).unwrap();
        outer.add_property(&ctx, "width", 640u32).unwrap();

        let copy = outer.deep_clone(&ctx).unwrap();
        assert_ne!(copy.uid(), outer.uid());
        assert_ne!(copy.at::<u32>("width").id(), outer.at::<u32>("width").id());
        assert_eq!(*copy.at::<u32>("width").value(), 640);

        let original_child = outer.at::<ObjectRef>("child").value().as_ref().unwrap();
        let cloned_child = copy.at::<ObjectRef>("child").value().as_ref().unwrap();
        assert_ne!(cloned_child.uid(), original_child.uid());
        assert_eq!(*cloned_child.at::<i16>("depth").value(), 3);
    }
}
