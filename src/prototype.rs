//! Prototypes: named canonical property templates plus a factory function.
//!
//! A prototype is defined once (builder-style), registered with the context,
//! and from then on stamps out instances by merging caller overrides onto
//! its canonical property set. Instance ids are recorded in an internal
//! table that is never purged automatically.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::context::MetaContext;
use crate::model::kind::ObjectId;
use crate::model::object::Object;
use crate::model::property_map::PropertyMap;
use crate::model::variant::PropertyVariant;
use crate::Result;

/// Builds the concrete instance once identity and the merged property set
/// are known. The default creator assembles a plain [`Object`]; a custom
/// creator can produce a differently wired instance shape.
pub type CreatorFn =
    Arc<dyn Fn(Option<Arc<Prototype>>, ObjectId, &str, PropertyMap) -> Object + Send + Sync>;

// ============================================================================
// Prototype
// ============================================================================

pub struct Prototype {
    name: String,
    canonical: PropertyMap,
    creator: CreatorFn,
    instances: Mutex<BTreeMap<ObjectId, String>>,
}

impl Prototype {
    pub fn new(name: impl Into<String>) -> Prototype {
        Prototype {
            name: name.into(),
            canonical: PropertyMap::new(),
            creator: Arc::new(|prototype, uid, name, properties| {
                Object::assemble(prototype, uid, name, properties)
            }),
            instances: Mutex::new(BTreeMap::new()),
        }
    }

    /// Add a property definition to the canonical set, keyed by its name.
    pub fn with_property(mut self, property: impl Into<PropertyVariant>) -> Self {
        let variant = property.into();
        self.canonical.insert(variant.name().to_owned(), variant);
        self
    }

    pub fn with_creator(
        mut self,
        creator: impl Fn(Option<Arc<Prototype>>, ObjectId, &str, PropertyMap) -> Object
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.creator = Arc::new(creator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn canonical_properties(&self) -> &PropertyMap {
        &self.canonical
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn has_instance(&self, uid: ObjectId) -> bool {
        self.instances.lock().contains_key(&uid)
    }

    // ------------------------------------------------------------------
    // Instantiation
    // ------------------------------------------------------------------

    /// Create an instance and register its properties with the context so
    /// replicate-flagged properties are wired into the fan-out.
    ///
    /// `uid` may be [`ObjectId::UNASSIGNED`] to have one issued here.
    pub fn instantiate(
        prototype: &Arc<Prototype>,
        ctx: &MetaContext,
        uid: ObjectId,
        name: &str,
        overrides: PropertyMap,
    ) -> Result<Object> {
        let mut object = Prototype::instantiate_unregistered(prototype, ctx, uid, name, overrides)?;
        for variant in object.properties_mut().values_mut() {
            ctx.register_variant(variant);
        }
        Ok(object)
    }

    /// Instantiation without replication wiring. The deserializer uses this:
    /// it must first apply the stored values (including the stored property
    /// ids and replication flags) before forwarding observers make sense.
    pub(crate) fn instantiate_unregistered(
        prototype: &Arc<Prototype>,
        ctx: &MetaContext,
        uid: ObjectId,
        name: &str,
        overrides: PropertyMap,
    ) -> Result<Object> {
        let uid = if uid.is_unassigned() { ctx.next_object_id()? } else { uid };
        let properties = prototype.merge_properties(ctx, overrides)?;
        let object = (prototype.creator)(Some(prototype.clone()), uid, name, properties);

        prototype.instances.lock().insert(uid, name.to_owned());
        debug!(prototype = prototype.name.as_str(), %uid, name, "instance created");
        Ok(object)
    }

    /// The merge: every canonical key lands in the result, the caller's
    /// override preferred over the canonical default, and every property —
    /// whatever its origin — is issued a brand-new id. Override keys with no
    /// canonical counterpart are dropped.
    fn merge_properties(&self, ctx: &MetaContext, mut overrides: PropertyMap) -> Result<PropertyMap> {
        let mut merged = PropertyMap::new();
        for (key, canonical) in &self.canonical {
            let mut variant = match overrides.remove(key) {
                Some(override_variant) => override_variant,
                None => canonical.clone(),
            };
            variant.set_id(ctx.next_property_id()?);
            merged.insert(key.clone(), variant);
        }
        Ok(merged)
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prototype")
            .field("name", &self.name)
            .field("properties", &self.canonical.len())
            .field("instances", &self.instances.lock().len())
            .finish_non_exhaustive()
    }
}
