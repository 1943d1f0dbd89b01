//! The explicitly shared system context: identifier generation, the
//! prototype registry, and the replication hub.
//!
//! There is no hidden global here — callers construct a context with
//! [`MetaContext::new`] and pass the `Arc` handle wherever ids or prototypes
//! are needed. All three concerns are internally synchronized, so one
//! context can serve a command thread and a network-reactor thread at once.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::model::kind::{ObjectId, PropertyId};
use crate::model::object::Object;
use crate::model::property::Property;
use crate::model::property_map::PropertyMap;
use crate::model::variant::PropertyVariant;
use crate::prototype::Prototype;
use crate::replication::{Replicated, ReplicationHub, ReplicationValue};
use crate::{Error, Result};

/// Issued ids above this watermark log a warning: the 16-bit space is close
/// to running out.
const ID_EXHAUSTION_WATERMARK: u32 = 65_024;

// ============================================================================
// Context
// ============================================================================

/// Shared state of one meta-object world.
///
/// Object ids and property ids are drawn from one monotonically increasing
/// 16-bit counter, so the two series interleave and can coincide numerically
/// with each other — never within one series. The first issued id is 1; 0 is
/// reserved as "unassigned".
pub struct MetaContext {
    self_ref: Weak<MetaContext>,
    next_id: AtomicU32,
    prototypes: RwLock<HashMap<String, Arc<Prototype>>>,
    hub: ReplicationHub,
}

impl MetaContext {
    pub fn new() -> Arc<MetaContext> {
        Arc::new_cyclic(|self_ref| MetaContext {
            self_ref: self_ref.clone(),
            next_id: AtomicU32::new(0),
            prototypes: RwLock::new(HashMap::new()),
            hub: ReplicationHub::new(),
        })
    }

    // ------------------------------------------------------------------
    // Identifier generation
    // ------------------------------------------------------------------

    pub fn next_object_id(&self) -> Result<ObjectId> {
        self.next_raw().map(ObjectId)
    }

    pub fn next_property_id(&self) -> Result<PropertyId> {
        self.next_raw().map(PropertyId)
    }

    fn next_raw(&self) -> Result<u16> {
        let previous = self
            .next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                if current >= u16::MAX as u32 { None } else { Some(current + 1) }
            })
            .map_err(|_| Error::IdSpaceExhausted)?;
        let issued = previous + 1;
        if issued >= ID_EXHAUSTION_WATERMARK {
            warn!(issued, remaining = u16::MAX as u32 - issued, "identifier space nearly exhausted");
        }
        Ok(issued as u16)
    }

    // ------------------------------------------------------------------
    // Prototype registry
    // ------------------------------------------------------------------

    /// Register a prototype under its name. Registration is idempotent:
    /// the first registration wins and later ones return the original,
    /// untouched entry.
    pub fn register_prototype(&self, prototype: Prototype) -> Arc<Prototype> {
        let mut table = self.prototypes.write();
        if let Some(existing) = table.get(prototype.name()) {
            warn!(name = prototype.name(), "prototype already registered; keeping the first");
            return existing.clone();
        }
        debug!(
            name = prototype.name(),
            properties = prototype.canonical_properties().len(),
            "prototype registered"
        );
        let shared = Arc::new(prototype);
        table.insert(shared.name().to_owned(), shared.clone());
        shared
    }

    pub fn prototype(&self, name: &str) -> Option<Arc<Prototype>> {
        self.prototypes.read().get(name).cloned()
    }

    pub fn prototype_count(&self) -> usize {
        self.prototypes.read().len()
    }

    /// Instantiate a registered prototype. Overrides merge onto the
    /// canonical property set; extraneous override keys are dropped.
    pub fn create_instance(
        &self,
        prototype_name: &str,
        instance_name: &str,
        overrides: PropertyMap,
    ) -> Result<Object> {
        let prototype = self
            .prototype(prototype_name)
            .ok_or_else(|| Error::PrototypeNotFound(prototype_name.to_owned()))?;
        Prototype::instantiate(&prototype, self, ObjectId::UNASSIGNED, instance_name, overrides)
    }

    // ------------------------------------------------------------------
    // Replication wiring
    // ------------------------------------------------------------------

    /// Register a property with the context. A replicate-flagged property
    /// gets a forwarding observer installed on every value index; writes
    /// then fan out through the replication hub under the property's id.
    /// Object-kind properties do not replicate and pass through untouched.
    pub fn register_variant(&self, variant: &mut PropertyVariant) {
        use PropertyVariant as V;
        match variant {
            V::Int8(p) => self.install_forwarding(p),
            V::Int16(p) => self.install_forwarding(p),
            V::Int32(p) => self.install_forwarding(p),
            V::Int64(p) => self.install_forwarding(p),
            V::UInt8(p) => self.install_forwarding(p),
            V::UInt16(p) => self.install_forwarding(p),
            V::UInt32(p) => self.install_forwarding(p),
            V::UInt64(p) => self.install_forwarding(p),
            V::Float(p) => self.install_forwarding(p),
            V::Double(p) => self.install_forwarding(p),
            V::String(p) => self.install_forwarding(p),
            V::WString(p) => self.install_forwarding(p),
            V::Object(_) => {}
        }
    }

    fn install_forwarding<T: Replicated>(&self, property: &mut Property<T>) {
        if !property.is_replicated() {
            return;
        }
        let property_id = property.id();
        for index in 0..property.capacity() as usize {
            let context = self.self_ref.clone();
            let observed = property.observe(index, move |value: &T, index| {
                if let Some(context) = context.upgrade() {
                    context.hub.notify(property_id, &value.to_replication(), index);
                }
            });
            debug_assert!(observed.is_ok(), "index stays below capacity");
        }
    }

    /// Subscribe to the fan-out of one property id.
    pub fn register_replication_callback(
        &self,
        property_id: PropertyId,
        handler: impl Fn(&ReplicationValue, usize) + Send + Sync + 'static,
    ) {
        self.hub.register(property_id, Arc::new(handler));
    }

    pub fn replication_handler_count(&self, property_id: PropertyId) -> usize {
        self.hub.handler_count(property_id)
    }

    /// Tear down the replication hub. The prototype table is deliberately
    /// retained: registrations survive a deinitialize, and re-registering
    /// a known prototype stays a no-op.
    pub fn deinitialize(&self) {
        self.hub.clear();
        debug!("context deinitialized; prototype table retained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_id_is_one_and_series_interleave() {
        let ctx = MetaContext::new();
        assert_eq!(ctx.next_object_id().unwrap(), ObjectId(1));
        assert_eq!(ctx.next_property_id().unwrap(), PropertyId(2));
        assert_eq!(ctx.next_object_id().unwrap(), ObjectId(3));
    }

    #[test]
    fn test_id_space_exhaustion() {
        let ctx = MetaContext::new();
        for _ in 0..u16::MAX {
            ctx.next_property_id().unwrap();
        }
        assert!(matches!(ctx.next_property_id(), Err(Error::IdSpaceExhausted)));
        // Still exhausted on a later attempt; the counter does not wrap.
        assert!(matches!(ctx.next_object_id(), Err(Error::IdSpaceExhausted)));
    }

    #[test]
    fn test_prototype_registration_first_wins() {
        let ctx = MetaContext::new();
        let first = ctx.register_prototype(
            Prototype::new("Sensor").with_property(Property::define("Width", 640u32)),
        );
        let second = ctx.register_prototype(Prototype::new("Sensor"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.prototype_count(), 1);
        assert_eq!(
            ctx.prototype("Sensor").unwrap().canonical_properties().len(),
            1,
            "the empty re-registration must not replace the original"
        );
    }

    #[test]
    fn test_deinitialize_keeps_prototypes_drops_handlers() {
        let ctx = MetaContext::new();
        ctx.register_prototype(Prototype::new("Sensor"));
        ctx.register_replication_callback(PropertyId(3), |_, _| {});
        assert_eq!(ctx.replication_handler_count(PropertyId(3)), 1);

        ctx.deinitialize();
        assert_eq!(ctx.replication_handler_count(PropertyId(3)), 0);
        assert_eq!(ctx.prototype_count(), 1);
    }

    #[test]
    fn test_forwarding_installed_only_for_replicated() {
        let ctx = MetaContext::new();
        let mut plain: PropertyVariant = Property::define("plain", 1i32).into();
        ctx.register_variant(&mut plain);
        assert_eq!(plain.downcast_ref::<i32>().unwrap().observer_count(0), 0);

        let mut replicated: PropertyVariant =
            Property::define("wired", 1i32).with_capacity(2).with_replicated(true).into();
        ctx.register_variant(&mut replicated);
        let property = replicated.downcast_ref::<i32>().unwrap();
        assert_eq!(property.observer_count(0), 1);
        assert_eq!(property.observer_count(1), 1);
    }
}
