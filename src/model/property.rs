//! Typed, observable, range-gated property storage.
//!
//! A [`Property<T>`] holds `capacity` values of one leaf kind together with a
//! default value, per-index observers, a writable gate and a replication
//! flag. Every mutation funnels through [`Property::set_value`], which is the
//! single point the replication fan-out hooks into.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::model::kind::{PropertyId, PropertyValueKind, StructureType};
use crate::serialize::{PropertyDeserializer, PropertySerializer};
use crate::{Error, Result};

// ============================================================================
// Scalar trait seams
// ============================================================================

/// Implemented by every type storable in a property slot — the 12 leaf kinds
/// plus the nested-object reference.
///
/// The per-kind implementations live next to [`PropertyVariant`] so the
/// variant plumbing and the codec hooks stay in one place.
///
/// [`PropertyVariant`]: crate::model::PropertyVariant
pub trait PropertyScalar:
    Clone + PartialEq + fmt::Debug + Default + Send + Sync + 'static
{
    /// The kind tag this scalar occupies in the closed kind set.
    const KIND: PropertyValueKind;

    fn from_variant(variant: &crate::model::PropertyVariant) -> Option<&Property<Self>>;
    fn from_variant_mut(variant: &mut crate::model::PropertyVariant)
    -> Option<&mut Property<Self>>;
    fn wrap(property: Property<Self>) -> crate::model::PropertyVariant;

    /// Range gate used by [`Property::set_value`]. Non-numeric kinds always
    /// admit (their range is never set).
    fn in_range(&self, min: &Self, max: &Self) -> bool;

    fn write_default<S: PropertySerializer>(serializer: &mut S, key: &str, value: &Self)
    -> bool;
    fn write_slots<S: PropertySerializer>(serializer: &mut S, key: &str, values: &[Self])
    -> bool;
    fn read_default<D: PropertyDeserializer>(deserializer: &mut D, key: &str) -> Option<Self>;
    fn read_slots<D: PropertyDeserializer>(deserializer: &mut D, key: &str)
    -> Option<Vec<Self>>;
}

/// Marker for the ten numeric kinds; unlocks `set_range`/`with_range`.
pub trait NumericScalar: PropertyScalar + PartialOrd + Copy {}

// ============================================================================
// Observers
// ============================================================================

/// Handle returned by [`Property::observe`], consumed by [`Property::ignore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Handler<T> = Arc<dyn Fn(&T, usize) + Send + Sync>;

struct ObserverEntry<T> {
    id: ObserverId,
    handler: Handler<T>,
}

impl<T> Clone for ObserverEntry<T> {
    fn clone(&self) -> Self {
        ObserverEntry { id: self.id, handler: self.handler.clone() }
    }
}

type ObserverList<T> = SmallVec<[ObserverEntry<T>; 2]>;

// ============================================================================
// Property
// ============================================================================

/// A fixed-capacity sequence of values of one leaf kind.
///
/// Invariants: `values.len() == capacity >= 1`; observers are per index and
/// dropped when a shrink removes their slot; numeric writes outside the
/// configured range are silently discarded.
pub struct Property<T: PropertyScalar> {
    id: PropertyId,
    name: String,
    path: String,
    structure: StructureType,
    capacity: u32,
    default: T,
    values: Vec<T>,
    observers: Vec<ObserverList<T>>,
    writable: bool,
    replicate: bool,
    range: Option<(T, T)>,
    next_observer: u64,
}

impl<T: PropertyScalar> Property<T> {
    /// Define a property with an unassigned id. Prototype authoring and the
    /// dynamic deserializer start here; a real id is issued at registration,
    /// instantiation or load time.
    pub fn define(name: impl Into<String>, initial: T) -> Property<T> {
        Property::with_id(PropertyId::UNASSIGNED, name, initial)
    }

    /// Define a property with a concrete id (slot 0 holds `initial`).
    pub fn with_id(id: PropertyId, name: impl Into<String>, initial: T) -> Property<T> {
        Property {
            id,
            name: name.into(),
            path: String::new(),
            structure: StructureType::Atom,
            capacity: 1,
            default: T::default(),
            values: vec![initial],
            observers: vec![ObserverList::new()],
            writable: true,
            replicate: false,
            range: None,
            next_observer: 0,
        }
    }

    // ------------------------------------------------------------------
    // Builder-style definition
    // ------------------------------------------------------------------

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.set_capacity(capacity);
        self
    }

    pub fn with_default(mut self, default: T) -> Self {
        self.set_default(default);
        self
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn with_replicated(mut self, replicate: bool) -> Self {
        self.replicate = replicate;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: PropertyId) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The slash-delimited structural path. Empty until a deserialization
    /// pass has compiled the path map over the containing tree.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn kind(&self) -> PropertyValueKind {
        T::KIND
    }

    pub fn structure(&self) -> StructureType {
        self.structure
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn default(&self) -> &T {
        &self.default
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub(crate) fn default_mut(&mut self) -> &mut T {
        &mut self.default
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }

    pub fn is_replicated(&self) -> bool {
        self.replicate
    }

    pub fn set_replicated(&mut self, replicate: bool) {
        self.replicate = replicate;
    }

    /// Read the value at slot 0.
    ///
    /// # Panics
    /// Never — capacity is at least 1.
    pub fn value(&self) -> &T {
        &self.values[0]
    }

    /// Read the value at `index`.
    ///
    /// # Panics
    /// If `index >= capacity`. An out-of-range read is a caller bug, not a
    /// recoverable condition.
    pub fn value_at(&self, index: usize) -> &T {
        assert!(
            index < self.capacity as usize,
            "value index {index} out of bounds for property '{}' (capacity {})",
            self.name,
            self.capacity,
        );
        &self.values[index]
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Write `value` into slot `index` and synchronously notify the slot's
    /// observers. Returns `false` — with no write and no notification — if
    /// the property is not writable, the index is out of range, or the value
    /// falls outside the configured numeric range.
    pub fn set_value(&mut self, value: T, index: usize) -> bool {
        if !self.writable {
            return false;
        }
        if index >= self.capacity as usize {
            return false;
        }
        if let Some((min, max)) = &self.range {
            if !value.in_range(min, max) {
                return false;
            }
        }

        self.values[index] = value;
        self.notify(index);
        true
    }

    /// Write slot 0.
    pub fn set(&mut self, value: T) -> bool {
        self.set_value(value, 0)
    }

    /// Replace the default value. Existing slots are untouched; the default
    /// only seeds slots created by a later capacity growth.
    pub fn set_default(&mut self, default: T) {
        self.default = default;
    }

    /// Resize value and observer storage. Growth fills new slots with the
    /// current default; a shrink truncates trailing slots together with any
    /// observers registered on them.
    ///
    /// # Panics
    /// If `capacity == 0`.
    pub fn set_capacity(&mut self, capacity: u32) {
        assert!(capacity >= 1, "property capacity must be at least 1");
        let capacity_usize = capacity as usize;
        let default = self.default.clone();
        self.values.resize(capacity_usize, default);
        self.observers.resize_with(capacity_usize, ObserverList::new);
        self.capacity = capacity;
        self.structure = StructureType::for_capacity(capacity);
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Register `handler` on slot `index`; it runs synchronously inside every
    /// successful [`set_value`](Self::set_value) on that slot.
    pub fn observe(
        &mut self,
        index: usize,
        handler: impl Fn(&T, usize) + Send + Sync + 'static,
    ) -> Result<ObserverId> {
        self.check_index(index)?;
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers[index].push(ObserverEntry { id, handler: Arc::new(handler) });
        Ok(id)
    }

    /// Remove a previously registered observer from slot `index`.
    pub fn ignore(&mut self, index: usize, id: ObserverId) -> Result<()> {
        self.check_index(index)?;
        self.observers[index].retain(|entry| entry.id != id);
        Ok(())
    }

    pub fn observer_count(&self, index: usize) -> usize {
        self.observers.get(index).map_or(0, |list| list.len())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.capacity as usize {
            Ok(())
        } else {
            Err(Error::ValueIndexOutOfBounds { index, capacity: self.capacity as usize })
        }
    }

    fn notify(&self, index: usize) {
        // Handlers run on a snapshot: one of them may observe/ignore through
        // shared state without invalidating this iteration.
        let snapshot: SmallVec<[Handler<T>; 2]> =
            self.observers[index].iter().map(|entry| entry.handler.clone()).collect();
        let value = &self.values[index];
        for handler in snapshot {
            handler(value, index);
        }
    }

    // ------------------------------------------------------------------
    // Serialization accept methods
    // ------------------------------------------------------------------

    pub(crate) fn accept_serializer<S: PropertySerializer>(&self, serializer: &mut S) -> bool {
        let mut ok = true;
        ok = ok && serializer.write_u16("uid", self.id.0);
        ok = ok && serializer.write_str("name", &self.name);
        ok = ok && serializer.write_i8("structuretype", self.structure.wire_tag());
        ok = ok && serializer.write_u32("capacity", self.capacity);
        ok = ok && serializer.write_i8("valuetype", T::KIND.wire_tag());
        ok = ok && T::write_default(serializer, "default", &self.default);
        ok = ok && T::write_slots(serializer, "values", &self.values);
        ok = ok && serializer.write_i8("writable", self.writable as i8);
        ok = ok && serializer.write_i8("replicationmode", self.replicate as i8);
        ok
    }

    pub(crate) fn accept_deserializer<D: PropertyDeserializer>(
        &mut self,
        deserializer: &mut D,
    ) -> bool {
        let Some(uid) = deserializer.read_u16("uid") else { return false };
        // A stored id of zero means "assign a new identity on load".
        let uid = if uid == 0 {
            match deserializer.fresh_property_id() {
                Some(fresh) => fresh,
                None => return false,
            }
        } else {
            uid
        };
        let Some(name) = deserializer.read_str("name") else { return false };
        let Some(structure_tag) = deserializer.read_i8("structuretype") else { return false };
        let Some(structure) = StructureType::from_wire_tag(structure_tag) else { return false };
        let Some(capacity) = deserializer.read_u32("capacity") else { return false };
        if capacity < 1 {
            return false;
        }
        let Some(kind_tag) = deserializer.read_i8("valuetype") else { return false };
        if PropertyValueKind::from_wire_tag(kind_tag) != Some(T::KIND) {
            return false;
        }
        let Some(default) = T::read_default(deserializer, "default") else { return false };
        let Some(values) = T::read_slots(deserializer, "values") else { return false };
        if values.len() != capacity as usize {
            return false;
        }
        let Some(writable) = deserializer.read_i8("writable") else { return false };
        let Some(replicate) = deserializer.read_i8("replicationmode") else { return false };

        self.id = PropertyId(uid);
        self.name = name;
        self.default = default;
        self.set_capacity(capacity);
        self.structure = structure;
        self.values = values;
        self.writable = writable != 0;
        self.replicate = replicate != 0;
        true
    }
}

// ============================================================================
// Numeric range gate
// ============================================================================

impl<T: NumericScalar> Property<T> {
    /// Constrain writes to `[min, max]` and re-clamp every stored slot into
    /// the new range.
    ///
    /// # Panics
    /// If `min > max`.
    pub fn set_range(&mut self, min: T, max: T) {
        assert!(min <= max, "invalid range for property '{}': min > max", self.name);
        for value in &mut self.values {
            if *value < min {
                *value = min;
            } else if *value > max {
                *value = max;
            }
        }
        self.range = Some((min, max));
    }

    pub fn with_range(mut self, min: T, max: T) -> Self {
        self.set_range(min, max);
        self
    }

    pub fn range(&self) -> Option<(T, T)> {
        self.range
    }
}

// ============================================================================
// Std trait impls (observers are identity-less, so they are skipped)
// ============================================================================

impl<T: PropertyScalar> Clone for Property<T> {
    fn clone(&self) -> Self {
        Property {
            id: self.id,
            name: self.name.clone(),
            path: self.path.clone(),
            structure: self.structure,
            capacity: self.capacity,
            default: self.default.clone(),
            values: self.values.clone(),
            observers: self.observers.clone(),
            writable: self.writable,
            replicate: self.replicate,
            range: self.range.clone(),
            next_observer: self.next_observer,
        }
    }
}

impl<T: PropertyScalar> PartialEq for Property<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.path == other.path
            && self.structure == other.structure
            && self.capacity == other.capacity
            && self.default == other.default
            && self.values == other.values
            && self.writable == other.writable
            && self.replicate == other.replicate
            && self.range == other.range
    }
}

impl<T: PropertyScalar> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &T::KIND)
            .field("capacity", &self.capacity)
            .field("values", &self.values)
            .field("default", &self.default)
            .field("writable", &self.writable)
            .field("replicate", &self.replicate)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_define_defaults() {
        let property = Property::define("sensor", 42i32);
        assert_eq!(property.capacity(), 1);
        assert_eq!(*property.value(), 42);
        assert_eq!(*property.default(), 0);
        assert_eq!(property.kind(), PropertyValueKind::Int32);
        assert_eq!(property.structure(), StructureType::Atom);
        assert!(property.is_writable());
        assert!(!property.is_replicated());
    }

    #[test]
    fn test_capacity_growth_fills_with_default() {
        let mut property = Property::define("chain", 7u8).with_default(9);
        property.set_capacity(4);
        assert_eq!(property.values(), &[7, 9, 9, 9]);
        assert_eq!(property.structure(), StructureType::Chain);
    }

    #[test]
    fn test_capacity_shrink_truncates_and_drops_observers() {
        let mut property = Property::define("chain", 0u8).with_capacity(3);
        property.observe(2, |_, _| {}).unwrap();
        assert_eq!(property.observer_count(2), 1);

        property.set_capacity(2);
        assert_eq!(property.values().len(), 2);
        assert_eq!(property.observer_count(2), 0);
        assert_eq!(property.structure(), StructureType::Chain);
    }

    #[test]
    fn test_set_value_gates() {
        let mut property = Property::define("gated", 5i16).with_capacity(2);

        assert!(property.set_value(10, 0));
        assert!(!property.set_value(10, 2), "index beyond capacity");

        property.set_writable(false);
        assert!(!property.set_value(11, 0));
        assert_eq!(*property.value(), 10);
    }

    #[test]
    fn test_range_rejects_and_reclamps() {
        let mut property = Property::define("ranged", 50i32).with_capacity(2);
        property.set_range(0, 100);

        assert!(!property.set_value(101, 0), "out-of-range write is a no-op");
        assert_eq!(*property.value(), 50);

        assert!(property.set_value(100, 0));
        property.set_range(0, 60);
        assert_eq!(*property.value(), 60, "stored value re-clamped");
        assert_eq!(property.range(), Some((0, 60)));
    }

    #[test]
    #[should_panic(expected = "min > max")]
    fn test_invalid_range_panics() {
        let mut property = Property::define("bad", 0i32);
        property.set_range(10, 0);
    }

    #[test]
    fn test_observe_and_ignore() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut property = Property::define("observed", 0i64).with_capacity(2);

        let counter = hits.clone();
        let handle = property
            .observe(1, move |value, index| {
                assert_eq!(index, 1);
                assert_eq!(*value, -23_554_545_342);
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        property.set_value(-23_554_545_342, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Slot 0 write must not reach a slot-1 observer.
        property.set_value(1, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        property.ignore(1, handle).unwrap();
        property.set_value(-23_554_545_342, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_write_does_not_notify() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut property = Property::define("silent", 0u32);
        property.set_range(0, 10);

        let counter = hits.clone();
        property.observe(0, move |_, _| { counter.fetch_add(1, Ordering::SeqCst); }).unwrap();

        assert!(!property.set_value(11, 0));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_value_at_out_of_range_panics() {
        let property = Property::define("narrow", 1u16);
        let _ = property.value_at(1);
    }

    #[test]
    fn test_observe_out_of_range_is_an_error() {
        let mut property = Property::define("narrow", 1u16);
        let err = property.observe(1, |_, _| {}).unwrap_err();
        assert!(matches!(err, Error::ValueIndexOutOfBounds { index: 1, capacity: 1 }));
    }
}
