//! The tagged union over `Property<K>` for every leaf kind.
//!
//! This enum is the single polymorphism mechanism of the crate: every
//! cross-cutting operation is an exhaustive match over it. There is no
//! dynamic dispatch anywhere in the property model.

use crate::model::kind::{PropertyId, PropertyValueKind, StructureType, WideString};
use crate::model::object::ObjectRef;
use crate::model::property::{Property, PropertyScalar};
use crate::serialize::{PropertyDeserializer, PropertySerializer};

// ============================================================================
// The variant
// ============================================================================

/// `Property<K>` for every K in the closed kind set.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyVariant {
    Int8(Property<i8>),
    Int16(Property<i16>),
    Int32(Property<i32>),
    Int64(Property<i64>),
    UInt8(Property<u8>),
    UInt16(Property<u16>),
    UInt32(Property<u32>),
    UInt64(Property<u64>),
    Float(Property<f32>),
    Double(Property<f64>),
    String(Property<String>),
    WString(Property<WideString>),
    Object(Property<ObjectRef>),
}

/// Expands `$body` once per variant arm with `$p` bound to the inner
/// property. The closed-set equivalent of a visitor.
macro_rules! dispatch_variant {
    ($value:expr, $p:ident => $body:expr) => {
        match $value {
            $crate::model::PropertyVariant::Int8($p) => $body,
            $crate::model::PropertyVariant::Int16($p) => $body,
            $crate::model::PropertyVariant::Int32($p) => $body,
            $crate::model::PropertyVariant::Int64($p) => $body,
            $crate::model::PropertyVariant::UInt8($p) => $body,
            $crate::model::PropertyVariant::UInt16($p) => $body,
            $crate::model::PropertyVariant::UInt32($p) => $body,
            $crate::model::PropertyVariant::UInt64($p) => $body,
            $crate::model::PropertyVariant::Float($p) => $body,
            $crate::model::PropertyVariant::Double($p) => $body,
            $crate::model::PropertyVariant::String($p) => $body,
            $crate::model::PropertyVariant::WString($p) => $body,
            $crate::model::PropertyVariant::Object($p) => $body,
        }
    };
}

pub(crate) use dispatch_variant;

impl PropertyVariant {
    pub fn id(&self) -> PropertyId {
        dispatch_variant!(self, p => p.id())
    }

    pub(crate) fn set_id(&mut self, id: PropertyId) {
        dispatch_variant!(self, p => p.set_id(id))
    }

    pub fn name(&self) -> &str {
        dispatch_variant!(self, p => p.name())
    }

    pub fn path(&self) -> &str {
        dispatch_variant!(self, p => p.path())
    }

    pub(crate) fn set_path(&mut self, path: &str) {
        dispatch_variant!(self, p => p.set_path(path))
    }

    pub fn kind(&self) -> PropertyValueKind {
        dispatch_variant!(self, p => p.kind())
    }

    pub fn structure(&self) -> StructureType {
        dispatch_variant!(self, p => p.structure())
    }

    pub fn capacity(&self) -> u32 {
        dispatch_variant!(self, p => p.capacity())
    }

    pub fn is_writable(&self) -> bool {
        dispatch_variant!(self, p => p.is_writable())
    }

    pub fn is_replicated(&self) -> bool {
        dispatch_variant!(self, p => p.is_replicated())
    }

    /// Typed view into the variant; `None` on a kind mismatch.
    pub fn downcast_ref<T: PropertyScalar>(&self) -> Option<&Property<T>> {
        T::from_variant(self)
    }

    pub fn downcast_mut<T: PropertyScalar>(&mut self) -> Option<&mut Property<T>> {
        T::from_variant_mut(self)
    }

    /// Construct an empty property of `kind` — the dynamic (schema-less)
    /// deserialization path, which rebuilds properties purely from their
    /// recorded `valuetype` tag. `Undefined` has no storable shape.
    pub fn empty(kind: PropertyValueKind, name: &str) -> Option<PropertyVariant> {
        use PropertyValueKind as K;
        Some(match kind {
            K::Undefined => return None,
            K::Int8 => Property::<i8>::define(name, 0).into(),
            K::Int16 => Property::<i16>::define(name, 0).into(),
            K::Int32 => Property::<i32>::define(name, 0).into(),
            K::Int64 => Property::<i64>::define(name, 0).into(),
            K::UInt8 => Property::<u8>::define(name, 0).into(),
            K::UInt16 => Property::<u16>::define(name, 0).into(),
            K::UInt32 => Property::<u32>::define(name, 0).into(),
            K::UInt64 => Property::<u64>::define(name, 0).into(),
            K::Float => Property::<f32>::define(name, 0.0).into(),
            K::Double => Property::<f64>::define(name, 0.0).into(),
            K::String => Property::<String>::define(name, String::new()).into(),
            K::WString => Property::<WideString>::define(name, WideString::new()).into(),
            K::Object => Property::<ObjectRef>::define(name, None).into(),
        })
    }

    pub(crate) fn accept_serializer<S: PropertySerializer>(&self, serializer: &mut S) -> bool {
        dispatch_variant!(self, p => p.accept_serializer(serializer))
    }

    pub(crate) fn accept_deserializer<D: PropertyDeserializer>(
        &mut self,
        deserializer: &mut D,
    ) -> bool {
        dispatch_variant!(self, p => p.accept_deserializer(deserializer))
    }
}

impl<T: PropertyScalar> From<Property<T>> for PropertyVariant {
    fn from(property: Property<T>) -> Self {
        T::wrap(property)
    }
}

// ============================================================================
// Per-kind scalar implementations
// ============================================================================

macro_rules! impl_scalar {
    ($ty:ty, $arm:ident, $kind:ident, in_range: $in_range:expr) => {
        impl PropertyScalar for $ty {
            const KIND: PropertyValueKind = PropertyValueKind::$kind;

            fn from_variant(variant: &PropertyVariant) -> Option<&Property<Self>> {
                match variant {
                    PropertyVariant::$arm(p) => Some(p),
                    _ => None,
                }
            }

            fn from_variant_mut(variant: &mut PropertyVariant) -> Option<&mut Property<Self>> {
                match variant {
                    PropertyVariant::$arm(p) => Some(p),
                    _ => None,
                }
            }

            fn wrap(property: Property<Self>) -> PropertyVariant {
                PropertyVariant::$arm(property)
            }

            fn in_range(&self, min: &Self, max: &Self) -> bool {
                let gate: fn(&Self, &Self, &Self) -> bool = $in_range;
                gate(self, min, max)
            }

            fn write_default<S: PropertySerializer>(
                serializer: &mut S,
                key: &str,
                value: &Self,
            ) -> bool {
                serializer.write_value(key, value)
            }

            fn write_slots<S: PropertySerializer>(
                serializer: &mut S,
                key: &str,
                values: &[Self],
            ) -> bool {
                serializer.write_values(key, values)
            }

            fn read_default<D: PropertyDeserializer>(
                deserializer: &mut D,
                key: &str,
            ) -> Option<Self> {
                deserializer.read_value(key)
            }

            fn read_slots<D: PropertyDeserializer>(
                deserializer: &mut D,
                key: &str,
            ) -> Option<Vec<Self>> {
                deserializer.read_values(key)
            }
        }
    };
}

macro_rules! impl_numeric_scalar {
    ($($ty:ty => $arm:ident / $kind:ident),+ $(,)?) => {
        $(
            impl_scalar!($ty, $arm, $kind, in_range: |v, min, max| v >= min && v <= max);

            impl crate::model::property::NumericScalar for $ty {}
        )+
    };
}

impl_numeric_scalar! {
    i8  => Int8 / Int8,
    i16 => Int16 / Int16,
    i32 => Int32 / Int32,
    i64 => Int64 / Int64,
    u8  => UInt8 / UInt8,
    u16 => UInt16 / UInt16,
    u32 => UInt32 / UInt32,
    u64 => UInt64 / UInt64,
    f32 => Float / Float,
    f64 => Double / Double,
}

impl_scalar!(String, String, String, in_range: |_, _, _| true);
impl_scalar!(WideString, WString, WString, in_range: |_, _, _| true);

// The nested-object kind bypasses the generic leaf codec: object values
// recurse through the serializer's dedicated object hooks.
impl PropertyScalar for ObjectRef {
    const KIND: PropertyValueKind = PropertyValueKind::Object;

    fn from_variant(variant: &PropertyVariant) -> Option<&Property<Self>> {
        match variant {
            PropertyVariant::Object(p) => Some(p),
            _ => None,
        }
    }

    fn from_variant_mut(variant: &mut PropertyVariant) -> Option<&mut Property<Self>> {
        match variant {
            PropertyVariant::Object(p) => Some(p),
            _ => None,
        }
    }

    fn wrap(property: Property<Self>) -> PropertyVariant {
        PropertyVariant::Object(property)
    }

    fn in_range(&self, _min: &Self, _max: &Self) -> bool {
        true
    }

    fn write_default<S: PropertySerializer>(
        serializer: &mut S,
        key: &str,
        value: &Self,
    ) -> bool {
        serializer.write_object_value(key, value)
    }

    fn write_slots<S: PropertySerializer>(
        serializer: &mut S,
        key: &str,
        values: &[Self],
    ) -> bool {
        serializer.write_object_values(key, values)
    }

    fn read_default<D: PropertyDeserializer>(deserializer: &mut D, key: &str) -> Option<Self> {
        deserializer.read_object_value(key)
    }

    fn read_slots<D: PropertyDeserializer>(
        deserializer: &mut D,
        key: &str,
    ) -> Option<Vec<Self>> {
        deserializer.read_object_values(key)
    }
}
