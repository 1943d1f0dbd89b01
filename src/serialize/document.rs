//! The concrete document writer and reader.
//!
//! Both keep a stack of "current document node" frames and walk the tree
//! pre-order: identity attributes, then the properties block, recursing
//! into nested-object values as they appear.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::context::MetaContext;
use crate::model::kind::{ObjectId, PropertyValueKind};
use crate::model::object::{Object, ObjectRef};
use crate::model::property_map::PropertyMap;
use crate::model::variant::PropertyVariant;
use crate::paths::PathSegment;
use crate::prototype::Prototype;
use crate::serialize::graph::AdjacencyRecorder;
use crate::serialize::{PropertyDeserializer, PropertySerializer};

// ============================================================================
// Writer
// ============================================================================

/// Depth-first document writer. Frames are built bottom-up: a sub-node is
/// assembled on the stack and folded into its parent on commit.
pub struct DocumentSerializer {
    stack: Vec<Map<String, Value>>,
}

impl DocumentSerializer {
    pub fn new() -> DocumentSerializer {
        DocumentSerializer { stack: Vec::new() }
    }

    /// Walk `object` into the writer. The finished document stays on the
    /// frame stack until [`finish`](Self::finish).
    pub fn serialize(&mut self, object: &Object) -> bool {
        self.stack.push(Map::new());
        object.accept_serializer(self)
    }

    /// Take the finished document. `None` if the frame stack is unbalanced,
    /// which means a begin/commit pair was broken by a failure.
    pub fn finish(mut self) -> Option<Value> {
        if self.stack.len() == 1 {
            self.stack.pop().map(Value::Object)
        } else {
            None
        }
    }

    fn insert(&mut self, key: &str, value: Value) -> bool {
        match self.stack.last_mut() {
            Some(frame) => {
                frame.insert(key.to_owned(), value);
                true
            }
            None => false,
        }
    }

    /// Serialize one nested object into a fresh frame and hand it back.
    fn nested_object(&mut self, object: &Object) -> Option<Value> {
        self.stack.push(Map::new());
        let ok = object.accept_serializer(self);
        let frame = self.stack.pop()?;
        ok.then_some(Value::Object(frame))
    }
}

impl Default for DocumentSerializer {
    fn default() -> Self {
        DocumentSerializer::new()
    }
}

impl PropertySerializer for DocumentSerializer {
    fn write_u16(&mut self, key: &str, value: u16) -> bool {
        self.insert(key, Value::from(value))
    }

    fn write_u32(&mut self, key: &str, value: u32) -> bool {
        self.insert(key, Value::from(value))
    }

    fn write_i8(&mut self, key: &str, value: i8) -> bool {
        self.insert(key, Value::from(value))
    }

    fn write_str(&mut self, key: &str, value: &str) -> bool {
        self.insert(key, Value::from(value))
    }

    fn write_value<T: Serialize>(&mut self, key: &str, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.insert(key, value),
            Err(_) => false,
        }
    }

    fn write_values<T: Serialize>(&mut self, key: &str, values: &[T]) -> bool {
        let mut list = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::to_value(value) {
                Ok(value) => list.push(value),
                Err(_) => return false,
            }
        }
        self.insert(key, Value::Array(list))
    }

    fn write_object_value(&mut self, key: &str, value: &ObjectRef) -> bool {
        let node = match value {
            // An empty attribute slot is written as an empty object.
            None => Value::Object(Map::new()),
            Some(object) => match self.nested_object(object) {
                Some(node) => node,
                None => return false,
            },
        };
        self.insert(key, node)
    }

    fn write_object_values(&mut self, key: &str, values: &[ObjectRef]) -> bool {
        let mut list = Vec::with_capacity(values.len());
        for value in values {
            match value {
                // An empty list slot is written as a document null.
                None => list.push(Value::Null),
                Some(object) => match self.nested_object(object) {
                    Some(node) => list.push(node),
                    None => return false,
                },
            }
        }
        self.insert(key, Value::Array(list))
    }

    fn begin_properties(&mut self) -> bool {
        self.stack.push(Map::new());
        true
    }

    fn commit_properties(&mut self) -> bool {
        match self.stack.pop() {
            Some(frame) => self.insert("properties", Value::Object(frame)),
            None => false,
        }
    }

    fn begin_property(&mut self, _name: &str) -> bool {
        self.stack.push(Map::new());
        true
    }

    fn commit_property(&mut self, name: &str) -> bool {
        match self.stack.pop() {
            Some(frame) => self.insert(name, Value::Object(frame)),
            None => false,
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeserializeMode {
    /// Object nodes are instantiated from their stored prototype id; values
    /// apply on top of the prototype-fixed property set.
    PrototypeBound,
    /// Properties are rebuilt from their `valuetype` tag alone.
    Dynamic,
}

/// Depth-first document reader. Frames borrow into the parsed document;
/// alongside the tree it records the parent/child adjacency and the
/// tree-address of every property node for the path-map compiler.
pub struct DocumentDeserializer<'a> {
    ctx: &'a MetaContext,
    mode: DeserializeMode,
    stack: Vec<&'a Value>,
    recorder: AdjacencyRecorder,
    address: Vec<PathSegment>,
}

impl<'a> DocumentDeserializer<'a> {
    pub(crate) fn new(
        ctx: &'a MetaContext,
        mode: DeserializeMode,
        root: &'a Value,
    ) -> DocumentDeserializer<'a> {
        DocumentDeserializer { ctx, mode, stack: vec![root], recorder: AdjacencyRecorder::new(), address: Vec::new() }
    }

    pub(crate) fn read_root(&mut self) -> Option<Object> {
        self.read_object_node()
    }

    pub(crate) fn recorder(&self) -> &AdjacencyRecorder {
        &self.recorder
    }

    fn top(&self) -> Option<&'a Value> {
        self.stack.last().copied()
    }

    fn field(&self, key: &str) -> Option<&'a Value> {
        self.top()?.get(key)
    }

    /// Read the object node the top frame points at: identity attributes
    /// first, then the properties block per mode.
    fn read_object_node(&mut self) -> Option<Object> {
        let uid = self.read_u16("uid")?;
        // A stored id of zero means "assign a new identity on load".
        let uid = if uid == 0 { self.ctx.next_object_id().ok()?.0 } else { uid };
        let name = self.read_str("name")?;
        let prototype_id = self.read_str("prototypeId")?;

        self.recorder.push_object();
        let object = self.read_object_body(ObjectId(uid), &name, &prototype_id);
        self.recorder.pop();
        object
    }

    fn read_object_body(
        &mut self,
        uid: ObjectId,
        name: &str,
        prototype_id: &str,
    ) -> Option<Object> {
        let mut object = match self.mode {
            DeserializeMode::PrototypeBound => {
                if prototype_id.is_empty() {
                    return None;
                }
                let prototype = self.ctx.prototype(prototype_id)?;
                Prototype::instantiate_unregistered(
                    &prototype,
                    self.ctx,
                    uid,
                    name,
                    PropertyMap::new(),
                )
                .ok()?
            }
            DeserializeMode::Dynamic => Object::with_uid(uid, name),
        };

        let ok = match self.mode {
            DeserializeMode::PrototypeBound => object.accept_deserializer(self),
            DeserializeMode::Dynamic => self.read_dynamic_properties(&mut object),
        };
        if !ok {
            return None;
        }

        // Replication wiring happens only now: the stored property ids and
        // replication flags are in place.
        for variant in object.properties_mut().values_mut() {
            self.ctx.register_variant(variant);
        }
        Some(object)
    }

    /// Schema-less property reading: each property node names its kind, an
    /// empty property of that kind is constructed, and the node is read
    /// into it.
    fn read_dynamic_properties(&mut self, object: &mut Object) -> bool {
        if !self.begin_properties() {
            return false;
        }
        let Some(Value::Object(map)) = self.top() else {
            return false;
        };
        for (name, _) in map {
            if !self.begin_property(name) {
                return false;
            }
            let Some(tag) = self.read_i8("valuetype") else { return false };
            let Some(kind) = PropertyValueKind::from_wire_tag(tag) else { return false };
            let Some(mut variant) = PropertyVariant::empty(kind, name) else { return false };
            if !variant.accept_deserializer(self) {
                return false;
            }
            if !self.commit_property(name) {
                return false;
            }
            object.properties_mut().insert(name.clone(), variant);
        }
        self.commit_properties()
    }
}

impl PropertyDeserializer for DocumentDeserializer<'_> {
    fn read_u16(&mut self, key: &str) -> Option<u16> {
        u16::try_from(self.field(key)?.as_u64()?).ok()
    }

    fn read_u32(&mut self, key: &str) -> Option<u32> {
        u32::try_from(self.field(key)?.as_u64()?).ok()
    }

    fn read_i8(&mut self, key: &str) -> Option<i8> {
        i8::try_from(self.field(key)?.as_i64()?).ok()
    }

    fn read_str(&mut self, key: &str) -> Option<String> {
        Some(self.field(key)?.as_str()?.to_owned())
    }

    fn read_value<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        serde_json::from_value(self.field(key)?.clone()).ok()
    }

    fn read_values<T: DeserializeOwned>(&mut self, key: &str) -> Option<Vec<T>> {
        let list = self.field(key)?.as_array()?;
        list.iter().map(|value| serde_json::from_value(value.clone()).ok()).collect()
    }

    fn read_object_value(&mut self, key: &str) -> Option<ObjectRef> {
        let node = self.field(key)?;
        match node {
            Value::Null => Some(None),
            Value::Object(map) if map.is_empty() => Some(None),
            Value::Object(_) => {
                // Attribute subtrees (the default value) carry no structural
                // position; they stay out of the adjacency recording.
                self.stack.push(node);
                self.recorder.suppress();
                let object = self.read_object_node();
                self.recorder.resume();
                self.stack.pop();
                Some(Some(Box::new(object?)))
            }
            _ => None,
        }
    }

    fn read_object_values(&mut self, key: &str) -> Option<Vec<ObjectRef>> {
        let list = self.field(key)?.as_array()?;
        let mut slots = Vec::with_capacity(list.len());
        for (index, node) in list.iter().enumerate() {
            match node {
                Value::Null => slots.push(None),
                Value::Object(_) => {
                    self.address.push(PathSegment::Index(index));
                    self.stack.push(node);
                    let object = self.read_object_node();
                    self.stack.pop();
                    self.address.pop();
                    slots.push(Some(Box::new(object?)));
                }
                _ => return None,
            }
        }
        Some(slots)
    }

    fn begin_properties(&mut self) -> bool {
        match self.field("properties") {
            Some(node @ Value::Object(_)) => {
                self.stack.push(node);
                true
            }
            _ => false,
        }
    }

    fn commit_properties(&mut self) -> bool {
        self.stack.pop().is_some()
    }

    fn begin_property(&mut self, name: &str) -> bool {
        match self.field(name) {
            Some(node @ Value::Object(_)) => {
                self.stack.push(node);
                self.address.push(PathSegment::Property(name.to_owned()));
                self.recorder.push_property(name, self.address.iter().cloned().collect());
                true
            }
            _ => false,
        }
    }

    fn commit_property(&mut self, _name: &str) -> bool {
        self.recorder.pop();
        self.address.pop();
        self.stack.pop().is_some()
    }

    fn fresh_property_id(&mut self) -> Option<u16> {
        self.ctx.next_property_id().ok().map(|id| id.0)
    }
}
