//! Document serialization: object trees to/from a portable nested document.
//!
//! One document model (`serde_json::Value`), two physical encodings — an
//! indented, human-readable text form and a compact msgpack binary form.
//! Reading a document additionally records the parent/child adjacency the
//! path-map compiler consumes, so every deserialization yields both a tree
//! and its path index.
//!
//! Failure policy: each read/write step reports a success flag and the
//! steps of an object or property chain by logical AND — any failure
//! discards the whole result at the public boundary. Partial documents are
//! never surfaced.

pub mod document;
pub(crate) mod graph;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::context::MetaContext;
use crate::model::object::{Object, ObjectRef};
use crate::model::property::{Property, PropertyScalar};
use crate::paths::PathMap;
use crate::{Error, Result};

pub use document::{DocumentDeserializer, DocumentSerializer};
use document::DeserializeMode;

// ============================================================================
// Typed write/read interfaces
// ============================================================================

/// Typed write operations of a depth-first document writer.
///
/// Objects and properties drive this through their `accept` methods; the
/// concrete shape is always known locally, so there is no dynamic dispatch.
pub trait PropertySerializer {
    fn write_u16(&mut self, key: &str, value: u16) -> bool;
    fn write_u32(&mut self, key: &str, value: u32) -> bool;
    fn write_i8(&mut self, key: &str, value: i8) -> bool;
    fn write_str(&mut self, key: &str, value: &str) -> bool;

    /// Write one leaf value under `key`.
    fn write_value<T: Serialize>(&mut self, key: &str, value: &T) -> bool;
    /// Write a list of leaf values under `key`.
    fn write_values<T: Serialize>(&mut self, key: &str, values: &[T]) -> bool;

    /// Write a nested-object attribute value; an empty slot becomes an
    /// empty document object.
    fn write_object_value(&mut self, key: &str, value: &ObjectRef) -> bool;
    /// Write a list of nested-object values; an empty slot becomes a
    /// document null.
    fn write_object_values(&mut self, key: &str, values: &[ObjectRef]) -> bool;

    /// Enter/leave the properties block of the current object.
    fn begin_properties(&mut self) -> bool;
    fn commit_properties(&mut self) -> bool;

    /// Enter/leave the sub-node of one property.
    fn begin_property(&mut self, name: &str) -> bool;
    fn commit_property(&mut self, name: &str) -> bool;

    fn write_property<T: PropertyScalar>(&mut self, name: &str, property: &Property<T>) -> bool
    where
        Self: Sized,
    {
        self.begin_property(name)
            && property.accept_serializer(self)
            && self.commit_property(name)
    }
}

/// Typed read operations of a depth-first document reader.
pub trait PropertyDeserializer {
    fn read_u16(&mut self, key: &str) -> Option<u16>;
    fn read_u32(&mut self, key: &str) -> Option<u32>;
    fn read_i8(&mut self, key: &str) -> Option<i8>;
    fn read_str(&mut self, key: &str) -> Option<String>;

    fn read_value<T: DeserializeOwned>(&mut self, key: &str) -> Option<T>;
    fn read_values<T: DeserializeOwned>(&mut self, key: &str) -> Option<Vec<T>>;

    fn read_object_value(&mut self, key: &str) -> Option<ObjectRef>;
    fn read_object_values(&mut self, key: &str) -> Option<Vec<ObjectRef>>;

    fn begin_properties(&mut self) -> bool;
    fn commit_properties(&mut self) -> bool;

    fn begin_property(&mut self, name: &str) -> bool;
    fn commit_property(&mut self, name: &str) -> bool;

    /// Issue a fresh property id — the backfill for a stored id of zero.
    fn fresh_property_id(&mut self) -> Option<u16>;

    fn read_property<T: PropertyScalar>(
        &mut self,
        name: &str,
        property: &mut Property<T>,
    ) -> bool
    where
        Self: Sized,
    {
        self.begin_property(name)
            && property.accept_deserializer(self)
            && self.commit_property(name)
    }
}

// ============================================================================
// Documents
// ============================================================================

/// A finished document, convertible to either physical encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedDocument {
    root: serde_json::Value,
}

impl SerializedDocument {
    /// The indented text encoding.
    pub fn to_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.root
            .serialize(&mut serializer)
            .map_err(|err| Error::Serialization(err.to_string()))?;
        String::from_utf8(buffer).map_err(|err| Error::Serialization(err.to_string()))
    }

    /// The compact binary encoding. The binary codec cannot fail on a
    /// well-formed document; an internal codec failure is a fatal condition,
    /// not something to recover a partial buffer from.
    pub fn to_binary(&self) -> Vec<u8> {
        rmp_serde::to_vec(&self.root)
            .expect("binary encoding of a well-formed document cannot fail")
    }

    pub fn from_text(text: &str) -> Result<SerializedDocument> {
        let root = serde_json::from_str(text)
            .map_err(|err| Error::Deserialization(err.to_string()))?;
        Ok(SerializedDocument { root })
    }

    pub fn from_binary(bytes: &[u8]) -> Result<SerializedDocument> {
        let root = rmp_serde::from_slice(bytes)
            .map_err(|err| Error::Deserialization(err.to_string()))?;
        Ok(SerializedDocument { root })
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.root
    }

    pub(crate) fn from_value(root: serde_json::Value) -> SerializedDocument {
        SerializedDocument { root }
    }
}

/// What a deserialization pass produces: the rebuilt tree plus the path map
/// compiled from the adjacency recorded along the way.
#[derive(Debug)]
pub struct DeserializedTree {
    pub root: Object,
    pub paths: PathMap,
}

// ============================================================================
// Entry points
// ============================================================================

/// Walk an object tree into a document.
pub fn serialize_object(object: &Object) -> Result<SerializedDocument> {
    let mut serializer = DocumentSerializer::new();
    if !serializer.serialize(object) {
        return Err(Error::Serialization("object tree rejected a write step".into()));
    }
    let root = serializer
        .finish()
        .ok_or_else(|| Error::Serialization("unbalanced document frames".into()))?;
    debug!(object = object.name(), "object serialized");
    Ok(SerializedDocument::from_value(root))
}

/// Prototype-bound deserialization: every object node's prototype id is
/// looked up in the context and values are applied on top of a fresh
/// instance. Unknown or empty prototype ids fail the pass.
pub fn deserialize_object(
    ctx: &MetaContext,
    document: &SerializedDocument,
) -> Result<DeserializedTree> {
    deserialize_with(ctx, document, DeserializeMode::PrototypeBound)
}

/// Dynamic (schema-less) deserialization: properties are rebuilt purely
/// from their recorded `valuetype` tag; the prototype registry is never
/// consulted.
pub fn deserialize_dynamic(
    ctx: &MetaContext,
    document: &SerializedDocument,
) -> Result<DeserializedTree> {
    deserialize_with(ctx, document, DeserializeMode::Dynamic)
}

fn deserialize_with(
    ctx: &MetaContext,
    document: &SerializedDocument,
    mode: DeserializeMode,
) -> Result<DeserializedTree> {
    let mut deserializer = DocumentDeserializer::new(ctx, mode, document.as_value());
    let mut root = deserializer
        .read_root()
        .ok_or_else(|| Error::Deserialization("document rejected during read".into()))?;
    let paths = PathMap::compile(deserializer.recorder(), &mut root);
    debug!(object = root.name(), paths = paths.len(), "object deserialized");
    Ok(DeserializedTree { root, paths })
}
