//! The path map: one canonical slash-delimited path per leaf property.
//!
//! Compiled from the adjacency recording of a deserialization pass by a
//! depth-first traversal. Entries address the live tree — resolving one
//! yields the property at that path, mutably if asked, so a thin command
//! layer can service `writeProperty`-style requests with a lookup plus
//! [`Property::set_value`](crate::model::Property::set_value).

use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use crate::model::object::{Object, ObjectRef};
use crate::model::property::PropertyScalar;
use crate::model::variant::PropertyVariant;
use crate::serialize::graph::{AdjacencyRecorder, NodeId, RecordedNode};
use crate::{Error, Result};

// ============================================================================
// Addresses
// ============================================================================

/// One hop of a property address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Enter the named property of the current object.
    Property(String),
    /// Enter the object stored at this index of the current (object-kind)
    /// property.
    Index(usize),
}

/// Where a property slot lives in a tree: alternating property and index
/// hops, always ending on a property.
pub type PropertyAddress = SmallVec<[PathSegment; 8]>;

// ============================================================================
// Path map
// ============================================================================

/// Flat mapping of canonical path to property address.
#[derive(Debug, Default)]
pub struct PathMap {
    entries: BTreeMap<String, PropertyAddress>,
}

impl PathMap {
    /// Depth-first compilation over the recorded adjacency graph. Cycle-safe
    /// via an explicit visited set even though a recording is acyclic by
    /// construction. As a side effect, every leaf property in `root` gets
    /// its computed path stored on it.
    pub(crate) fn compile(recorder: &AdjacencyRecorder, root: &mut Object) -> PathMap {
        let mut map = PathMap::default();
        let mut visited = BTreeSet::new();
        if let Some(root_node) = recorder.root() {
            map.visit(recorder, root_node, "", &mut visited, root);
        }
        map
    }

    fn visit(
        &mut self,
        recorder: &AdjacencyRecorder,
        node: NodeId,
        current_path: &str,
        visited: &mut BTreeSet<NodeId>,
        root: &mut Object,
    ) {
        if !visited.insert(node) {
            return;
        }
        // A node the recording knows no children for is fully represented
        // elsewhere.
        let Some(children) = recorder.children(node) else { return };
        let Some(record) = recorder.record(node) else { return };

        let path = match (&record.kind, &record.name) {
            (RecordedNode::Property, Some(name)) => format!("{current_path}/{name}"),
            _ => current_path.to_owned(),
        };

        if children.is_empty() {
            // Leaf property: stamp the path onto the live property and index it.
            if let Some(address) = &record.address {
                if let Some(variant) = resolve_address_mut(root, address) {
                    variant.set_path(&path);
                }
                self.entries.insert(path, address.clone());
            }
            return;
        }

        let is_property = record.kind == RecordedNode::Property;
        for (position, child) in children.iter().enumerate() {
            // Positional segments exist only beneath property nodes: they
            // index a chain slot or an element of a nested-object list.
            let child_path =
                if is_property { format!("{path}/{position}") } else { path.clone() };
            self.visit(recorder, *child, &child_path, visited, root);
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All compiled paths, in lexicographic order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn address(&self, path: &str) -> Option<&PropertyAddress> {
        self.entries.get(path)
    }

    /// Resolve a path against the tree the map was compiled over.
    pub fn resolve<'a>(&self, root: &'a Object, path: &str) -> Option<&'a PropertyVariant> {
        resolve_address(root, self.entries.get(path)?)
    }

    pub fn resolve_mut<'a>(
        &self,
        root: &'a mut Object,
        path: &str,
    ) -> Option<&'a mut PropertyVariant> {
        resolve_address_mut(root, self.entries.get(path)?)
    }

    /// Write-by-path: the core of the external `writeProperty` command.
    /// Returns `Ok(false)` when the property itself declined the write
    /// (not writable, index out of range, value out of range).
    pub fn set_value_at<T: PropertyScalar>(
        &self,
        root: &mut Object,
        path: &str,
        index: usize,
        value: T,
    ) -> Result<bool> {
        let variant = self
            .resolve_mut(root, path)
            .ok_or_else(|| Error::PropertyNotFound(path.to_owned()))?;
        let got = variant.kind();
        let property = variant
            .downcast_mut::<T>()
            .ok_or(Error::IncompatiblePropertyType { expected: T::KIND, got })?;
        Ok(property.set_value(value, index))
    }
}

// ============================================================================
// Address resolution
// ============================================================================

fn resolve_address<'a>(root: &'a Object, address: &[PathSegment]) -> Option<&'a PropertyVariant> {
    let mut object = root;
    let mut segments = address.iter().peekable();
    loop {
        let PathSegment::Property(name) = segments.next()? else { return None };
        let variant = object.properties().get(name)?;
        match segments.peek() {
            None => return Some(variant),
            Some(PathSegment::Index(_)) => {
                let Some(PathSegment::Index(index)) = segments.next() else { return None };
                let property = variant.downcast_ref::<ObjectRef>()?;
                object = property.values().get(*index)?.as_deref()?;
            }
            Some(PathSegment::Property(_)) => return None,
        }
    }
}

fn resolve_address_mut<'a>(
    root: &'a mut Object,
    address: &[PathSegment],
) -> Option<&'a mut PropertyVariant> {
    let mut object = root;
    let mut segments = address.iter().peekable();
    loop {
        let PathSegment::Property(name) = segments.next()? else { return None };
        let variant = object.properties_mut().get_mut(name)?;
        match segments.peek() {
            None => return Some(variant),
            Some(PathSegment::Index(_)) => {
                let Some(PathSegment::Index(index)) = segments.next() else { return None };
                let property = variant.downcast_mut::<ObjectRef>()?;
                object = property.values_mut().get_mut(*index)?.as_deref_mut()?;
            }
            Some(PathSegment::Property(_)) => return None,
        }
    }
}
