//! Transient parent/child recording built while a document is read.
//!
//! The deserializer pushes a node when it descends into an object or
//! property and pops on the way back up; the finished recording is what the
//! path-map compiler consumes. Node ids live in their own 32-bit space,
//! allocated per recording — they never touch the shared object/property id
//! counter.

use std::collections::BTreeMap;

use crate::paths::PropertyAddress;

/// Identifier in the recorder's dedicated node space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NodeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordedNode {
    Object,
    Property,
}

#[derive(Debug)]
pub(crate) struct NodeRecord {
    pub kind: RecordedNode,
    /// Property name; `None` for object nodes.
    pub name: Option<String>,
    /// Where the property slot lives in the finished tree; `None` for
    /// object nodes.
    pub address: Option<PropertyAddress>,
}

// ============================================================================
// Recorder
// ============================================================================

#[derive(Debug, Default)]
pub(crate) struct AdjacencyRecorder {
    next: u32,
    edges: BTreeMap<NodeId, Vec<NodeId>>,
    records: BTreeMap<NodeId, NodeRecord>,
    stack: Vec<NodeId>,
    root: Option<NodeId>,
    suppressed: u32,
}

impl AdjacencyRecorder {
    pub fn new() -> AdjacencyRecorder {
        AdjacencyRecorder::default()
    }

    pub fn push_object(&mut self) {
        self.push(NodeRecord { kind: RecordedNode::Object, name: None, address: None });
    }

    pub fn push_property(&mut self, name: &str, address: PropertyAddress) {
        self.push(NodeRecord {
            kind: RecordedNode::Property,
            name: Some(name.to_owned()),
            address: Some(address),
        });
    }

    fn push(&mut self, record: NodeRecord) {
        if self.suppressed > 0 {
            return;
        }
        let id = NodeId(self.next);
        self.next += 1;

        self.edges.insert(id, Vec::new());
        self.records.insert(id, record);

        if let Some(parent) = self.stack.last() {
            if let Some(children) = self.edges.get_mut(parent) {
                children.push(id);
            }
        } else {
            self.root = Some(id);
        }
        self.stack.push(id);
    }

    pub fn pop(&mut self) {
        if self.suppressed > 0 {
            return;
        }
        self.stack.pop();
    }

    /// Ignore pushes and pops until [`resume`](Self::resume). Used while
    /// reading `default` subtrees, which carry no structural position.
    pub fn suppress(&mut self) {
        self.suppressed += 1;
    }

    pub fn resume(&mut self) {
        self.suppressed = self.suppressed.saturating_sub(1);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn children(&self, node: NodeId) -> Option<&[NodeId]> {
        self.edges.get(&node).map(Vec::as_slice)
    }

    pub fn record(&self, node: NodeId) -> Option<&NodeRecord> {
        self.records.get(&node)
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.records.len()
    }
}
