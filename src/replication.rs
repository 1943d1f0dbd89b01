//! In-process replication fan-out.
//!
//! Properties flagged for replication get a forwarding observer installed at
//! registration time; every successful write then lands here and is fanned
//! out, synchronously, to the handlers registered for that property id. The
//! layer assumes at most one logical counterpart consumes the notifications;
//! crossing a process boundary is someone else's job.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::model::kind::{PropertyId, PropertyValueKind, WideString};
use crate::model::property::PropertyScalar;

// ============================================================================
// Replicated values
// ============================================================================

/// A kind-tagged value as it travels through the fan-out.
///
/// The object kind is deliberately absent: nested-object properties do not
/// replicate.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    WString(WideString),
}

impl ReplicationValue {
    pub fn kind(&self) -> PropertyValueKind {
        match self {
            ReplicationValue::Int8(_) => PropertyValueKind::Int8,
            ReplicationValue::Int16(_) => PropertyValueKind::Int16,
            ReplicationValue::Int32(_) => PropertyValueKind::Int32,
            ReplicationValue::Int64(_) => PropertyValueKind::Int64,
            ReplicationValue::UInt8(_) => PropertyValueKind::UInt8,
            ReplicationValue::UInt16(_) => PropertyValueKind::UInt16,
            ReplicationValue::UInt32(_) => PropertyValueKind::UInt32,
            ReplicationValue::UInt64(_) => PropertyValueKind::UInt64,
            ReplicationValue::Float(_) => PropertyValueKind::Float,
            ReplicationValue::Double(_) => PropertyValueKind::Double,
            ReplicationValue::String(_) => PropertyValueKind::String,
            ReplicationValue::WString(_) => PropertyValueKind::WString,
        }
    }

    /// Extract as i64 if the value is a signed integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ReplicationValue::Int8(v) => Some(*v as i64),
            ReplicationValue::Int16(v) => Some(*v as i64),
            ReplicationValue::Int32(v) => Some(*v as i64),
            ReplicationValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract as u64 if the value is an unsigned integer.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            ReplicationValue::UInt8(v) => Some(*v as u64),
            ReplicationValue::UInt16(v) => Some(*v as u64),
            ReplicationValue::UInt32(v) => Some(*v as u64),
            ReplicationValue::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ReplicationValue::Float(v) => Some(*v as f64),
            ReplicationValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ReplicationValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Conversion into the fan-out representation; implemented by the 12 leaf
/// kinds and nothing else.
pub trait Replicated: PropertyScalar {
    fn to_replication(&self) -> ReplicationValue;
}

macro_rules! impl_replicated {
    ($($ty:ty => $arm:ident),+ $(,)?) => {
        $(
            impl Replicated for $ty {
                fn to_replication(&self) -> ReplicationValue {
                    ReplicationValue::$arm(self.clone())
                }
            }
        )+
    };
}

impl_replicated! {
    i8  => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8  => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    WideString => WString,
}

// ============================================================================
// The hub
// ============================================================================

pub type ReplicationHandler = Arc<dyn Fn(&ReplicationValue, usize) + Send + Sync>;

/// Handler registry keyed by property id. Owned by the context; writes reach
/// it through the forwarding observers the context installs.
#[derive(Default)]
pub(crate) struct ReplicationHub {
    handlers: Mutex<HashMap<PropertyId, Vec<ReplicationHandler>>>,
}

impl ReplicationHub {
    pub(crate) fn new() -> ReplicationHub {
        ReplicationHub::default()
    }

    pub(crate) fn register(&self, property_id: PropertyId, handler: ReplicationHandler) {
        self.handlers.lock().entry(property_id).or_default().push(handler);
    }

    /// Fan `(value, index)` out to every handler for `property_id`,
    /// synchronously on the caller's stack.
    pub(crate) fn notify(&self, property_id: PropertyId, value: &ReplicationValue, index: usize) {
        // Snapshot under the lock, invoke outside it: a handler may register
        // further handlers without deadlocking.
        let snapshot: Vec<ReplicationHandler> = match self.handlers.lock().get(&property_id) {
            Some(list) => list.clone(),
            None => return,
        };
        trace!(%property_id, kind = %value.kind(), index, handlers = snapshot.len(), "replication notify");
        for handler in snapshot {
            handler(value, index);
        }
    }

    pub(crate) fn handler_count(&self, property_id: PropertyId) -> usize {
        self.handlers.lock().get(&property_id).map_or(0, Vec::len)
    }

    pub(crate) fn clear(&self) {
        self.handlers.lock().clear();
    }
}
