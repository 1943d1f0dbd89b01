//! The closed set of leaf value kinds, the identifier newtypes, and the
//! wide-text value type.
//!
//! Wire tags are fixed: documents written by older builds must keep reading
//! back, so the discriminants here are part of the external format.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Identifier newtypes
// ============================================================================

/// Identifier of an object instance. `0` means "unassigned" — a fresh id is
/// backfilled when the object is instantiated or loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u16);

/// Identifier of a property instance. Shares the id space with [`ObjectId`];
/// `0` means "unassigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u16);

impl ObjectId {
    pub const UNASSIGNED: ObjectId = ObjectId(0);

    pub fn is_unassigned(&self) -> bool {
        self.0 == 0
    }
}

impl PropertyId {
    pub const UNASSIGNED: PropertyId = PropertyId(0);

    pub fn is_unassigned(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

// ============================================================================
// Value kinds
// ============================================================================

/// The closed list of leaf value kinds a property can hold.
///
/// Discriminants are the `valuetype` wire tags of the document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum PropertyValueKind {
    Undefined = 0,
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Int64 = 4,
    UInt8 = 5,
    UInt16 = 6,
    UInt32 = 7,
    UInt64 = 8,
    Float = 9,
    Double = 10,
    String = 11,
    WString = 12,
    Object = 13,
}

impl PropertyValueKind {
    /// The `valuetype` tag written to documents.
    pub fn wire_tag(&self) -> i8 {
        *self as i8
    }

    /// Reverse of [`wire_tag`](Self::wire_tag). Unknown tags yield `None`.
    pub fn from_wire_tag(tag: i8) -> Option<PropertyValueKind> {
        use PropertyValueKind::*;
        Some(match tag {
            0 => Undefined,
            1 => Int8,
            2 => Int16,
            3 => Int32,
            4 => Int64,
            5 => UInt8,
            6 => UInt16,
            7 => UInt32,
            8 => UInt64,
            9 => Float,
            10 => Double,
            11 => String,
            12 => WString,
            13 => Object,
            _ => return None,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValueKind::Undefined => "undefined",
            PropertyValueKind::Int8 => "int8",
            PropertyValueKind::Int16 => "int16",
            PropertyValueKind::Int32 => "int32",
            PropertyValueKind::Int64 => "int64",
            PropertyValueKind::UInt8 => "uint8",
            PropertyValueKind::UInt16 => "uint16",
            PropertyValueKind::UInt32 => "uint32",
            PropertyValueKind::UInt64 => "uint64",
            PropertyValueKind::Float => "float",
            PropertyValueKind::Double => "double",
            PropertyValueKind::String => "string",
            PropertyValueKind::WString => "wstring",
            PropertyValueKind::Object => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PropertyValueKind::Int8
                | PropertyValueKind::Int16
                | PropertyValueKind::Int32
                | PropertyValueKind::Int64
                | PropertyValueKind::UInt8
                | PropertyValueKind::UInt16
                | PropertyValueKind::UInt32
                | PropertyValueKind::UInt64
                | PropertyValueKind::Float
                | PropertyValueKind::Double
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, PropertyValueKind::String | PropertyValueKind::WString)
    }
}

impl fmt::Display for PropertyValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

// ============================================================================
// Structure type
// ============================================================================

/// Whether a property holds a single value or a chain of them.
///
/// Derived from capacity: a capacity above 1 makes a Chain. The discriminants
/// are the `structuretype` wire tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum StructureType {
    Undefined = 0,
    Atom = 1,
    Chain = 2,
}

impl StructureType {
    pub fn wire_tag(&self) -> i8 {
        *self as i8
    }

    pub fn from_wire_tag(tag: i8) -> Option<StructureType> {
        Some(match tag {
            0 => StructureType::Undefined,
            1 => StructureType::Atom,
            2 => StructureType::Chain,
            _ => return None,
        })
    }

    /// The structure implied by a value capacity.
    pub fn for_capacity(capacity: u32) -> StructureType {
        if capacity > 1 {
            StructureType::Chain
        } else {
            StructureType::Atom
        }
    }
}

// ============================================================================
// Wide text
// ============================================================================

/// Wide text: a sequence of UTF-16 code units, kept distinct from narrow
/// [`String`] so both occupy their own leaf kind.
///
/// On the wire a `WideString` is narrowed to UTF-8 — the document format is
/// portable and carries no 16-bit text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct WideString(Vec<u16>);

impl WideString {
    pub fn new() -> WideString {
        WideString(Vec::new())
    }

    pub fn code_units(&self) -> &[u16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Narrow to UTF-8, replacing unpaired surrogates.
    pub fn to_narrow(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for WideString {
    fn from(s: &str) -> Self {
        WideString(s.encode_utf16().collect())
    }
}

impl From<String> for WideString {
    fn from(s: String) -> Self {
        WideString::from(s.as_str())
    }
}

impl From<Vec<u16>> for WideString {
    fn from(units: Vec<u16>) -> Self {
        WideString(units)
    }
}

impl fmt::Display for WideString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_narrow())
    }
}

impl Serialize for WideString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_narrow())
    }
}

impl<'de> Deserialize<'de> for WideString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let narrow = String::deserialize(deserializer)?;
        Ok(WideString::from(narrow.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags_round_trip() {
        for tag in 0i8..=13 {
            let kind = PropertyValueKind::from_wire_tag(tag).unwrap();
            assert_eq!(kind.wire_tag(), tag);
        }
        assert_eq!(PropertyValueKind::from_wire_tag(14), None);
        assert_eq!(PropertyValueKind::from_wire_tag(-1), None);
    }

    #[test]
    fn test_kind_classification() {
        assert!(PropertyValueKind::Int8.is_numeric());
        assert!(PropertyValueKind::Double.is_numeric());
        assert!(!PropertyValueKind::String.is_numeric());
        assert!(PropertyValueKind::WString.is_text());
        assert!(!PropertyValueKind::Object.is_text());
    }

    #[test]
    fn test_structure_for_capacity() {
        assert_eq!(StructureType::for_capacity(1), StructureType::Atom);
        assert_eq!(StructureType::for_capacity(2), StructureType::Chain);
        assert_eq!(StructureType::for_capacity(10), StructureType::Chain);
    }

    #[test]
    fn test_wide_string_narrowing() {
        let wide = WideString::from("This is ridiculous");
        assert_eq!(wide.to_narrow(), "This is ridiculous");

        let json = serde_json::to_string(&wide).unwrap();
        assert_eq!(json, "\"This is ridiculous\"");

        let back: WideString = serde_json::from_str(&json).unwrap();
        assert_eq!(back, wide);
    }

    #[test]
    fn test_unassigned_ids() {
        assert!(ObjectId::UNASSIGNED.is_unassigned());
        assert!(PropertyId::UNASSIGNED.is_unassigned());
        assert!(!PropertyId(1).is_unassigned());
    }
}
