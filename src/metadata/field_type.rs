use internment::Intern;
use std::sync::Arc;

/// Byte order of a basic field's wire representation. Discriminants match
/// the byte-order tag an external TSDL resolver would carry alongside a
/// field's other wire-level attributes.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, derive_more::Display,
    num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[repr(u8)]
pub enum ByteOrder {
    #[display("little-endian")]
    LittleEndian = 0,
    #[display("big-endian")]
    BigEndian = 1,
}

/// Preferred base (radix) to use when displaying an integer field's
/// instances. Discriminants match the display-base tag an external TSDL
/// resolver would carry.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default,
    num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[repr(u8)]
pub enum DisplayBase {
    Binary = 0,
    Octal = 1,
    #[default]
    Decimal = 2,
    Hexadecimal = 3,
}

/// One `(range, label)` entry of an enumeration's mapping sequence.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub enum EnumRange {
    Value(i64),
    Inclusive(i64, i64),
}

impl EnumRange {
    pub fn contains(&self, v: i64) -> bool {
        match self {
            Self::Value(x) => *x == v,
            Self::Inclusive(lo, hi) => v >= *lo && v <= *hi,
        }
    }
}

/// An enumeration's mapping from value ranges to labels, decorating an
/// integer field type. Decoded values are still delivered as raw integers;
/// the mapping is consulted by downstream consumers, not the BTR itself.
/// `serde`-derivable since this is plausibly what an external TSDL
/// resolver hands in (or loads back out of a cache), even though this
/// crate never itself parses or emits TSDL text.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct EnumMappings {
    mappings: Vec<(Intern<String>, Vec<EnumRange>)>,
}

impl EnumMappings {
    pub fn new(mappings: Vec<(Intern<String>, Vec<EnumRange>)>) -> Self {
        Self { mappings }
    }

    pub fn label(&self, value: i64) -> Option<Intern<String>> {
        self.mappings
            .iter()
            .find_map(|(label, ranges)| ranges.iter().any(|r| r.contains(value)).then_some(*label))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Intern<String>, Vec<EnumRange>)> {
        self.mappings.iter()
    }
}

/// An integer field type. Width 1-64 bits; an optional [`EnumMappings`]
/// turns it into what CTF calls an enumeration, without changing how it's
/// decoded on the wire (it's still read as a plain integer).
#[derive(Clone, Debug)]
pub struct IntFieldType {
    pub signed: bool,
    pub size: u8,
    pub byte_order: ByteOrder,
    pub alignment: u32,
    pub preferred_display_base: DisplayBase,
    pub enumeration: Option<EnumMappings>,
}

impl IntFieldType {
    pub fn new(signed: bool, size: u8, byte_order: ByteOrder, alignment: u32) -> Self {
        Self {
            signed,
            size,
            byte_order,
            alignment,
            preferred_display_base: DisplayBase::default(),
            enumeration: None,
        }
    }

    pub fn with_enum(mut self, mappings: EnumMappings) -> Self {
        self.enumeration = Some(mappings);
        self
    }

    pub fn with_display_base(mut self, base: DisplayBase) -> Self {
        self.preferred_display_base = base;
        self
    }
}

/// An IEEE-754 floating point field type. Only 32 and 64 bit widths decode;
/// anything else is an [`crate::Error::UnsupportedFeature`] at decode time.
#[derive(Clone, Debug)]
pub struct FloatFieldType {
    pub size: u8,
    pub byte_order: ByteOrder,
    pub alignment: u32,
}

/// A null-terminated byte string, always byte-aligned.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct StringFieldType;

/// An ordered list of named members, each independently aligned.
#[derive(Clone, Debug)]
pub struct StructFieldType {
    pub members: Vec<(Intern<String>, Arc<FieldType>)>,
    pub min_alignment: u32,
}

impl StructFieldType {
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|(n, _)| n.as_str() == name)
    }
}

/// A fixed-length, homogeneous repetition of `element`.
#[derive(Clone, Debug)]
pub struct ArrayFieldType {
    pub element: Arc<FieldType>,
    pub length: u64,
}

/// A variable-length, homogeneous repetition of `element` whose length is
/// resolved at decode time from a previously decoded integer field.
#[derive(Clone, Debug)]
pub struct SequenceFieldType {
    pub element: Arc<FieldType>,
    pub length_path: FieldPath,
}

/// A tagged union: the concrete option is resolved at decode time from a
/// previously decoded enumeration field named by `tag_path`.
#[derive(Clone, Debug)]
pub struct VariantFieldType {
    pub tag_path: FieldPath,
    pub options: Vec<(Intern<String>, Arc<FieldType>)>,
}

impl VariantFieldType {
    pub fn option(&self, label: &str) -> Option<&Arc<FieldType>> {
        self.options
            .iter()
            .find_map(|(n, ft)| (n.as_str() == label).then_some(ft))
    }
}

/// A node of the resolved, immutable field-type graph the decoding core
/// operates on. The graph is produced by an external metadata resolver
/// (a TSDL parser or an equivalent); this crate never constructs or
/// validates TSDL itself.
#[derive(Clone, Debug)]
pub enum FieldType {
    Int(IntFieldType),
    Float(FloatFieldType),
    String(StringFieldType),
    Struct(StructFieldType),
    Array(ArrayFieldType),
    Sequence(SequenceFieldType),
    Variant(VariantFieldType),
}

impl FieldType {
    /// Statically known alignment in bits. Variant types are always 1
    /// (their selected option carries its own alignment).
    pub fn alignment(&self) -> u32 {
        match self {
            FieldType::Int(t) => t.alignment,
            FieldType::Float(t) => t.alignment,
            FieldType::String(_) => 8,
            FieldType::Struct(t) => t.min_alignment,
            FieldType::Array(t) => t.element.alignment(),
            FieldType::Sequence(t) => t.element.alignment(),
            FieldType::Variant(_) => 1,
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            FieldType::Struct(_) | FieldType::Array(_) | FieldType::Sequence(_) | FieldType::Variant(_)
        )
    }

    pub fn as_int(&self) -> Option<&IntFieldType> {
        match self {
            FieldType::Int(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructFieldType> {
        match self {
            FieldType::Struct(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&VariantFieldType> {
        match self {
            FieldType::Variant(t) => Some(t),
            _ => None,
        }
    }
}

/// One of CTF's six dynamic scopes, fixed in decode order. The first two
/// are packet-wide; the remaining four are reset at each event boundary.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, derive_more::Display)]
pub enum Scope {
    #[display("trace.packet.header")]
    TracePacketHeader,
    #[display("stream.packet.context")]
    StreamPacketContext,
    #[display("stream.event.header")]
    StreamEventHeader,
    #[display("stream.event.context")]
    StreamEventContext,
    #[display("event.context")]
    EventContext,
    #[display("event.payload")]
    EventPayload,
}

/// A rooted index path locating a field within one of the six dynamic
/// scopes: the scope, then a list of struct-member / variant-selection
/// indices walked from that scope's root.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FieldPath {
    pub scope: Scope,
    pub indices: Vec<usize>,
}

impl FieldPath {
    pub fn new(scope: Scope, indices: Vec<usize>) -> Self {
        Self { scope, indices }
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.scope)?;
        for i in &self.indices {
            write!(f, "[{i}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_roundtrips_through_wire_discriminant() {
        assert_eq!(ByteOrder::try_from(0u8).unwrap(), ByteOrder::LittleEndian);
        assert_eq!(ByteOrder::try_from(1u8).unwrap(), ByteOrder::BigEndian);
        assert!(ByteOrder::try_from(2u8).is_err());
        assert_eq!(u8::from(ByteOrder::BigEndian), 1);
    }

    #[test]
    fn display_base_roundtrips_through_wire_discriminant() {
        assert_eq!(DisplayBase::try_from(3u8).unwrap(), DisplayBase::Hexadecimal);
        assert!(DisplayBase::try_from(4u8).is_err());
        assert_eq!(u8::from(DisplayBase::default()), 2);
    }
}
