//! The resolved, immutable metadata model the decoding core consumes:
//! a field-type graph plus per-stream clock descriptors. Producing this
//! model from TSDL text (the metadata packet de-framer and TSDL parser)
//! is an external collaborator and out of scope for this crate.

pub mod clock;
pub mod field_type;
pub mod trace;

pub use clock::{ClockClass, ClockOrigin};
pub use field_type::{
    ArrayFieldType, ByteOrder, DisplayBase, EnumMappings, EnumRange, FieldPath, FieldType,
    FloatFieldType, IntFieldType, Scope, SequenceFieldType, StringFieldType, StructFieldType,
    VariantFieldType,
};
pub use trace::{EventClass, StreamClass, TraceClass};
