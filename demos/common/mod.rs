//! Shared fixture for the demo binaries: a small, hand-built
//! [`TraceClass`] standing in for what a TSDL metadata resolver would
//! normally produce (out of scope for this crate, per its own design).

use ctf_stream_reader::metadata::{
    ByteOrder, ClockClass, ClockOrigin, EventClass, FieldPath, FieldType, IntFieldType, Scope,
    StreamClass, StructFieldType, TraceClass,
};
use internment::Intern;
use std::sync::Arc;

fn u32_le(name: &str) -> (Intern<String>, Arc<FieldType>) {
    (
        Intern::new(name.to_string()),
        Arc::new(FieldType::Int(IntFieldType::new(false, 32, ByteOrder::LittleEndian, 32))),
    )
}

/// One stream class: `stream.packet.context { packet_size, content_size }`,
/// `stream.event.header { id, timestamp }`, a single event class with a
/// `{ value }` payload.
pub fn sample_trace_class() -> Arc<TraceClass> {
    let packet_context = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![u32_le("packet_size"), u32_le("content_size")],
        min_alignment: 32,
    }));

    let event_header = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![u32_le("id"), u32_le("timestamp")],
        min_alignment: 32,
    }));

    let payload = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![u32_le("value")],
        min_alignment: 32,
    }));

    let clock = Arc::new(ClockClass::new("monotonic", 1_000_000_000, ClockOrigin::Other { uuid: None }));

    let mut stream_class = StreamClass {
        id: 0,
        name: Intern::new("default".to_string()),
        packet_context_type: Some(packet_context),
        event_header_type: Some(event_header),
        event_context_type: None,
        clock: Some(clock),
        event_classes: Default::default(),
    };
    stream_class.event_classes.insert(
        0,
        EventClass {
            id: 0,
            name: Intern::new("sample_event".to_string()),
            context_type: None,
            payload_type: Some(payload),
        },
    );

    let mut trace_class = TraceClass::new(None);
    trace_class.add_stream_class(stream_class);
    Arc::new(trace_class)
}

/// Unused by the trace class above, but documents how a variant tag or
/// sequence length field's path would be named once a real metadata
/// resolver supplies one.
#[allow(dead_code)]
pub fn example_length_path() -> FieldPath {
    FieldPath::new(Scope::EventPayload, vec![0])
}
