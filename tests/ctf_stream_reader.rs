//! End-to-end scenarios against the public API (see SPEC_FULL.md §8).

use ctf_stream_reader::metadata::{
    ByteOrder, ClockClass, ClockOrigin, EnumMappings, EnumRange, EventClass, FieldPath, FieldType,
    IntFieldType, Scope, SequenceFieldType, StreamClass, StructFieldType, TraceClass,
    VariantFieldType,
};
use ctf_stream_reader::medium::{ChunkedMedium, SliceMedium};
use ctf_stream_reader::muxer::{Muxer, Upstream, UpstreamStep};
use ctf_stream_reader::notif_iter::{NotifIter, NotifIterStep};
use ctf_stream_reader::notification::{ClockSnapshot, EventNotification};
use ctf_stream_reader::{Error, Notification};
use internment::Intern;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use test_log::test;

fn u32_le(name: &str) -> (Intern<String>, Arc<FieldType>) {
    (
        Intern::new(name.to_string()),
        Arc::new(FieldType::Int(IntFieldType::new(false, 32, ByteOrder::LittleEndian, 32))),
    )
}

fn u8_field(name: &str) -> (Intern<String>, Arc<FieldType>) {
    (
        Intern::new(name.to_string()),
        Arc::new(FieldType::Int(IntFieldType::new(false, 8, ByteOrder::LittleEndian, 8))),
    )
}

/// One stream class with no event header, no event/stream-event context,
/// a `{magic, stream_id}` packet header, a `{packet_size, content_size}`
/// packet context, and a single event class with a `{x: u32le}` payload.
fn single_event_trace_class() -> Arc<TraceClass> {
    let header = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![u32_le("magic"), u8_field("stream_id")],
        min_alignment: 32,
    }));
    let packet_context = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![u32_le("packet_size"), u32_le("content_size")],
        min_alignment: 32,
    }));
    let payload = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![u32_le("x")],
        min_alignment: 32,
    }));

    let mut stream_class = StreamClass {
        id: 0,
        name: Intern::new("default".to_string()),
        packet_context_type: Some(packet_context),
        event_header_type: None,
        event_context_type: None,
        clock: None,
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

    let mut trace_class = TraceClass::new(Some(header));
    trace_class.add_stream_class(stream_class);
    Arc::new(trace_class)
}

/// One packet: header (magic=0x75D11D57 LE, stream_id=0), packet context
/// (packet_size=160 bits, content_size=136 bits), one event payload
/// (x=42), then 3 bytes of zero padding to reach packet_size.
fn single_event_packet_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x75D11D57u32.to_le_bytes());
    bytes.push(0u8);
    bytes.extend_from_slice(&160u32.to_le_bytes());
    bytes.extend_from_slice(&136u32.to_le_bytes());
    bytes.extend_from_slice(&42u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 3]);
    bytes
}

fn drain(mut notif_iter: NotifIter<impl ctf_stream_reader::medium::Medium>) -> Vec<Notification> {
    let mut out = Vec::new();
    loop {
        match notif_iter.next().unwrap() {
            NotifIterStep::Ready(n) => out.push(n),
            NotifIterStep::Again => continue,
            NotifIterStep::Ended => break,
        }
    }
    out
}

#[test]
fn single_packet_one_event_whole_buffer() {
    let bytes = single_event_packet_bytes();
    let trace_class = single_event_trace_class();
    let medium = SliceMedium::new(&bytes);
    let notifs = drain(NotifIter::new(medium, trace_class));

    assert_eq!(notifs.len(), 5);
    assert!(matches!(notifs[0], Notification::StreamBeginning { stream_id: 0, .. }));
    match &notifs[1] {
        Notification::NewPacket(p) => assert_eq!(p.stream_id, 0),
        other => panic!("expected NewPacket, got {other:?}"),
    }
    match &notifs[2] {
        Notification::Event(e) => {
            assert_eq!(e.event_class_id, 0);
            let payload = e.event_payload.as_ref().unwrap();
            assert_eq!(payload.member("x").and_then(|v| v.as_u64()), Some(42));
        }
        other => panic!("expected Event, got {other:?}"),
    }
    assert!(matches!(notifs[3], Notification::EndOfPacket { stream_id: 0 }));
    assert!(matches!(notifs[4], Notification::StreamEnd { stream_id: 0 }));
}

/// Chunking independence (SPEC_FULL.md §8): decoding the exact same bytes
/// one byte at a time, forcing BTR suspension on nearly every field,
/// yields the same notification sequence as the whole-buffer case.
#[test(tokio::test)]
async fn single_packet_one_event_byte_at_a_time() {
    let bytes = single_event_packet_bytes();
    let trace_class = single_event_trace_class();
    let medium = ChunkedMedium::new(&bytes, 1);
    let notifs = drain(NotifIter::new(medium, trace_class));

    assert_eq!(notifs.len(), 5);
    match &notifs[2] {
        Notification::Event(e) => {
            let payload = e.event_payload.as_ref().unwrap();
            assert_eq!(payload.member("x").and_then(|v| v.as_u64()), Some(42));
        }
        other => panic!("expected Event, got {other:?}"),
    }
}

struct VecUpstream {
    notifications: std::vec::IntoIter<Notification>,
}

impl VecUpstream {
    fn new(notifications: Vec<Notification>) -> Self {
        Self {
            notifications: notifications.into_iter(),
        }
    }
}

impl Upstream for VecUpstream {
    fn next(&mut self) -> Result<UpstreamStep, Error> {
        match self.notifications.next() {
            Some(n) => Ok(UpstreamStep::Ready(n)),
            None => Ok(UpstreamStep::Ended),
        }
    }
}

fn clock(name: &str) -> Arc<ClockClass> {
    Arc::new(ClockClass::new(name, 1_000_000_000, ClockOrigin::Other { uuid: None }))
}

fn event_at(clock_class: &Arc<ClockClass>, cycles: u64) -> Notification {
    Notification::Event(EventNotification {
        event_class_id: 0,
        stream_event_header: None,
        stream_event_context: None,
        event_context: None,
        event_payload: None,
        clock_snapshot: Some(ClockSnapshot {
            clock_class: clock_class.clone(),
            cycles,
        }),
    })
}

/// Two upstreams with interleaved timestamps merge into one globally
/// non-decreasing sequence (SPEC_FULL.md §8, scenario 5).
#[test]
fn muxer_orders_by_timestamp() {
    let c1 = clock("u1");
    let c2 = clock("u2");
    let u1 = VecUpstream::new(vec![event_at(&c1, 10), event_at(&c1, 20), event_at(&c1, 30)]);
    let u2 = VecUpstream::new(vec![event_at(&c2, 15), event_at(&c2, 25)]);

    let mut muxer = Muxer::new(vec![Box::new(u1), Box::new(u2)]);
    let mut timestamps = Vec::new();
    loop {
        match muxer.next().unwrap() {
            UpstreamStep::Ready(n) => timestamps.push(n.timestamp_ns().unwrap()),
            UpstreamStep::Again => continue,
            UpstreamStep::Ended => break,
        }
    }
    assert_eq!(timestamps, vec![10, 15, 20, 25, 30]);
}

/// A Unix-epoch `StreamBeginning` from one upstream followed by a
/// non-Unix-epoch `StreamBeginning` from another is a clock
/// incompatibility error (SPEC_FULL.md §8, scenario 6).
#[test]
fn muxer_rejects_incompatible_clocks() {
    let unix_clock = Arc::new(ClockClass::new("unix", 1_000_000_000, ClockOrigin::UnixEpoch));
    let other_clock = clock("monotonic");

    let u1 = VecUpstream::new(vec![Notification::StreamBeginning {
        stream_id: 0,
        clock_class: Some(unix_clock),
    }]);
    let u2 = VecUpstream::new(vec![Notification::StreamBeginning {
        stream_id: 1,
        clock_class: Some(other_clock),
    }]);

    let mut muxer = Muxer::new(vec![Box::new(u1), Box::new(u2)]);
    let mut saw_error = false;
    for _ in 0..4 {
        match muxer.next() {
            Ok(UpstreamStep::Ready(_)) => continue,
            Ok(UpstreamStep::Again) => continue,
            Ok(UpstreamStep::Ended) => break,
            Err(_) => {
                saw_error = true;
                break;
            }
        }
    }
    assert!(saw_error, "expected a clock-compatibility error");
}

/// A stream class whose `stream.event.header` is `{ id: enum u8, v:
/// variant }`, the CTF-1.8 "compact/extended" idiom: `id` selects `v`'s
/// option, and the `extended` option carries its own, wider `id` field
/// that is the real event class id (SPEC_FULL.md §4.3, §9). `compact`'s
/// option is an empty struct, so the direct `id` field is the real event
/// class id instead.
fn v_id_trace_class() -> Arc<TraceClass> {
    let tag_enum = Arc::new(FieldType::Int(
        IntFieldType::new(false, 8, ByteOrder::LittleEndian, 8).with_enum(EnumMappings::new(vec![
            (Intern::new("compact".to_string()), vec![EnumRange::Value(0)]),
            (Intern::new("extended".to_string()), vec![EnumRange::Value(1)]),
        ])),
    ));
    let extended_option = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![u8_field("id")],
        min_alignment: 8,
    }));
    let compact_option = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![],
        min_alignment: 8,
    }));
    let variant = Arc::new(FieldType::Variant(VariantFieldType {
        tag_path: FieldPath::new(Scope::StreamEventHeader, vec![0]),
        options: vec![
            (Intern::new("compact".to_string()), compact_option),
            (Intern::new("extended".to_string()), extended_option),
        ],
    }));
    let event_header = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![(Intern::new("id".to_string()), tag_enum), (Intern::new("v".to_string()), variant)],
        min_alignment: 8,
    }));
    let packet_context = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![u32_le("packet_size"), u32_le("content_size")],
        min_alignment: 32,
    }));

    let mut stream_class = StreamClass {
        id: 0,
        name: Intern::new("default".to_string()),
        packet_context_type: Some(packet_context),
        event_header_type: Some(event_header),
        event_context_type: None,
        clock: None,
        event_classes: Default::default(),
    };
    for id in [0u64, 171u64] {
        stream_class.event_classes.insert(
            id,
            EventClass {
                id,
                name: Intern::new(format!("event_{id}")),
                context_type: None,
                payload_type: None,
            },
        );
    }

    let mut trace_class = TraceClass::new(None);
    trace_class.add_stream_class(stream_class);
    Arc::new(trace_class)
}

/// One packet, two events: a `compact` event (`id=0`, `v` selects the
/// empty option) followed by an `extended` event (`id=1`, `v` selects
/// the option whose own nested `id` field is 171). `stream.packet.context`
/// sizes the packet exactly to its content, so no padding is needed.
fn v_id_packet_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    let packet_context_bits = 64u32;
    let compact_event_bits = 8u32;
    let extended_event_bits = 16u32;
    let content_bits = packet_context_bits + compact_event_bits + extended_event_bits;

    bytes.extend_from_slice(&content_bits.to_le_bytes()); // packet_size
    bytes.extend_from_slice(&content_bits.to_le_bytes()); // content_size
    bytes.push(0u8); // compact event: id = 0 (v selects the empty option)
    bytes.push(1u8); // extended event: id = 1 (v selects the option with a nested id)
    bytes.push(171u8); // extended event: nested v.id = 171
    bytes
}

/// Regression test for the CTF-1.8 `v.id` idiom (SPEC_FULL.md §4.3, §9):
/// the compact event's class id comes from the direct `id` field, while
/// the extended event's class id comes from the *nested* `id` inside the
/// selected variant option, not the compact tag that selected it.
#[test]
fn variant_selection_resolves_v_id_idiom() {
    let bytes = v_id_packet_bytes();
    let trace_class = v_id_trace_class();
    let medium = SliceMedium::new(&bytes);
    let notifs = drain(NotifIter::new(medium, trace_class));

    let event_class_ids: Vec<u64> = notifs
        .iter()
        .filter_map(|n| match n {
            Notification::Event(e) => Some(e.event_class_id),
            _ => None,
        })
        .collect();
    assert_eq!(event_class_ids, vec![0, 171]);
}

/// A `stream.event.payload` of `{ len: u8, items: sequence<u8> }`, where
/// `items`'s length is resolved from its sibling `len` — the same
/// same-scope path shape documented (but previously unresolvable) by
/// `demos/common::example_length_path` (SPEC_FULL.md §1, "the HARDEST
/// part of this repository").
fn sequence_trace_class() -> Arc<TraceClass> {
    let payload = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![
            (
                Intern::new("len".to_string()),
                Arc::new(FieldType::Int(IntFieldType::new(false, 8, ByteOrder::LittleEndian, 8))),
            ),
            (
                Intern::new("items".to_string()),
                Arc::new(FieldType::Sequence(SequenceFieldType {
                    element: Arc::new(FieldType::Int(IntFieldType::new(false, 8, ByteOrder::LittleEndian, 8))),
                    length_path: FieldPath::new(Scope::EventPayload, vec![0]),
                })),
            ),
        ],
        min_alignment: 8,
    }));
    let packet_context = Arc::new(FieldType::Struct(StructFieldType {
        members: vec![u32_le("packet_size"), u32_le("content_size")],
        min_alignment: 32,
    }));

    let mut stream_class = StreamClass {
        id: 0,
        name: Intern::new("default".to_string()),
        packet_context_type: Some(packet_context),
        event_header_type: None,
        event_context_type: None,
        clock: None,
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

#[test]
fn sequence_length_resolves_against_sibling_field() {
    let packet_context_bits = 64u32;
    let event_bits = 8 + 3 * 8; // len byte + 3 item bytes
    let content_bits = packet_context_bits + event_bits;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&content_bits.to_le_bytes());
    bytes.extend_from_slice(&content_bits.to_le_bytes());
    bytes.push(3u8); // len
    bytes.extend_from_slice(&[10u8, 20u8, 30u8]); // items

    let trace_class = sequence_trace_class();
    let medium = SliceMedium::new(&bytes);
    let notifs = drain(NotifIter::new(medium, trace_class));

    let payload = notifs
        .iter()
        .find_map(|n| match n {
            Notification::Event(e) => e.event_payload.as_ref(),
            _ => None,
        })
        .expect("expected one event with a payload");
    let items = payload.member("items").expect("items field present");
    let values: Vec<u64> = (0..3)
        .map(|i| items.index(i).and_then(|v| v.as_u64()).expect("sequence element"))
        .collect();
    assert_eq!(values, vec![10, 20, 30]);
}
