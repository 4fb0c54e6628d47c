use crate::metadata::{clock::ClockClass, field_type::FieldType};
use fxhash::FxHashMap;
use internment::Intern;
use itertools::Itertools;
use std::sync::Arc;

/// One declared event record type within a stream class.
#[derive(Clone, Debug)]
pub struct EventClass {
    pub id: u64,
    pub name: Intern<String>,
    /// `event.context` dynamic scope type, if declared.
    pub context_type: Option<Arc<FieldType>>,
    /// `event.payload` dynamic scope type, if declared.
    pub payload_type: Option<Arc<FieldType>>,
}

/// One declared data stream type, owning the event classes it multiplexes.
#[derive(Clone, Debug)]
pub struct StreamClass {
    pub id: u64,
    pub name: Intern<String>,
    /// `stream.packet.context` dynamic scope type.
    pub packet_context_type: Option<Arc<FieldType>>,
    /// `stream.event.header` dynamic scope type.
    pub event_header_type: Option<Arc<FieldType>>,
    /// `stream.event.context` dynamic scope type.
    pub event_context_type: Option<Arc<FieldType>>,
    /// Default clock of this stream's instances, if any. Held by `Arc` so
    /// the muxer's clock-compatibility check (spec §4.4, "the exact same
    /// clock-class instance") can compare by identity with `Arc::ptr_eq`.
    pub clock: Option<Arc<ClockClass>>,
    pub event_classes: FxHashMap<u64, EventClass>,
}

impl StreamClass {
    pub fn event_class(&self, id: u64) -> Option<&EventClass> {
        self.event_classes.get(&id)
    }
}

/// A fully resolved trace type: everything needed to decode all of a
/// trace's data streams. This is the input the BTR/NotifIter/Muxer core
/// consumes; producing it from TSDL metadata is explicitly out of scope
/// (spec §1).
#[derive(Clone, Debug, Default)]
pub struct TraceClass {
    /// `trace.packet.header` dynamic scope type.
    pub packet_header_type: Option<Arc<FieldType>>,
    pub stream_classes: FxHashMap<u64, StreamClass>,
}

impl TraceClass {
    pub fn new(packet_header_type: Option<Arc<FieldType>>) -> Self {
        Self {
            packet_header_type,
            stream_classes: FxHashMap::default(),
        }
    }

    pub fn add_stream_class(&mut self, sc: StreamClass) {
        self.stream_classes.insert(sc.id, sc);
    }

    pub fn stream_class(&self, id: u64) -> Option<&StreamClass> {
        self.stream_classes.get(&id)
    }

    /// Returns the sole declared stream class, when there is exactly one.
    /// Used to resolve a packet's stream class id when the packet header
    /// has no `stream_id` field (spec §4.3, "stream class resolution").
    pub fn sole_stream_class(&self) -> Option<&StreamClass> {
        self.stream_classes.values().exactly_one().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_class(id: u64) -> StreamClass {
        StreamClass {
            id,
            name: Intern::new(format!("sc{id}")),
            packet_context_type: None,
            event_header_type: None,
            event_context_type: None,
            clock: None,
            event_classes: FxHashMap::default(),
        }
    }

    #[test]
    fn sole_stream_class_is_none_when_zero_or_many() {
        let mut tc = TraceClass::new(None);
        assert!(tc.sole_stream_class().is_none());

        tc.add_stream_class(stream_class(0));
        assert_eq!(tc.sole_stream_class().unwrap().id, 0);

        tc.add_stream_class(stream_class(1));
        assert!(tc.sole_stream_class().is_none());
    }
}
