//! The notification types emitted by [`crate::notif_iter::NotifIter`] and
//! re-ordered by [`crate::muxer::Muxer`] (spec §3, "Notifications").

use crate::metadata::ClockClass;
use crate::value::FieldValue;
use std::sync::Arc;

/// A clock reading: the raw cycle count plus the clock class it was
/// taken against, so a consumer (or the muxer) can convert to
/// nanoseconds without re-resolving metadata.
#[derive(Clone, Debug)]
pub struct ClockSnapshot {
    pub clock_class: Arc<ClockClass>,
    pub cycles: u64,
}

impl ClockSnapshot {
    pub fn nanoseconds(&self) -> u128 {
        self.clock_class.cycles_to_ns(self.cycles)
    }
}

/// One event record, fully decoded across its four dynamic scopes.
#[derive(Clone, Debug)]
pub struct EventNotification {
    pub event_class_id: u64,
    pub stream_event_header: Option<FieldValue>,
    pub stream_event_context: Option<FieldValue>,
    pub event_context: Option<FieldValue>,
    pub event_payload: Option<FieldValue>,
    pub clock_snapshot: Option<ClockSnapshot>,
}

/// Announces the start of a new packet, decoded through
/// `stream.packet.context` inclusive.
#[derive(Clone, Debug)]
pub struct NewPacketNotification {
    pub stream_id: u64,
    pub packet_header_fields: Option<FieldValue>,
    pub packet_context_fields: Option<FieldValue>,
}

/// One notification in the globally ordered stream the muxer produces,
/// and the unit NotifIter emits one at a time.
#[derive(Clone, Debug)]
pub enum Notification {
    NewPacket(NewPacketNotification),
    Event(EventNotification),
    EndOfPacket { stream_id: u64 },
    StreamBeginning { stream_id: u64, clock_class: Option<Arc<ClockClass>> },
    StreamEnd { stream_id: u64 },
    /// Synthetic, muxer-only: emitted to let a consumer advance its own
    /// notion of time when an upstream is alive but has nothing to say
    /// (spec §3).
    MsgIterInactivity {
        clock_class: Arc<ClockClass>,
        clock_snapshot: ClockSnapshot,
    },
}

/// Rank used to break timestamp ties deterministically (spec §4.4):
/// lower rank sorts first among notifications with an equal timestamp.
/// Order mirrors the sequence within one upstream: a stream's
/// bookkeeping messages precede its events, which precede its closing
/// messages.
impl Notification {
    pub fn message_type_rank(&self) -> u8 {
        match self {
            Notification::StreamBeginning { .. } => 0,
            Notification::NewPacket(_) => 1,
            Notification::Event(_) => 2,
            Notification::EndOfPacket { .. } => 3,
            Notification::StreamEnd { .. } => 4,
            Notification::MsgIterInactivity { .. } => 5,
        }
    }

    pub fn stream_id(&self) -> Option<u64> {
        match self {
            Notification::NewPacket(n) => Some(n.stream_id),
            Notification::EndOfPacket { stream_id } => Some(*stream_id),
            Notification::StreamBeginning { stream_id, .. } => Some(*stream_id),
            Notification::StreamEnd { stream_id } => Some(*stream_id),
            Notification::Event(_) | Notification::MsgIterInactivity { .. } => None,
        }
    }

    pub fn event_class_id(&self) -> Option<u64> {
        match self {
            Notification::Event(e) => Some(e.event_class_id),
            _ => None,
        }
    }

    /// Timestamp in nanoseconds from the declaring clock's origin, if
    /// this notification carries one at all.
    pub fn timestamp_ns(&self) -> Option<u128> {
        match self {
            Notification::Event(e) => e.clock_snapshot.as_ref().map(|c| c.nanoseconds()),
            Notification::MsgIterInactivity { clock_snapshot, .. } => {
                Some(clock_snapshot.nanoseconds())
            }
            _ => None,
        }
    }
}
