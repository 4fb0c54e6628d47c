//! Packet- and event-level state machine built on top of the BTR.
//!
//! Drives one [`BinaryTypeReader`] through the fixed sequence of CTF's
//! six dynamic scopes, resolving stream classes, packet sizes, and event
//! classes from previously decoded fields, and emitting
//! [`Notification`]s at packet and event boundaries.
//!
//! Grounded on `plugins/ctf/common/notif-iter/notif-iter.c`'s `enum
//! state` and per-state functions, reworked as a Rust enum-driven loop
//! instead of a `switch` over `notit->state` with explicit goto-style
//! re-entry.

use crate::btr::{BinaryTypeReader, BtrOutcome, BtrVisitor};
use crate::error::Error;
use crate::medium::{Medium, MediumStatus};
use crate::metadata::{FieldPath, FieldType, Scope, TraceClass};
use crate::notification::{ClockSnapshot, EventNotification, NewPacketNotification, Notification};
use crate::value::FieldValue;
use internment::Intern;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum State {
    Init,
    EmitStreamBeginning,
    DScopeTracePacketHeaderBegin,
    DScopeTracePacketHeaderContinue,
    AfterTracePacketHeader,
    DScopeStreamPacketContextBegin,
    DScopeStreamPacketContextContinue,
    AfterStreamPacketContext,
    EmitNotifNewPacket,
    DScopeStreamEventHeaderBegin,
    DScopeStreamEventHeaderContinue,
    AfterStreamEventHeader,
    DScopeStreamEventContextBegin,
    DScopeStreamEventContextContinue,
    DScopeEventContextBegin,
    DScopeEventContextContinue,
    DScopeEventPayloadBegin,
    DScopeEventPayloadContinue,
    EmitNotifEvent,
    EmitNotifEndOfPacket,
    SkipPacketPadding,
    EmitStreamEnd,
    Ended,
}

/// Per-packet decode state that outlives a single dynamic scope, reset
/// at packet (not event) boundaries (spec §3, "Packet state").
#[derive(Default)]
struct PacketState {
    packet_size_bits: Option<u64>,
    content_size_bits: Option<u64>,
    stream_id: Option<u64>,
}

/// One frame of the visitor's own compound stack, mirroring the BTR's
/// visit stack one level at a time (spec §4.3, "BTR callback bridging").
enum PartialCompound {
    Struct(Vec<FieldValue>),
    Array(Vec<FieldValue>),
    Sequence(Vec<FieldValue>),
    /// Holds the selected option's label once `query_variant_selected`
    /// has resolved it; `None` between `on_compound_begin` and that
    /// resolution.
    Variant(Option<Intern<String>>),
}

/// Snapshot of every dynamic scope decoded so far this packet/event,
/// used to resolve `FieldPath`s for variant tags and sequence lengths.
#[derive(Default, Clone)]
struct FinishedScopes {
    trace_packet_header: Option<FieldValue>,
    stream_packet_context: Option<FieldValue>,
    stream_event_header: Option<FieldValue>,
    stream_event_context: Option<FieldValue>,
    event_context: Option<FieldValue>,
}

impl FinishedScopes {
    fn root(&self, scope: Scope) -> Option<&FieldValue> {
        match scope {
            Scope::TracePacketHeader => self.trace_packet_header.as_ref(),
            Scope::StreamPacketContext => self.stream_packet_context.as_ref(),
            Scope::StreamEventHeader => self.stream_event_header.as_ref(),
            Scope::StreamEventContext => self.stream_event_context.as_ref(),
            Scope::EventContext => self.event_context.as_ref(),
            Scope::EventPayload => None,
        }
    }

    fn resolve(&self, path: &FieldPath) -> Option<&FieldValue> {
        let mut cur = self.root(path.scope)?;
        for &i in &path.indices {
            cur = cur.index(i)?;
        }
        Some(cur)
    }

    fn set(&mut self, scope: Scope, value: FieldValue) {
        match scope {
            Scope::TracePacketHeader => self.trace_packet_header = Some(value),
            Scope::StreamPacketContext => self.stream_packet_context = Some(value),
            Scope::StreamEventHeader => self.stream_event_header = Some(value),
            Scope::StreamEventContext => self.stream_event_context = Some(value),
            Scope::EventContext => self.event_context = Some(value),
            Scope::EventPayload => {}
        }
    }
}

/// Materializes a [`FieldValue`] tree from BTR callbacks for the scope
/// currently being decoded, and answers the BTR's dynamic queries by
/// resolving `FieldPath`s either against scopes already finished this
/// packet/event, or — the common case for a variant tag or sequence
/// length, which is almost always a sibling field declared earlier in
/// the very struct being decoded right now — against the in-progress
/// tree this builder itself is assembling.
struct ScopeBuilder<'a> {
    scope: Scope,
    stack: Vec<PartialCompound>,
    result: Option<FieldValue>,
    string_buf: Vec<u8>,
    finished_scopes: &'a FinishedScopes,
}

impl<'a> ScopeBuilder<'a> {
    fn new(scope: Scope, finished_scopes: &'a FinishedScopes) -> Self {
        Self {
            scope,
            stack: Vec::new(),
            result: None,
            string_buf: Vec::new(),
            finished_scopes,
        }
    }

    fn push_value(&mut self, v: FieldValue) {
        match self.stack.last_mut() {
            None => self.result = Some(v),
            Some(PartialCompound::Struct(values)) => values.push(v),
            Some(PartialCompound::Array(values)) => values.push(v),
            Some(PartialCompound::Sequence(values)) => values.push(v),
            Some(PartialCompound::Variant(_)) => self.result = Some(v),
        }
    }

    /// Resolves a `FieldPath` rooted in the scope currently being built,
    /// by indexing into the already-completed sibling values sitting in
    /// the visitor's own compound stack — a variant or sequence field is
    /// visited only once every field before it in its enclosing struct
    /// has already been pushed, so those siblings are there to find.
    /// Anything the path addresses past the stack's outermost frame is a
    /// forward or self reference and correctly fails to resolve.
    fn resolve_in_progress(&self, path: &FieldPath) -> Option<FieldValue> {
        let mut indices = path.indices.iter();
        let root_frame = self.stack.first()?;
        let mut current = match root_frame {
            PartialCompound::Struct(values) => values.get(*indices.next()?)?,
            _ => return None,
        };
        for &i in indices {
            current = current.index(i)?;
        }
        Some(current.clone())
    }

    /// Resolves `path` against whichever of the in-progress scope or the
    /// already-finished scopes it's rooted in.
    fn resolve(&self, path: &FieldPath) -> Option<FieldValue> {
        if path.scope == self.scope {
            self.resolve_in_progress(path)
        } else {
            self.finished_scopes.resolve(path).cloned()
        }
    }
}

impl<'a> ScopeBuilder<'a> {
    /// Wraps an enumeration's decoded raw integer with its resolved
    /// label, so a later `FieldPath` lookup that lands on this field
    /// (a variant tag) finds a selection rather than a bare integer.
    /// Plain (non-enum) integers decode straight through, matching
    /// spec §4.2's "callback receives the raw integer, not the label".
    fn enum_wrap(ty: &Arc<FieldType>, raw: FieldValue, signed_value: i64) -> FieldValue {
        let Some(int_ty) = ty.as_int() else { return raw };
        let Some(mapping) = &int_ty.enumeration else { return raw };
        match mapping.label(signed_value) {
            Some(label) => FieldValue::Variant(label, Box::new(raw)),
            None => raw,
        }
    }
}

impl<'a> BtrVisitor for ScopeBuilder<'a> {
    fn on_signed_int(&mut self, value: i64, ty: &Arc<FieldType>) -> Result<(), Error> {
        let v = Self::enum_wrap(ty, FieldValue::SignedInt(value), value);
        self.push_value(v);
        Ok(())
    }

    fn on_unsigned_int(&mut self, value: u64, ty: &Arc<FieldType>) -> Result<(), Error> {
        let v = Self::enum_wrap(ty, FieldValue::UnsignedInt(value), value as i64);
        self.push_value(v);
        Ok(())
    }

    fn on_float(&mut self, value: f64, _ty: &Arc<FieldType>) -> Result<(), Error> {
        self.push_value(FieldValue::Float(ordered_float::OrderedFloat(value)));
        Ok(())
    }

    fn on_string_begin(&mut self, _ty: &Arc<FieldType>) -> Result<(), Error> {
        self.string_buf.clear();
        Ok(())
    }

    fn on_string(&mut self, substring: &[u8], _ty: &Arc<FieldType>) -> Result<(), Error> {
        self.string_buf.extend_from_slice(substring);
        Ok(())
    }

    fn on_string_end(&mut self, _ty: &Arc<FieldType>) -> Result<(), Error> {
        let s = std::mem::take(&mut self.string_buf);
        self.push_value(FieldValue::String(s));
        Ok(())
    }

    fn on_compound_begin(&mut self, ty: &Arc<FieldType>) -> Result<(), Error> {
        let frame = match &**ty {
            FieldType::Struct(_) => PartialCompound::Struct(Vec::new()),
            FieldType::Array(_) => PartialCompound::Array(Vec::new()),
            FieldType::Sequence(_) => PartialCompound::Sequence(Vec::new()),
            FieldType::Variant(_) => PartialCompound::Variant(None),
            _ => unreachable!("on_compound_begin only called for compound types"),
        };
        self.stack.push(frame);
        Ok(())
    }

    fn on_compound_end(&mut self, ty: &Arc<FieldType>) -> Result<(), Error> {
        let frame = self.stack.pop().expect("on_compound_begin pushed a matching frame");
        let value = match (frame, &**ty) {
            (PartialCompound::Struct(values), FieldType::Struct(s)) => FieldValue::Struct(
                s.members
                    .iter()
                    .zip(values)
                    .map(|((name, _), v)| (*name, v))
                    .collect(),
            ),
            (PartialCompound::Array(values), FieldType::Array(_)) => FieldValue::Array(values),
            (PartialCompound::Sequence(values), FieldType::Sequence(_)) => {
                FieldValue::Sequence(values)
            }
            (PartialCompound::Variant(label), FieldType::Variant(_)) => {
                let label = label.ok_or_else(|| Error::corrupt("variant closed with no option selected"))?;
                let selected = self.result.take().expect("variant's single child decoded before compound_end");
                FieldValue::Variant(label, Box::new(selected))
            }
            _ => unreachable!("compound_begin/compound_end type mismatch"),
        };
        self.push_value(value);
        Ok(())
    }

    fn query_sequence_length(&mut self, ty: &Arc<FieldType>) -> Result<u64, Error> {
        let seq = match &**ty {
            FieldType::Sequence(s) => s,
            _ => return Err(Error::corrupt("not a sequence type")),
        };
        let resolved = self
            .resolve(&seq.length_path)
            .ok_or_else(|| Error::corrupt(format!("cannot resolve sequence length path {}", seq.length_path)))?;
        let raw = resolved
            .as_integer()
            .ok_or_else(|| Error::corrupt("sequence length field is not an integer"))?;
        if raw < 0 {
            return Err(Error::corrupt("negative sequence length"));
        }
        Ok(raw as u64)
    }

    fn query_variant_selected(&mut self, ty: &Arc<FieldType>) -> Result<Arc<FieldType>, Error> {
        let variant = ty.as_variant().ok_or_else(|| Error::corrupt("not a variant type"))?;
        let tag_value = self
            .resolve(&variant.tag_path)
            .ok_or_else(|| Error::corrupt(format!("cannot resolve variant tag path {}", variant.tag_path)))?;
        let label = match &tag_value {
            FieldValue::Variant(label, _) => *label,
            _ => {
                return Err(Error::corrupt("variant tag field did not resolve to an enumeration selection"));
            }
        };
        let selected = variant
            .option(label.as_str())
            .cloned()
            .ok_or_else(|| Error::corrupt(format!("unknown variant option {label}")))?;
        if let Some(PartialCompound::Variant(slot)) = self.stack.last_mut() {
            *slot = Some(label);
        }
        Ok(selected)
    }
}

/// Drives one stream's worth of decoding: a single [`BinaryTypeReader`]
/// plus the bookkeeping needed to sequence CTF's six dynamic scopes into
/// [`Notification`]s (spec §4.3).
pub struct NotifIter<M: Medium> {
    medium: M,
    trace_class: Arc<TraceClass>,
    state: State,
    btr: BinaryTypeReader,
    /// Bits consumed so far within the current packet; doubles as
    /// `packet_at` from spec §3/§4.2.
    packet_cursor_bits: u64,
    packet: PacketState,
    finished_scopes: FinishedScopes,
    current_event_class_id: Option<u64>,
    current_event_clock: Option<ClockSnapshot>,
    pending_event_header: Option<FieldValue>,
    pending_event_context: Option<FieldValue>,
    pending_event_payload: Option<FieldValue>,
    pending_stream_event_context: Option<FieldValue>,
    emitted_stream_beginning: bool,
    ended: bool,
}

/// One step of progress: either a notification is ready, or the caller
/// must wait for more data, or the stream has produced everything it
/// ever will.
pub enum NotifIterStep {
    Ready(Notification),
    Again,
    Ended,
}

enum ScopeStep {
    Suspend,
    Done,
    /// The medium ended before any byte of this scope arrived. Only ever
    /// returned for `trace.packet.header` on the first decode attempt of
    /// a packet — anywhere else, the medium ending mid-scope is corrupt
    /// data, not a stream boundary.
    Ended,
}

impl<M: Medium> NotifIter<M> {
    pub fn new(medium: M, trace_class: Arc<TraceClass>) -> Self {
        Self {
            medium,
            trace_class,
            state: State::Init,
            btr: BinaryTypeReader::new(),
            packet_cursor_bits: 0,
            packet: PacketState::default(),
            finished_scopes: FinishedScopes::default(),
            current_event_class_id: None,
            current_event_clock: None,
            pending_event_header: None,
            pending_event_context: None,
            pending_event_payload: None,
            pending_stream_event_context: None,
            emitted_stream_beginning: false,
            ended: false,
        }
    }

    /// Restarts decoding from scratch, discarding all in-flight scope
    /// and packet state (spec §4.3, "the iterator offers reset() to
    /// restart from scratch").
    pub fn reset(&mut self) {
        self.state = State::Init;
        self.btr = BinaryTypeReader::new();
        self.packet_cursor_bits = 0;
        self.packet = PacketState::default();
        self.finished_scopes = FinishedScopes::default();
        self.current_event_class_id = None;
        self.current_event_clock = None;
        self.pending_event_header = None;
        self.pending_event_context = None;
        self.pending_event_payload = None;
        self.pending_stream_event_context = None;
        self.emitted_stream_beginning = false;
        self.ended = false;
    }

    /// Advances the state machine until a notification is ready, the
    /// medium needs to be retried, or the stream has ended.
    pub fn next(&mut self) -> Result<NotifIterStep, Error> {
        if self.ended {
            return Ok(NotifIterStep::Ended);
        }
        loop {
            match self.state {
                State::Init => {
                    self.state = State::EmitStreamBeginning;
                }
                State::EmitStreamBeginning => {
                    self.emitted_stream_beginning = true;
                    self.state = State::DScopeTracePacketHeaderBegin;
                    let clock_class = self
                        .trace_class
                        .sole_stream_class()
                        .and_then(|sc| sc.clock.clone());
                    return Ok(NotifIterStep::Ready(Notification::StreamBeginning {
                        stream_id: self.packet.stream_id.unwrap_or(0),
                        clock_class,
                    }));
                }
                State::DScopeTracePacketHeaderBegin | State::DScopeTracePacketHeaderContinue => {
                    let Some(ty) = self.trace_class.packet_header_type.clone() else {
                        self.state = State::AfterTracePacketHeader;
                        continue;
                    };
                    let first = self.state == State::DScopeTracePacketHeaderBegin;
                    match self.decode_scope(Scope::TracePacketHeader, ty, first)? {
                        ScopeStep::Suspend => {
                            self.state = State::DScopeTracePacketHeaderContinue;
                            return Ok(NotifIterStep::Again);
                        }
                        ScopeStep::Done => self.state = State::AfterTracePacketHeader,
                        ScopeStep::Ended => self.state = State::EmitStreamEnd,
                    }
                }
                State::AfterTracePacketHeader => {
                    self.resolve_stream_class()?;
                    self.state = State::DScopeStreamPacketContextBegin;
                }
                State::DScopeStreamPacketContextBegin | State::DScopeStreamPacketContextContinue => {
                    let ty = self.stream_class()?.packet_context_type.clone();
                    let Some(ty) = ty else {
                        self.state = State::AfterStreamPacketContext;
                        continue;
                    };
                    let first = self.state == State::DScopeStreamPacketContextBegin;
                    match self.decode_scope(Scope::StreamPacketContext, ty, first)? {
                        ScopeStep::Suspend => {
                            self.state = State::DScopeStreamPacketContextContinue;
                            return Ok(NotifIterStep::Again);
                        }
                        ScopeStep::Done => self.state = State::AfterStreamPacketContext,
                        ScopeStep::Ended => unreachable!("medium cannot end mid-packet-context"),
                    }
                }
                State::AfterStreamPacketContext => {
                    self.resolve_packet_sizing()?;
                    self.state = State::EmitNotifNewPacket;
                }
                State::EmitNotifNewPacket => {
                    self.state = State::DScopeStreamEventHeaderBegin;
                    return Ok(NotifIterStep::Ready(Notification::NewPacket(NewPacketNotification {
                        stream_id: self.packet.stream_id.unwrap_or(0),
                        packet_header_fields: self.finished_scopes.trace_packet_header.clone(),
                        packet_context_fields: self.finished_scopes.stream_packet_context.clone(),
                    })));
                }
                State::DScopeStreamEventHeaderBegin | State::DScopeStreamEventHeaderContinue => {
                    let content_size = self.packet.content_size_bits.unwrap_or(u64::MAX);
                    if self.packet_cursor_bits == content_size {
                        self.state = State::EmitNotifEndOfPacket;
                        continue;
                    } else if self.packet_cursor_bits > content_size {
                        return Err(Error::corrupt("decode cursor passed content_size_bits"));
                    }

                    let ty = self.stream_class()?.event_header_type.clone();
                    let Some(ty) = ty else {
                        self.pending_event_header = None;
                        self.finished_scopes.stream_event_header = None;
                        self.state = State::AfterStreamEventHeader;
                        continue;
                    };
                    let first = self.state == State::DScopeStreamEventHeaderBegin;
                    match self.decode_scope(Scope::StreamEventHeader, ty, first)? {
                        ScopeStep::Suspend => {
                            self.state = State::DScopeStreamEventHeaderContinue;
                            return Ok(NotifIterStep::Again);
                        }
                        ScopeStep::Done => {
                            self.pending_event_header = self.finished_scopes.stream_event_header.clone();
                            self.state = State::AfterStreamEventHeader;
                        }
                        ScopeStep::Ended => unreachable!("medium cannot end mid-event-header"),
                    }
                }
                State::AfterStreamEventHeader => {
                    self.resolve_event_class()?;
                    self.resolve_clock_snapshot()?;
                    self.state = State::DScopeStreamEventContextBegin;
                }
                State::DScopeStreamEventContextBegin | State::DScopeStreamEventContextContinue => {
                    let ty = self.stream_class()?.event_context_type.clone();
                    let Some(ty) = ty else {
                        self.pending_stream_event_context = None;
                        self.state = State::DScopeEventContextBegin;
                        continue;
                    };
                    let first = self.state == State::DScopeStreamEventContextBegin;
                    match self.decode_scope(Scope::StreamEventContext, ty, first)? {
                        ScopeStep::Suspend => {
                            self.state = State::DScopeStreamEventContextContinue;
                            return Ok(NotifIterStep::Again);
                        }
                        ScopeStep::Done => {
                            self.pending_stream_event_context = self.finished_scopes.stream_event_context.clone();
                            self.state = State::DScopeEventContextBegin;
                        }
                        ScopeStep::Ended => unreachable!("medium cannot end mid-event-context"),
                    }
                }
                State::DScopeEventContextBegin | State::DScopeEventContextContinue => {
                    let ty = self.event_class()?.context_type.clone();
                    let Some(ty) = ty else {
                        self.pending_event_context = None;
                        self.state = State::DScopeEventPayloadBegin;
                        continue;
                    };
                    let first = self.state == State::DScopeEventContextBegin;
                    match self.decode_scope(Scope::EventContext, ty, first)? {
                        ScopeStep::Suspend => {
                            self.state = State::DScopeEventContextContinue;
                            return Ok(NotifIterStep::Again);
                        }
                        ScopeStep::Done => {
                            self.pending_event_context = self.finished_scopes.event_context.clone();
                            self.state = State::DScopeEventPayloadBegin;
                        }
                        ScopeStep::Ended => unreachable!("medium cannot end mid-event-context"),
                    }
                }
                State::DScopeEventPayloadBegin | State::DScopeEventPayloadContinue => {
                    let ty = self.event_class()?.payload_type.clone();
                    let Some(ty) = ty else {
                        self.pending_event_payload = None;
                        self.state = State::EmitNotifEvent;
                        continue;
                    };
                    let first = self.state == State::DScopeEventPayloadBegin;
                    match self.decode_scope(Scope::EventPayload, ty, first)? {
                        ScopeStep::Suspend => {
                            self.state = State::DScopeEventPayloadContinue;
                            return Ok(NotifIterStep::Again);
                        }
                        ScopeStep::Done => {
                            self.state = State::EmitNotifEvent;
                        }
                        ScopeStep::Ended => unreachable!("medium cannot end mid-event-payload"),
                    }
                }
                State::EmitNotifEvent => {
                    self.state = State::DScopeStreamEventHeaderBegin;
                    let notif = EventNotification {
                        event_class_id: self.current_event_class_id.unwrap_or(0),
                        stream_event_header: self.pending_event_header.take(),
                        stream_event_context: self.pending_stream_event_context.take(),
                        event_context: self.pending_event_context.take(),
                        event_payload: self.pending_event_payload.take(),
                        clock_snapshot: self.current_event_clock.take(),
                    };
                    return Ok(NotifIterStep::Ready(Notification::Event(notif)));
                }
                State::EmitNotifEndOfPacket => {
                    let stream_id = self.packet.stream_id.unwrap_or(0);
                    self.state = State::SkipPacketPadding;
                    return Ok(NotifIterStep::Ready(Notification::EndOfPacket { stream_id }));
                }
                State::SkipPacketPadding => {
                    let packet_size = self.packet.packet_size_bits.unwrap_or(self.packet_cursor_bits);
                    let remaining = packet_size.saturating_sub(self.packet_cursor_bits);
                    if remaining == 0 {
                        self.start_next_packet();
                        continue;
                    }
                    match self.skip_padding(remaining)? {
                        ScopeStep::Suspend => return Ok(NotifIterStep::Again),
                        ScopeStep::Done => self.start_next_packet(),
                        ScopeStep::Ended => unreachable!("skip_padding never reports Ended"),
                    }
                }
                State::EmitStreamEnd => {
                    self.state = State::Ended;
                    if self.emitted_stream_beginning {
                        let stream_id = self.packet.stream_id.unwrap_or(0);
                        return Ok(NotifIterStep::Ready(Notification::StreamEnd { stream_id }));
                    }
                }
                State::Ended => {
                    self.ended = true;
                    return Ok(NotifIterStep::Ended);
                }
            }
        }
    }

    fn start_next_packet(&mut self) {
        self.packet_cursor_bits = 0;
        self.packet = PacketState::default();
        self.finished_scopes = FinishedScopes::default();
        self.state = State::DScopeTracePacketHeaderBegin;
    }

    fn stream_class(&self) -> Result<&crate::metadata::StreamClass, Error> {
        let id = self.packet.stream_id.unwrap_or(0);
        self.trace_class
            .stream_class(id)
            .ok_or_else(|| Error::corrupt(format!("unknown stream class id {id}")))
    }

    fn event_class(&self) -> Result<&crate::metadata::EventClass, Error> {
        let sc = self.stream_class()?;
        let id = self
            .current_event_class_id
            .ok_or_else(|| Error::corrupt("event class not yet resolved"))?;
        sc.event_class(id)
            .ok_or_else(|| Error::corrupt(format!("unknown event class id {id}")))
    }

    fn resolve_stream_class(&mut self) -> Result<(), Error> {
        let from_header = self
            .finished_scopes
            .trace_packet_header
            .as_ref()
            .and_then(|v| v.member("stream_id"))
            .and_then(|v| v.as_u64());
        let id = match from_header {
            Some(id) => id,
            None => {
                self.trace_class
                    .sole_stream_class()
                    .ok_or_else(|| Error::corrupt("no stream_id field and more than one declared stream class"))?
                    .id
            }
        };
        debug!(stream_id = id, "Resolved stream class");
        self.packet.stream_id = Some(id);
        Ok(())
    }

    fn resolve_packet_sizing(&mut self) -> Result<(), Error> {
        let ctx = self.finished_scopes.stream_packet_context.clone();
        let packet_size_bits = ctx
            .as_ref()
            .and_then(|v| v.member("packet_size"))
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::corrupt("cannot determine packet size without stream.packet.context.packet_size"))?;
        if packet_size_bits == 0 || packet_size_bits % 8 != 0 {
            return Err(Error::corrupt("packet_size_bits must be a positive multiple of 8"));
        }
        let content_size_bits = ctx
            .as_ref()
            .and_then(|v| v.member("content_size"))
            .and_then(|v| v.as_u64())
            .unwrap_or(packet_size_bits);
        if content_size_bits > packet_size_bits {
            return Err(Error::corrupt("content_size_bits exceeds packet_size_bits"));
        }
        debug!(packet_size_bits, content_size_bits, "Resolved packet sizing");
        self.packet.packet_size_bits = Some(packet_size_bits);
        self.packet.content_size_bits = Some(content_size_bits);
        Ok(())
    }

    /// Resolves the event class id from `stream.event.header`. The
    /// CTF-1.8 `v.id` idiom (a `v` variant selected by a compact `id`
    /// tag, whose chosen option carries its own, wider `id` field) takes
    /// priority over a direct `id` field — in that idiom the top-level
    /// `id` is only the compact/extended selector, not the real event
    /// id, exactly as `set_current_event_class` in the original C
    /// checks `v` before falling back to `id` (not a quirk to elide).
    fn resolve_event_class(&mut self) -> Result<(), Error> {
        let header = self.finished_scopes.stream_event_header.clone();
        let from_v = header
            .as_ref()
            .and_then(|v| v.member("v"))
            .and_then(|v| v.member("id"))
            .and_then(|v| v.as_integer());
        let from_id = header.as_ref().and_then(|v| v.member("id")).and_then(|v| v.as_integer());
        let id = if let Some(id) = from_v.or(from_id) {
            id as u64
        } else {
            let sc = self.stream_class()?;
            if sc.event_classes.len() == 1 {
                0
            } else {
                return Err(Error::corrupt("cannot resolve event class id from stream.event.header"));
            }
        };
        debug!(event_class_id = id, from_v = from_v.is_some(), "Resolved event class");
        self.current_event_class_id = Some(id);
        self.current_event_clock = None;
        Ok(())
    }

    /// Pulls a `timestamp` field out of `stream.event.header`, if
    /// present, and pairs it with the stream class's clock to produce
    /// the event's clock snapshot. Absent either, the event carries no
    /// timestamp and sorts per spec §4.4's tie-break rule 1 in the
    /// muxer.
    fn resolve_clock_snapshot(&mut self) -> Result<(), Error> {
        let Some(clock_class) = self.stream_class()?.clock.clone() else {
            return Ok(());
        };
        let cycles = self
            .finished_scopes
            .stream_event_header
            .as_ref()
            .and_then(|v| v.member("timestamp"))
            .and_then(|v| v.as_u64());
        self.current_event_clock = cycles.map(|cycles| ClockSnapshot { clock_class, cycles });
        Ok(())
    }

    /// Consumes padding bits after the last event of a packet, without
    /// interpreting them (spec §4.3, "Padding skip").
    fn skip_padding(&mut self, remaining_bits: u64) -> Result<ScopeStep, Error> {
        let remaining_bytes = remaining_bits.div_ceil(8) as usize;
        match self.medium.request_bytes(remaining_bytes) {
            MediumStatus::Data(buf) => {
                self.packet_cursor_bits += buf.len() as u64 * 8;
                if self.packet_cursor_bits
                    >= self.packet.packet_size_bits.unwrap_or(self.packet_cursor_bits)
                {
                    Ok(ScopeStep::Done)
                } else {
                    Ok(ScopeStep::Suspend)
                }
            }
            MediumStatus::Again => Ok(ScopeStep::Suspend),
            MediumStatus::Eof => Ok(ScopeStep::Done),
        }
    }

    fn decode_scope(&mut self, scope: Scope, ty: Arc<FieldType>, first_call: bool) -> Result<ScopeStep, Error> {
        if first_call {
            trace!(%scope, "Entering dynamic scope");
        }
        let request = self.medium.request_bytes(4096);
        let buf = match request {
            MediumStatus::Data(b) => b,
            MediumStatus::Again => return Ok(ScopeStep::Suspend),
            MediumStatus::Eof if first_call && matches!(scope, Scope::TracePacketHeader) => {
                trace!("Medium ended at a packet boundary");
                return Ok(ScopeStep::Ended);
            }
            MediumStatus::Eof => return Err(Error::corrupt("medium ended mid-field")),
        };

        let finished = self.finished_scopes.clone();
        let mut builder = ScopeBuilder::new(scope, &finished);
        let outcome = if first_call {
            self.btr.start(ty, buf, 0, self.packet_cursor_bits, &mut builder)
        } else {
            self.btr.continue_(buf, &mut builder)
        }
        .map_err(|e| crate::btr::tag_scope_error(scope, e))?;

        match outcome {
            BtrOutcome::Suspended(bits) => {
                self.packet_cursor_bits += bits;
                Ok(ScopeStep::Suspend)
            }
            BtrOutcome::Done(bits) => {
                self.packet_cursor_bits += bits;
                let value = builder.result.ok_or_else(|| Error::corrupt("scope decoded to no value"))?;
                self.finished_scopes.set(scope, value);
                trace!(%scope, "Left dynamic scope");
                Ok(ScopeStep::Done)
            }
        }
    }
}
