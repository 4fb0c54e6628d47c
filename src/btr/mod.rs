//! Event-driven, resumable binary type reader.
//!
//! The BTR decodes one [`FieldType`] at a time from one or more byte
//! buffers handed to it by a caller (typically a [`crate::notif_iter`]).
//! It knows nothing about packets, streams, or dynamic scopes — only how
//! to walk a recursive field-type graph bit by bit, suspending cleanly at
//! a buffer boundary and resuming exactly where it left off.
//!
//! Grounded on `plugins/ctf/common/btr/btr.c`'s `enum btr_state` /
//! `struct stack_entry` / stitch-buffer design, reworked as owned Rust
//! state instead of a `GArray`-backed stack and `void *` callbacks.

pub mod bitfield;

use crate::error::Error;
use crate::metadata::{FieldType, Scope};
use std::sync::Arc;
use tracing::trace;

/// What happened on a call to [`BinaryTypeReader::start`] or
/// [`BinaryTypeReader::continue_`].
///
/// `Done` and `Suspended` both live on the success path, mirroring the
/// spec's explicit split between "not an error; suspension marker" and
/// the real fault taxonomy in [`Error`]: running out of buffer mid-field
/// is an everyday occurrence, not a failure.
#[derive(Debug, Eq, PartialEq)]
pub enum BtrOutcome {
    /// The root type is fully decoded. Carries the number of bits
    /// consumed from the buffer passed to this call.
    Done(u64),
    /// The buffer was exhausted before the root type finished decoding.
    /// Carries the number of bits consumed from the buffer passed to
    /// this call; the caller must supply a fresh buffer to
    /// `continue_`.
    Suspended(u64),
}

/// The BTR's callback receiver. Every method has a default no-op (or,
/// for the two query methods, an error) implementation so a visitor only
/// needs to override what it cares about — matching the C API's "any
/// member of this structure may be set to NULL" contract.
pub trait BtrVisitor {
    fn on_signed_int(&mut self, _value: i64, _ty: &Arc<FieldType>) -> Result<(), Error> {
        Ok(())
    }

    fn on_unsigned_int(&mut self, _value: u64, _ty: &Arc<FieldType>) -> Result<(), Error> {
        Ok(())
    }

    fn on_float(&mut self, _value: f64, _ty: &Arc<FieldType>) -> Result<(), Error> {
        Ok(())
    }

    fn on_string_begin(&mut self, _ty: &Arc<FieldType>) -> Result<(), Error> {
        Ok(())
    }

    fn on_string(&mut self, _substring: &[u8], _ty: &Arc<FieldType>) -> Result<(), Error> {
        Ok(())
    }

    fn on_string_end(&mut self, _ty: &Arc<FieldType>) -> Result<(), Error> {
        Ok(())
    }

    fn on_compound_begin(&mut self, _ty: &Arc<FieldType>) -> Result<(), Error> {
        Ok(())
    }

    fn on_compound_end(&mut self, _ty: &Arc<FieldType>) -> Result<(), Error> {
        Ok(())
    }

    /// Invoked on entering a sequence, to learn how many elements follow.
    fn query_sequence_length(&mut self, ty: &Arc<FieldType>) -> Result<u64, Error> {
        let _ = ty;
        Err(Error::callback("no sequence length provider installed"))
    }

    /// Invoked on entering a variant, to learn which option is selected.
    fn query_variant_selected(&mut self, ty: &Arc<FieldType>) -> Result<Arc<FieldType>, Error> {
        let _ = ty;
        Err(Error::callback("no variant selection provider installed"))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum State {
    Init,
    NextField,
    AlignBasic,
    AlignCompound,
    ReadBasicBegin,
    ReadBasicContinue,
    Done,
}

struct StackFrame {
    base_type: Arc<FieldType>,
    base_length: u64,
    next_index: u64,
}

/// 16 bytes: large enough for any single basic field (max 64 bits) plus
/// slop for the partial byte straddling a buffer boundary on each side.
const STITCH_CAPACITY: usize = 16;

struct Stitch {
    buf: [u8; STITCH_CAPACITY],
    /// Bit offset, within `buf[0]`, of the first bit of the field.
    offset: u8,
    /// Bits accumulated so far, starting at `offset`.
    at: u64,
}

impl Stitch {
    fn new() -> Self {
        Self {
            buf: [0; STITCH_CAPACITY],
            offset: 0,
            at: 0,
        }
    }

    fn reset(&mut self, offset: u8) {
        self.offset = offset;
        self.at = 0;
    }

    /// Appends `nbits` starting at bit `src_bit_offset` of `src` to the
    /// stitch buffer. `nbits` must be a multiple of 8, except possibly
    /// for the very first append of a field (handled by the caller
    /// computing byte-granular slices — see the reasoning in
    /// `read_basic_begin`: a buffer boundary is always byte-aligned, so
    /// every append here is whole bytes).
    fn append_bytes(&mut self, src: &[u8]) {
        let byte_at = (self.offset as u64 + self.at) / 8;
        for (i, &b) in src.iter().enumerate() {
            self.buf[byte_at as usize + i] = b;
        }
        self.at += src.len() as u64 * 8;
    }
}

/// What's being decoded "in flight" between `AlignBasic` and the
/// completion of `ReadBasicBegin`/`ReadBasicContinue`.
struct CurrentBasic {
    ty: Arc<FieldType>,
    /// Width in bits of this basic field (cached from `ty`).
    size: u8,
}

/// A resumable decoder for one [`FieldType`] at a time.
///
/// Owns its stack and stitch buffer exclusively (spec §5): nothing about
/// a `BinaryTypeReader` is shared across concurrent decodes, and it
/// holds no reference to the buffer across calls — everything it needs
/// to survive a suspension is copied into the stitch buffer first.
pub struct BinaryTypeReader {
    state: State,
    stack: Vec<StackFrame>,
    root: Option<Arc<FieldType>>,
    current_basic: Option<CurrentBasic>,
    stitch: Stitch,
    last_byte_order: Option<crate::metadata::ByteOrder>,

    // Per-call buffer cursor state. `buf`/`buf_len` are re-supplied on
    // every `start`/`continue_` call; the BTR never retains a borrow of
    // the caller's slice across a suspension (spec §5, "ownership of
    // byte buffers").
    packet_offset: u64,
    cursor: u64,
    /// True once a string's `on_string_begin` has fired but
    /// `on_string_end` hasn't yet — needed to resume a string scan that
    /// spans a buffer boundary without re-announcing the begin.
    string_in_progress: bool,
}

impl Default for BinaryTypeReader {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryTypeReader {
    pub fn new() -> Self {
        Self {
            state: State::Init,
            stack: Vec::new(),
            root: None,
            current_basic: None,
            stitch: Stitch::new(),
            last_byte_order: None,
            packet_offset: 0,
            cursor: 0,
            string_in_progress: false,
        }
    }

    /// Absolute bit offset of the decode cursor within the packet.
    fn packet_at(&self) -> u64 {
        self.packet_offset + self.cursor
    }

    /// Resets all state and begins decoding `root` from `buf`, whose
    /// first bit is `offset` bits in and whose absolute packet bit
    /// offset is `packet_offset`.
    pub fn start(
        &mut self,
        root: Arc<FieldType>,
        buf: &[u8],
        offset: u64,
        packet_offset: u64,
        visitor: &mut dyn BtrVisitor,
    ) -> Result<BtrOutcome, Error> {
        self.state = State::Init;
        self.stack.clear();
        self.current_basic = None;
        self.last_byte_order = None;
        self.string_in_progress = false;
        self.packet_offset = packet_offset;
        self.cursor = offset;
        self.root = Some(root);
        trace!(bits = buf.len() as u64 * 8, packet_offset, "Starting scope decode");
        self.run(buf, visitor)
    }

    /// Resumes decoding after a previous `Suspended` outcome, with a
    /// fresh buffer whose first bit continues exactly where the last
    /// buffer left off.
    pub fn continue_(
        &mut self,
        buf: &[u8],
        visitor: &mut dyn BtrVisitor,
    ) -> Result<BtrOutcome, Error> {
        self.cursor = 0;
        trace!(bits = buf.len() as u64 * 8, "Resuming suspended scope decode");
        self.run(buf, visitor)
    }

    fn available(&self, buf_len: u64) -> u64 {
        buf_len - self.cursor
    }

    fn run(&mut self, buf: &[u8], visitor: &mut dyn BtrVisitor) -> Result<BtrOutcome, Error> {
        let buf_len = buf.len() as u64 * 8;
        let start_cursor = self.cursor;

        loop {
            match self.state {
                State::Init => {
                    let root = self.root.clone().expect("start() always sets root");
                    self.enter_field(root, visitor)?;
                }
                State::Done => {
                    let consumed = self.cursor - start_cursor;
                    trace!(consumed, "Scope decode done");
                    return Ok(BtrOutcome::Done(consumed));
                }
                State::NextField => {
                    self.next_field(visitor)?;
                }
                State::AlignBasic | State::AlignCompound => {
                    let align_to = match self.state {
                        State::AlignBasic => self
                            .current_basic
                            .as_ref()
                            .expect("AlignBasic always has current_basic set")
                            .ty
                            .alignment(),
                        _ => self.stack.last().expect("AlignCompound has a pushed frame").base_type.alignment(),
                    } as u64;
                    let misalignment = self.packet_at() % align_to;
                    let skip = if misalignment == 0 { 0 } else { align_to - misalignment };
                    let avail = self.available(buf_len);
                    let consume = skip.min(avail);
                    self.cursor += consume;
                    if consume < skip {
                        let consumed = self.cursor - start_cursor;
                        trace!(consumed, align_to, "Suspended mid-alignment");
                        return Ok(BtrOutcome::Suspended(consumed));
                    }
                    self.state = if self.state == State::AlignBasic {
                        State::ReadBasicBegin
                    } else {
                        State::NextField
                    };
                }
                State::ReadBasicBegin => {
                    match self.read_basic_begin(buf, buf_len, visitor)? {
                        Some(outcome) => return Ok(outcome),
                        None => continue,
                    }
                }
                State::ReadBasicContinue => {
                    match self.read_basic_continue(buf, buf_len, visitor)? {
                        Some(outcome) => return Ok(outcome),
                        None => continue,
                    }
                }
            }
        }
    }

    /// Handles entering a (possibly root) field: compound types get a
    /// pushed frame and `on_compound_begin`; basic types become
    /// `current_basic` and proceed to alignment.
    fn enter_field(&mut self, ty: Arc<FieldType>, visitor: &mut dyn BtrVisitor) -> Result<(), Error> {
        if ty.is_compound() {
            let base_length = compound_length(&ty, visitor)?;
            visitor.on_compound_begin(&ty)?;
            self.stack.push(StackFrame {
                base_type: ty,
                base_length,
                next_index: 0,
            });
            self.state = State::AlignCompound;
        } else {
            let size = basic_size_bits(&ty)?;
            self.current_basic = Some(CurrentBasic { ty, size });
            self.state = State::AlignBasic;
        }
        Ok(())
    }

    fn next_field(&mut self, visitor: &mut dyn BtrVisitor) -> Result<(), Error> {
        if self.stack.is_empty() {
            self.state = State::Done;
            return Ok(());
        }

        // Pop completed frames, firing on_compound_end and bumping the
        // parent's next_index for each pop (spec §4.2, NextField).
        while let Some(top) = self.stack.last() {
            if top.next_index < top.base_length {
                break;
            }
            let finished = self.stack.pop().expect("checked non-empty above");
            visitor.on_compound_end(&finished.base_type)?;
            if let Some(parent) = self.stack.last_mut() {
                parent.next_index += 1;
            }
        }

        if self.stack.is_empty() {
            self.state = State::Done;
            return Ok(());
        }

        let top = self.stack.last().expect("checked non-empty above");
        let child = child_field_type(&top.base_type, top.next_index, visitor)?;
        self.enter_field(child, visitor)
    }

    fn read_basic_begin(
        &mut self,
        buf: &[u8],
        buf_len: u64,
        visitor: &mut dyn BtrVisitor,
    ) -> Result<Option<BtrOutcome>, Error> {
        let avail = self.available(buf_len);
        if avail == 0 {
            let consumed = self.cursor;
            trace!(consumed, "Suspended: buffer exhausted before a basic field began");
            return Ok(Some(BtrOutcome::Suspended(consumed)));
        }

        let current = self.current_basic.as_ref().expect("ReadBasicBegin has current_basic").clone_handle();
        let byte_order = basic_byte_order(&current.ty);
        self.check_byte_order_transition(byte_order)?;

        if matches!(*current.ty, FieldType::String(_)) {
            return self.read_string(buf, buf_len, visitor, true);
        }

        let size = current.size as u64;
        if avail >= size {
            let byte_idx = (self.cursor / 8) as usize;
            let bit_off = (self.cursor % 8) as u8;
            let nbytes = ((bit_off as u64 + size).div_ceil(8)) as usize;
            let slice = &buf[byte_idx..byte_idx + nbytes];
            self.deliver_basic(slice, bit_off, current.size, byte_order, &current.ty, visitor)?;
            self.cursor += size;
            self.finish_basic_decode(byte_order)?;
            return Ok(None);
        }

        // Field spans the end of this buffer: copy what's left into the
        // stitch buffer and suspend. Buffer boundaries only ever occur
        // byte-aligned (the medium only ever hands back whole bytes),
        // so `avail` here is always a whole number of bytes.
        let bit_off = (self.cursor % 8) as u8;
        self.stitch.reset(bit_off);
        let byte_idx = (self.cursor / 8) as usize;
        self.stitch.append_bytes(&buf[byte_idx..]);
        self.cursor = buf_len;
        self.state = State::ReadBasicContinue;
        trace!(size = current.size, "Suspended: basic field straddles buffer boundary, stitching");
        Ok(Some(BtrOutcome::Suspended(self.cursor)))
    }

    fn read_basic_continue(
        &mut self,
        buf: &[u8],
        buf_len: u64,
        visitor: &mut dyn BtrVisitor,
    ) -> Result<Option<BtrOutcome>, Error> {
        let current = self.current_basic.as_ref().expect("ReadBasicContinue has current_basic").clone_handle();

        if self.string_in_progress {
            return self.read_string(buf, buf_len, visitor, false);
        }

        let size = current.size as u64;
        let needed_bits = size - self.stitch.at;
        let avail = buf_len;
        if needed_bits <= avail {
            let nbytes = needed_bits.div_ceil(8) as usize;
            self.stitch.append_bytes(&buf[..nbytes]);
            self.cursor = nbytes as u64 * 8;
            let byte_order = basic_byte_order(&current.ty);
            let stitch_slice = self.stitch.buf;
            self.deliver_basic(
                &stitch_slice[..STITCH_CAPACITY],
                self.stitch.offset,
                current.size,
                byte_order,
                &current.ty,
                visitor,
            )?;
            self.finish_basic_decode(byte_order)?;
            Ok(None)
        } else {
            self.stitch.append_bytes(buf);
            self.cursor = buf_len;
            Ok(Some(BtrOutcome::Suspended(self.cursor)))
        }
    }

    fn finish_basic_decode(&mut self, byte_order: Option<crate::metadata::ByteOrder>) -> Result<(), Error> {
        if let Some(bo) = byte_order {
            self.last_byte_order = Some(bo);
        }
        self.current_basic = None;
        if let Some(top) = self.stack.last_mut() {
            top.next_index += 1;
        } else {
            // A lone basic root: nothing was ever pushed, so completion
            // is signalled here rather than through NextField's pop loop.
            self.state = State::Done;
            return Ok(());
        }
        self.state = State::NextField;
        Ok(())
    }

    fn deliver_basic(
        &self,
        bytes: &[u8],
        bit_off: u8,
        size: u8,
        byte_order: Option<crate::metadata::ByteOrder>,
        ty: &Arc<FieldType>,
        visitor: &mut dyn BtrVisitor,
    ) -> Result<(), Error> {
        match &**ty {
            FieldType::Int(int_ty) => {
                let order = byte_order.expect("int field always has a byte order");
                if int_ty.signed {
                    let v = bitfield::read_signed(bytes, bit_off, size, order);
                    visitor.on_signed_int(v, ty)
                } else {
                    let v = bitfield::read_unsigned(bytes, bit_off, size, order);
                    visitor.on_unsigned_int(v, ty)
                }
            }
            FieldType::Float(_) => {
                let order = byte_order.expect("float field always has a byte order");
                let bits = bitfield::read_unsigned(bytes, bit_off, size, order);
                let v = match size {
                    32 => f32::from_bits(bits as u32) as f64,
                    64 => f64::from_bits(bits),
                    _ => return Err(Error::unsupported(format!("unsupported float width: {size} bits"))),
                };
                visitor.on_float(v, ty)
            }
            _ => unreachable!("deliver_basic only called for Int/Float"),
        }
    }

    /// Scans `buf` (or the remainder of it, on a resumed string) for a
    /// null terminator, delivering substrings as it goes. `first_call`
    /// distinguishes the initial entry (which must fire
    /// `on_string_begin`) from a resumption.
    fn read_string(
        &mut self,
        buf: &[u8],
        buf_len: u64,
        visitor: &mut dyn BtrVisitor,
        first_call: bool,
    ) -> Result<Option<BtrOutcome>, Error> {
        let ty = self.current_basic.as_ref().expect("string decode has current_basic").ty.clone();
        if first_call {
            visitor.on_string_begin(&ty)?;
            self.string_in_progress = true;
        }

        let byte_idx = (self.cursor / 8) as usize;
        let remaining = &buf[byte_idx..];
        match remaining.iter().position(|&b| b == 0) {
            Some(k) => {
                if k > 0 {
                    visitor.on_string(&remaining[..k], &ty)?;
                }
                visitor.on_string_end(&ty)?;
                self.cursor += (k as u64 + 1) * 8;
                self.string_in_progress = false;
                self.current_basic = None;
                if let Some(top) = self.stack.last_mut() {
                    top.next_index += 1;
                    self.state = State::NextField;
                } else {
                    self.state = State::Done;
                }
                Ok(None)
            }
            None => {
                if !remaining.is_empty() {
                    visitor.on_string(remaining, &ty)?;
                }
                self.cursor = buf_len;
                self.state = State::ReadBasicContinue;
                Ok(Some(BtrOutcome::Suspended(self.cursor)))
            }
        }
    }

    fn check_byte_order_transition(&self, incoming: Option<crate::metadata::ByteOrder>) -> Result<(), Error> {
        let Some(incoming) = incoming else { return Ok(()) };
        if self.packet_at() % 8 != 0 {
            if let Some(prev) = self.last_byte_order {
                if prev != incoming {
                    return Err(Error::corrupt(
                        "byte order changed between two basic fields sharing a non-byte-aligned boundary",
                    ));
                }
            }
        }
        Ok(())
    }
}

impl CurrentBasic {
    fn clone_handle(&self) -> CurrentBasic {
        CurrentBasic {
            ty: self.ty.clone(),
            size: self.size,
        }
    }
}

fn basic_byte_order(ty: &Arc<FieldType>) -> Option<crate::metadata::ByteOrder> {
    match &**ty {
        FieldType::Int(t) => Some(t.byte_order),
        FieldType::Float(t) => Some(t.byte_order),
        _ => None,
    }
}

fn basic_size_bits(ty: &Arc<FieldType>) -> Result<u8, Error> {
    match &**ty {
        FieldType::Int(t) => {
            if t.size == 0 {
                return Err(Error::corrupt("zero-width integer field"));
            }
            Ok(t.size)
        }
        FieldType::Float(t) => {
            if t.size != 32 && t.size != 64 {
                return Err(Error::unsupported(format!("unsupported float width: {} bits", t.size)));
            }
            Ok(t.size)
        }
        FieldType::String(_) => Ok(0),
        _ => unreachable!("basic_size_bits only called for non-compound types"),
    }
}

fn compound_length(ty: &Arc<FieldType>, visitor: &mut dyn BtrVisitor) -> Result<u64, Error> {
    match &**ty {
        FieldType::Struct(s) => Ok(s.members.len() as u64),
        FieldType::Variant(_) => Ok(1),
        FieldType::Array(a) => Ok(a.length),
        FieldType::Sequence(_) => visitor.query_sequence_length(ty),
        _ => unreachable!("compound_length only called for compound types"),
    }
}

fn child_field_type(
    parent: &Arc<FieldType>,
    index: u64,
    visitor: &mut dyn BtrVisitor,
) -> Result<Arc<FieldType>, Error> {
    match &**parent {
        FieldType::Struct(s) => Ok(s.members[index as usize].1.clone()),
        FieldType::Array(a) => Ok(a.element.clone()),
        FieldType::Sequence(s) => Ok(s.element.clone()),
        FieldType::Variant(_) => visitor.query_variant_selected(parent),
        _ => unreachable!("child_field_type only called for compound types"),
    }
}

/// Which dynamic scope a decode belongs to, threaded through for error
/// messages only — the BTR itself has no notion of scopes.
pub fn tag_scope_error(scope: Scope, err: Error) -> Error {
    match err {
        Error::CorruptTrace(msg) => Error::CorruptTrace(format!("[{scope}] {msg}")),
        Error::UnsupportedFeature(msg) => Error::UnsupportedFeature(format!("[{scope}] {msg}")),
        Error::CallbackError(msg) => Error::CallbackError(format!("[{scope}] {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ByteOrder, IntFieldType, StructFieldType};
    use internment::Intern;

    struct Collector {
        unsigned: Vec<u64>,
        signed: Vec<i64>,
        begins: u32,
        ends: u32,
    }

    impl Collector {
        fn new() -> Self {
            Self {
                unsigned: Vec::new(),
                signed: Vec::new(),
                begins: 0,
                ends: 0,
            }
        }
    }

    impl BtrVisitor for Collector {
        fn on_unsigned_int(&mut self, value: u64, _ty: &Arc<FieldType>) -> Result<(), Error> {
            self.unsigned.push(value);
            Ok(())
        }

        fn on_signed_int(&mut self, value: i64, _ty: &Arc<FieldType>) -> Result<(), Error> {
            self.signed.push(value);
            Ok(())
        }

        fn on_compound_begin(&mut self, _ty: &Arc<FieldType>) -> Result<(), Error> {
            self.begins += 1;
            Ok(())
        }

        fn on_compound_end(&mut self, _ty: &Arc<FieldType>) -> Result<(), Error> {
            self.ends += 1;
            Ok(())
        }
    }

    fn u32_field(order: ByteOrder) -> Arc<FieldType> {
        Arc::new(FieldType::Int(IntFieldType::new(false, 32, order, 32)))
    }

    #[test]
    fn decodes_single_le_integer() {
        let mut btr = BinaryTypeReader::new();
        let mut visitor = Collector::new();
        let ty = u32_field(ByteOrder::LittleEndian);
        let buf = 0x1234_5678u32.to_le_bytes();
        let outcome = btr.start(ty, &buf, 0, 0, &mut visitor).unwrap();
        assert_eq!(outcome, BtrOutcome::Done(32));
        assert_eq!(visitor.unsigned, vec![0x1234_5678]);
    }

    #[test]
    fn decodes_struct_of_two_integers() {
        let members = vec![
            (Intern::new("a".to_string()), u32_field(ByteOrder::BigEndian)),
            (Intern::new("b".to_string()), u32_field(ByteOrder::BigEndian)),
        ];
        let st = Arc::new(FieldType::Struct(StructFieldType {
            members,
            min_alignment: 32,
        }));

        let mut btr = BinaryTypeReader::new();
        let mut visitor = Collector::new();
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(&2u32.to_be_bytes());
        let outcome = btr.start(st, &buf, 0, 0, &mut visitor).unwrap();
        assert_eq!(outcome, BtrOutcome::Done(64));
        assert_eq!(visitor.unsigned, vec![1, 2]);
        assert_eq!(visitor.begins, 1);
        assert_eq!(visitor.ends, 1);
    }

    #[test]
    fn suspends_and_resumes_across_buffer_boundary() {
        let mut btr = BinaryTypeReader::new();
        let mut visitor = Collector::new();
        let ty = u32_field(ByteOrder::BigEndian);
        let full = 0xAABB_CCDDu32.to_be_bytes();

        let outcome = btr.start(ty, &full[..2], 0, 0, &mut visitor).unwrap();
        assert_eq!(outcome, BtrOutcome::Suspended(16));
        assert!(visitor.unsigned.is_empty());

        let outcome = btr.continue_(&full[2..], &mut visitor).unwrap();
        assert_eq!(outcome, BtrOutcome::Done(16));
        assert_eq!(visitor.unsigned, vec![0xAABB_CCDD]);
    }

    #[test]
    fn rejects_zero_width_integer() {
        let mut btr = BinaryTypeReader::new();
        let mut visitor = Collector::new();
        let ty = Arc::new(FieldType::Int(IntFieldType::new(false, 0, ByteOrder::BigEndian, 8)));
        let buf = [0u8; 4];
        let err = btr.start(ty, &buf, 0, 0, &mut visitor).unwrap_err();
        assert!(matches!(err, Error::CorruptTrace(_)));
    }
}
