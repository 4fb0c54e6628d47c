//! N-way ordered merge of notification streams, enforcing inter-stream
//! clock compatibility.
//!
//! Grounded on `src/plugins/utils/muxer/msg-iter.cpp`'s `_next` loop
//! (reload / replace-top / to-reload-set transitions) and
//! `cpp-common/bt2c/prio-heap.hpp`, reworked onto `std::collections::
//! BinaryHeap` with a `Reverse`-keyed ordering instead of a hand-rolled
//! heap, and onto a `Vec` "to-reload" set instead of a `GQueue`.

use crate::error::Error;
use crate::metadata::{ClockClass, ClockOrigin};
use crate::notification::Notification;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::trace;

/// One upstream source of notifications: anything that can be pulled
/// from one at a time. Implemented by [`crate::notif_iter::NotifIter`]
/// over any [`crate::medium::Medium`]; boxed here so the muxer can hold
/// a heterogeneous set of upstreams.
pub trait Upstream {
    fn next(&mut self) -> Result<UpstreamStep, Error>;
}

pub enum UpstreamStep {
    Ready(Notification),
    Again,
    Ended,
}

impl<M: crate::medium::Medium> Upstream for crate::notif_iter::NotifIter<M> {
    fn next(&mut self) -> Result<UpstreamStep, Error> {
        use crate::notif_iter::NotifIterStep;
        match NotifIter::next(self)? {
            NotifIterStep::Ready(n) => Ok(UpstreamStep::Ready(n)),
            NotifIterStep::Again => Ok(UpstreamStep::Again),
            NotifIterStep::Ended => Ok(UpstreamStep::Ended),
        }
    }
}

use crate::notif_iter::NotifIter;

/// The muxer's running expectation for every subsequent upstream's
/// clock class, fixed by the first `StreamBeginning` / clock-bearing
/// message it ever processes (spec §4.4, "Clock compatibility
/// enforcement").
#[derive(Clone, Debug)]
enum ClockExpectation {
    NoClock,
    UnixEpoch,
    NonUnixWithUuid(uuid::Uuid),
    /// Compared by instance identity, not structural equality — this is
    /// the one case the table requires "the exact same clock-class
    /// instance".
    NonUnixExactInstance(Arc<ClockClass>),
}

impl ClockExpectation {
    fn from_clock(clock: Option<&Arc<ClockClass>>) -> Self {
        match clock {
            None => ClockExpectation::NoClock,
            Some(cc) => match &cc.origin {
                ClockOrigin::UnixEpoch => ClockExpectation::UnixEpoch,
                ClockOrigin::Other { uuid: Some(u) } => ClockExpectation::NonUnixWithUuid(*u),
                ClockOrigin::Other { uuid: None } => ClockExpectation::NonUnixExactInstance(cc.clone()),
            },
        }
    }

    fn check(&self, clock: Option<&Arc<ClockClass>>) -> Result<(), Error> {
        let incoming = Self::from_clock(clock);
        let ok = match (self, &incoming) {
            (ClockExpectation::NoClock, ClockExpectation::NoClock) => true,
            (ClockExpectation::UnixEpoch, ClockExpectation::UnixEpoch) => true,
            (ClockExpectation::NonUnixWithUuid(a), ClockExpectation::NonUnixWithUuid(b)) => a == b,
            (ClockExpectation::NonUnixExactInstance(a), ClockExpectation::NonUnixExactInstance(b)) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::corrupt(format!(
                "clock class incompatible with stream: expected {:?}, got {:?}",
                self, incoming
            )))
        }
    }
}

/// One entry in the muxer's heap: the upstream's current head
/// notification, its timestamp (if any), and the index identifying
/// which upstream produced it.
struct HeapEntry {
    upstream_index: usize,
    timestamp_ns: Option<u128>,
    message_type_rank: u8,
    stream_class_id: u64,
    stream_id: u64,
    event_class_id: u64,
}

/// Total order used by the heap: smaller `Ord` sorts first, i.e. oldest.
/// A notification with no timestamp sorts before any timestamped one
/// from the same comparison (spec §4.4, tie-break rule 1); ties proceed
/// to the `(message_type_rank, stream_class_id, stream_id,
/// event_class_id)` tuple (rule 2).
impl HeapEntry {
    fn sort_key(&self) -> (u8, Option<u128>, u8, u64, u64, u64) {
        let has_ts = if self.timestamp_ns.is_some() { 1 } else { 0 };
        (
            has_ts,
            self.timestamp_ns,
            self.message_type_rank,
            self.stream_class_id,
            self.stream_id,
            self.event_class_id,
        )
    }
}

impl Eq for HeapEntry {}
impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Merges N upstream notification sources into one globally ordered
/// stream (spec §4.4).
pub struct Muxer<'a> {
    upstreams: Vec<Box<dyn Upstream + 'a>>,
    /// Max-heap keyed by `Reverse(sort_key)` so the root is the oldest
    /// pending notification (spec: "a binary max-heap keyed by
    /// −timestamp").
    heap: BinaryHeap<Reverse<HeapEntry>>,
    /// Upstreams that returned `Again` and must be retried before the
    /// heap is considered complete.
    to_reload: Vec<usize>,
    /// The head notification currently parked for each upstream index,
    /// taken out of the heap entry (which only carries the sort key)
    /// so it can be handed to the caller on emission.
    pending: Vec<Option<Notification>>,
    clock_expectation: Option<ClockExpectation>,
    ended: Vec<bool>,
}

impl<'a> Muxer<'a> {
    pub fn new(upstreams: Vec<Box<dyn Upstream + 'a>>) -> Self {
        let n = upstreams.len();
        Self {
            upstreams,
            heap: BinaryHeap::new(),
            to_reload: (0..n).collect(),
            pending: (0..n).map(|_| None).collect(),
            clock_expectation: None,
            ended: vec![false; n],
        }
    }

    /// Produces the globally next notification, or `Again` if at least
    /// one not-yet-ended upstream needs retrying, or `Ended` once every
    /// upstream has ended.
    pub fn next(&mut self) -> Result<UpstreamStep, Error> {
        self.ensure_full_heap()?;

        if self.heap.is_empty() {
            if self.ended.iter().all(|&e| e) {
                return Ok(UpstreamStep::Ended);
            }
            return Ok(UpstreamStep::Again);
        }

        let Reverse(top) = self.heap.pop().expect("heap non-empty, just checked");
        let idx = top.upstream_index;
        let notif = self.pending[idx].take().expect("heap entry always has a parked notification");

        self.validate_clock_compatibility(&notif)?;

        // Replace-top: a single reload of the emitting upstream, not a
        // full rebuild (spec §4.4, "Data structure").
        trace!(upstream_index = idx, "Replacing heap top");
        self.reload(idx)?;

        Ok(UpstreamStep::Ready(notif))
    }

    fn ensure_full_heap(&mut self) -> Result<(), Error> {
        let to_reload = std::mem::take(&mut self.to_reload);
        for idx in to_reload {
            self.reload(idx)?;
        }
        Ok(())
    }

    fn reload(&mut self, idx: usize) -> Result<(), Error> {
        if self.ended[idx] {
            return Ok(());
        }
        match self.upstreams[idx].next()? {
            UpstreamStep::Ready(notif) => {
                let entry = HeapEntry {
                    upstream_index: idx,
                    timestamp_ns: notif.timestamp_ns(),
                    message_type_rank: notif.message_type_rank(),
                    // This core resolves a packet's stream class id directly
                    // from its `stream_id` field (spec §4.3) rather than
                    // distinguishing a data stream instance id from its
                    // class id, so the two tie-break columns coincide here.
                    stream_class_id: notif.stream_id().unwrap_or(0),
                    stream_id: notif.stream_id().unwrap_or(0),
                    event_class_id: notif.event_class_id().unwrap_or(0),
                };
                trace!(upstream_index = idx, timestamp_ns = ?entry.timestamp_ns, "Reloaded upstream onto heap");
                self.pending[idx] = Some(notif);
                self.heap.push(Reverse(entry));
            }
            UpstreamStep::Again => {
                trace!(upstream_index = idx, "Upstream not ready, queued for reload");
                self.to_reload.push(idx);
            }
            UpstreamStep::Ended => {
                trace!(upstream_index = idx, "Upstream ended");
                self.ended[idx] = true;
            }
        }
        Ok(())
    }

    fn validate_clock_compatibility(&mut self, notif: &Notification) -> Result<(), Error> {
        let clock = match notif {
            Notification::StreamBeginning { clock_class, .. } => clock_class.as_ref(),
            Notification::MsgIterInactivity { clock_class, .. } => Some(clock_class),
            _ => return Ok(()),
        };
        match &self.clock_expectation {
            None => {
                self.clock_expectation = Some(ClockExpectation::from_clock(clock));
                Ok(())
            }
            Some(expectation) => expectation.check(clock),
        }
    }

    /// Seeks every upstream to the beginning of its stream, all or
    /// nothing (spec §4.4, "Seek-begin"). On any failure the muxer's
    /// state must be considered undefined; callers should discard and
    /// rebuild it rather than continue.
    pub fn seek_to_beginning(&mut self, seek: impl Fn(&mut dyn Upstream) -> Result<(), Error>) -> Result<(), Error> {
        for upstream in &mut self.upstreams {
            seek(upstream.as_mut())?;
        }
        self.heap.clear();
        self.pending.iter_mut().for_each(|p| *p = None);
        self.to_reload = (0..self.upstreams.len()).collect();
        self.ended.iter_mut().for_each(|e| *e = false);
        self.clock_expectation = None;
        Ok(())
    }
}
