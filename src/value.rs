//! The decoded-value tree: a runtime mirror of [`crate::metadata::FieldType`]
//! populated by [`crate::notif_iter::NotifIter`] as it drives the BTR
//! through one dynamic scope.
//!
//! This replaces the teacher's flat, non-recursive `FieldValue` model
//! (a CTF field type graph is recursive; barectf's fixed stream/event
//! layouts never needed a general tree). Construction of in-memory trace
//! IR beyond this point — the richer, long-lived representation a
//! downstream analysis tool would want — is explicitly out of scope
//! (spec §1); this tree is the minimal shape the core needs in order to
//! resolve `FieldPath`s and hand complete scopes to notifications.

use internment::Intern;
use ordered_float::OrderedFloat;
use std::sync::Arc;

/// One decoded field, of any shape. Compound variants own their children
/// directly; there is no lazy or partial state once a `FieldValue` has
/// been materialized — the BTR only ever calls back with values it has
/// fully decoded.
///
/// `Float` wraps in `OrderedFloat` so the tree as a whole can derive
/// `Eq`/`Hash` (needed once a decoded scope is used as a map/ordering
/// key, e.g. for deduplication); the BTR's own `on_float` callback still
/// hands the visitor a plain `f64` (spec §4.2) since that payload is
/// only ever read, never compared.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldValue {
    UnsignedInt(u64),
    SignedInt(i64),
    Float(OrderedFloat<f64>),
    String(Vec<u8>),
    Struct(Vec<(Intern<String>, FieldValue)>),
    Array(Vec<FieldValue>),
    Sequence(Vec<FieldValue>),
    /// A decoded variant: the label of the option that was selected and
    /// its decoded value.
    Variant(Intern<String>, Box<FieldValue>),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UnsignedInt(v) => Some(*v),
            FieldValue::Variant(_, inner) => inner.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(v.0),
            FieldValue::Variant(_, inner) => inner.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::SignedInt(v) => Some(*v),
            FieldValue::Variant(_, inner) => inner.as_i64(),
            _ => None,
        }
    }

    /// Treats this value as an integer regardless of signedness,
    /// matching the spec's "its value (integer, possibly the container
    /// of an enumeration)" phrasing for stream/event id resolution.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            FieldValue::UnsignedInt(v) => Some(*v as i128),
            FieldValue::SignedInt(v) => Some(*v as i128),
            FieldValue::Variant(_, inner) => inner.as_integer(),
            _ => None,
        }
    }

    /// Looks up a named member of a struct value, delegating through a
    /// variant to its selected field — `v.member("id")` on a
    /// `stream.event.header` whose `v` field is a variant reaches into
    /// whichever option was selected, matching the CTF-1.8 `v.id` idiom.
    pub fn member(&self, name: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Struct(members) => members
                .iter()
                .find_map(|(n, v)| (n.as_str() == name).then_some(v)),
            FieldValue::Variant(_, inner) => inner.member(name),
            _ => None,
        }
    }

    /// Indexes a struct value by position, or a variant's sole "virtual"
    /// child at index 0, matching how a `FieldPath` addresses either.
    pub fn index(&self, i: usize) -> Option<&FieldValue> {
        match self {
            FieldValue::Struct(members) => members.get(i).map(|(_, v)| v),
            FieldValue::Variant(_, inner) if i == 0 => Some(inner),
            FieldValue::Array(items) | FieldValue::Sequence(items) => items.get(i),
            _ => None,
        }
    }
}

/// The fully decoded contents of a single dynamic scope, plus the field
/// type it was decoded against — kept together so a notification can
/// still answer "what type is this" without re-threading the metadata
/// graph.
#[derive(Clone, Debug)]
pub struct ScopeValue {
    pub field_type: Arc<crate::metadata::FieldType>,
    pub value: FieldValue,
}
