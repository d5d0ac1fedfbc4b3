//! Canonical byte encoding of record payloads.
//!
//! The canonical form is JSON with attribute names in sorted order (the
//! payload map is a `BTreeMap`, so ordering is structural, not a
//! serialization option). Floating-point values are encoded as the shortest
//! decimal that round-trips the exact `f64` (serde_json/ryu), so equal
//! values hash identically regardless of how they were produced. Non-finite
//! floats and negative zero never reach this layer: the decomposer rejects
//! the former and normalizes the latter.

use std::collections::BTreeMap;

use serde::Serialize;

use ogx_types::{ObjectId, WireValue};

use crate::hasher::{ContentHasher, HasherError};

/// The hashed portion of a record: everything except `id` and
/// `totalChildCount`, which are derived.
#[derive(Serialize)]
struct CanonicalPayload<'a> {
    #[serde(rename = "typeTag")]
    type_tag: &'a str,
    attributes: &'a BTreeMap<String, WireValue>,
}

/// Encode a record payload to its canonical bytes.
pub fn canonical_bytes(
    type_tag: &str,
    attributes: &BTreeMap<String, WireValue>,
) -> Result<Vec<u8>, HasherError> {
    serde_json::to_vec(&CanonicalPayload {
        type_tag,
        attributes,
    })
    .map_err(|e| HasherError::Encoding(e.to_string()))
}

/// Compute the content id of a record payload.
pub fn record_id(
    type_tag: &str,
    attributes: &BTreeMap<String, WireValue>,
) -> Result<ObjectId, HasherError> {
    Ok(ContentHasher::RECORD.hash(&canonical_bytes(type_tag, attributes)?))
}

/// The placeholder id standing in for the `slot`-th member of a cycle while
/// the cycle's canonical form is computed.
///
/// Members of a detachable cycle cannot carry pure content ids (each id
/// would depend on itself through the cycle), so their canonical forms are
/// computed with intra-cycle references replaced by these fixed,
/// domain-separated slot placeholders.
pub fn cycle_slot_id(slot: u64) -> ObjectId {
    ContentHasher::CYCLE_SLOT.hash(&slot.to_le_bytes())
}

/// Compute the canonical digest of a whole cycle.
///
/// `members` holds each member's type tag and canonical attributes, in slot
/// order, with intra-cycle references already replaced by
/// [`cycle_slot_id`] placeholders. Equal cycles produce equal digests;
/// any difference in member content, count, or order changes the digest.
pub fn cycle_digest(
    members: &[(&str, &BTreeMap<String, WireValue>)],
) -> Result<ObjectId, HasherError> {
    let payloads: Vec<CanonicalPayload<'_>> = members
        .iter()
        .map(|(type_tag, attributes)| CanonicalPayload {
            type_tag,
            attributes,
        })
        .collect();
    let bytes = serde_json::to_vec(&payloads).map_err(|e| HasherError::Encoding(e.to_string()))?;
    Ok(ContentHasher::CYCLE.hash(&bytes))
}

/// Derive the content id of the `slot`-th member of a cycle from the
/// cycle's digest.
pub fn cycle_member_id(digest: &ObjectId, slot: u64) -> ObjectId {
    let mut data = Vec::with_capacity(40);
    data.extend_from_slice(digest.as_bytes());
    data.extend_from_slice(&slot.to_le_bytes());
    ContentHasher::CYCLE.hash(&data)
}
