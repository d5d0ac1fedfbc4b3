//! Canonical encoding and content hashing for ogx records.
//!
//! The content id of a record is a domain-separated BLAKE3 digest over a
//! canonical byte encoding of its type tag and (post-detachment) attribute
//! payload. Two nodes with the same tag and the same canonical payload always
//! produce the same id, which is the deduplication and addressing key for
//! the whole system.

pub mod canonical;
pub mod hasher;

pub use canonical::{canonical_bytes, cycle_digest, cycle_member_id, cycle_slot_id, record_id};
pub use hasher::{ContentHasher, HasherError};
