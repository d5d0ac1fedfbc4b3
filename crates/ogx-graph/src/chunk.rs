//! Splitting oversized ordered sequences into secondary chunk nodes.
//!
//! A chunk-flagged attribute never ships its sequence inline: the sequence
//! is cut into consecutive slices of at most `chunk_size` elements, each
//! wrapped in a lightweight `DataChunk` node, and the attribute's wire value
//! becomes an ordered list of references to those chunks. Reassembly
//! concatenates chunk payloads in list order.

use crate::container::{NodeRef, Value};

/// Chunk size applied when a chunk directive does not specify one.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Type tag of the secondary records holding sequence slices.
pub const CHUNK_TYPE_TAG: &str = "DataChunk";

/// The single attribute of a chunk node.
pub const CHUNK_DATA_ATTRIBUTE: &str = "data";

/// Splits ordered sequences into `DataChunk` nodes.
#[derive(Clone, Copy, Debug)]
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    /// Create a chunker with the given slice size. Directive parsing and the
    /// shape builder both reject zero, so a positive size is an input
    /// invariant here.
    pub fn new(chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0);
        Self { chunk_size }
    }

    /// The slice size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Cut `values` into consecutive `DataChunk` nodes, in original order.
    ///
    /// An empty sequence produces no chunks.
    pub fn split(&self, values: &[Value]) -> Vec<NodeRef> {
        values
            .chunks(self.chunk_size)
            .map(|slice| {
                let chunk = NodeRef::untyped(CHUNK_TYPE_TAG);
                chunk
                    .set(CHUNK_DATA_ATTRIBUTE, Value::List(slice.to_vec()))
                    .expect("chunk attribute name is valid");
                chunk
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(n: i64) -> Vec<Value> {
        (0..n).map(Value::Int).collect()
    }

    fn data_len(chunk: &NodeRef) -> usize {
        match chunk.get(CHUNK_DATA_ATTRIBUTE) {
            Some(Value::List(items)) => items.len(),
            other => panic!("chunk payload should be a list, got {other:?}"),
        }
    }

    #[test]
    fn splits_250_by_100_into_3_chunks() {
        let chunks = Chunker::new(100).split(&sequence(250));
        assert_eq!(chunks.len(), 3);
        assert_eq!(data_len(&chunks[0]), 100);
        assert_eq!(data_len(&chunks[1]), 100);
        assert_eq!(data_len(&chunks[2]), 50);
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let chunks = Chunker::new(50).split(&sequence(100));
        assert_eq!(chunks.len(), 2);
        assert_eq!(data_len(&chunks[0]), 50);
        assert_eq!(data_len(&chunks[1]), 50);
    }

    #[test]
    fn short_sequence_is_a_single_chunk() {
        let chunks = Chunker::new(1000).split(&sequence(3));
        assert_eq!(chunks.len(), 1);
        assert_eq!(data_len(&chunks[0]), 3);
    }

    #[test]
    fn empty_sequence_produces_no_chunks() {
        let chunks = Chunker::default().split(&[]);
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunks_carry_the_chunk_type_tag() {
        let chunks = Chunker::new(10).split(&sequence(5));
        assert_eq!(chunks[0].type_tag(), CHUNK_TYPE_TAG);
    }

    #[test]
    fn order_is_preserved() {
        let chunks = Chunker::new(2).split(&sequence(5));
        let mut flattened = Vec::new();
        for chunk in &chunks {
            match chunk.get(CHUNK_DATA_ATTRIBUTE) {
                Some(Value::List(items)) => flattened.extend(items),
                _ => unreachable!(),
            }
        }
        assert_eq!(flattened, sequence(5));
    }
}
