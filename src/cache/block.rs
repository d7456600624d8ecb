//! Block identifiers and cached block payloads.
//!
//! A resource is sliced into fixed-size blocks of `1 << block_size_shift`
//! bytes. Blocks are the unit of caching, pinning and eviction.

use bytes::Bytes;

/// Index of a block within one resource. Byte offset is `id << block_size_shift`.
pub type BlockId = i64;

/// Byte offset of the first byte of `block`.
pub fn block_offset(block: BlockId, block_size_shift: u32) -> i64 {
    block << block_size_shift
}

/// Block containing byte `offset`.
pub fn block_for_offset(offset: i64, block_size_shift: u32) -> BlockId {
    offset >> block_size_shift
}

/// A cached block.
///
/// The payload is reference counted, so a block handed to a reader stays valid
/// after the cache has evicted its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Bytes,
    end_of_stream: bool,
}

impl Block {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            end_of_stream: false,
        }
    }

    /// Empty marker block delivered after the last block of the resource.
    pub fn end_of_stream() -> Self {
        Self {
            data: Bytes::new(),
            end_of_stream: true,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_offsets() {
        assert_eq!(block_offset(3, 12), 3 * 4096);
        assert_eq!(block_for_offset(4095, 12), 0);
        assert_eq!(block_for_offset(4096, 12), 1);
    }

    #[test]
    fn test_end_of_stream_block() {
        let eos = Block::end_of_stream();
        assert!(eos.is_end_of_stream());
        assert!(eos.is_empty());

        let block = Block::new(vec![1u8, 2, 3]);
        assert!(!block.is_end_of_stream());
        assert_eq!(block.len(), 3);
        assert_eq!(block.clone().data(), &Bytes::from_static(&[1, 2, 3]));
    }
}
