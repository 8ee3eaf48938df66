//! indirect blocks and the traversal cache used to walk them
use byteorder::{ByteOrder, LittleEndian};

use super::{
    inode::{decode_pointer, encode_pointer},
    BlockPtr, InodeId, BLOCK_SIZE, INDIRECT_DATA_POINTERS, POINTERS_PER_BLOCK,
};

/// A block of pointers extending an inode past its direct pointers
///
/// the first [INDIRECT_DATA_POINTERS] slots point at data blocks,
/// the last slot links to the next indirect block of the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerBlock {
    slots: Vec<Option<BlockPtr>>,
}

impl Default for PointerBlock {
    fn default() -> Self {
        Self::empty()
    }
}

impl PointerBlock {
    /// every slot free, including the link
    pub fn empty() -> Self {
        Self {
            slots: vec![None; POINTERS_PER_BLOCK],
        }
    }

    pub fn deserialize(block: &[u8]) -> Self {
        let mut raw = [0i16; POINTERS_PER_BLOCK];
        LittleEndian::read_i16_into(&block[..BLOCK_SIZE], &mut raw);
        Self {
            slots: raw.into_iter().map(decode_pointer).collect(),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let raw = self
            .slots
            .iter()
            .map(|slot| encode_pointer(*slot))
            .collect::<Vec<_>>();
        let mut block = vec![0u8; BLOCK_SIZE];
        LittleEndian::write_i16_into(&raw, &mut block);
        block
    }

    #[inline]
    pub fn data(&self, slot: usize) -> Option<BlockPtr> {
        debug_assert!(slot < INDIRECT_DATA_POINTERS);
        self.slots[slot]
    }

    #[inline]
    pub fn set_data(&mut self, slot: usize, block: Option<BlockPtr>) {
        debug_assert!(slot < INDIRECT_DATA_POINTERS);
        self.slots[slot] = block;
    }

    /// the next indirect block of the chain
    #[inline]
    pub fn link(&self) -> Option<BlockPtr> {
        self.slots[INDIRECT_DATA_POINTERS]
    }

    #[inline]
    pub fn set_link(&mut self, block: Option<BlockPtr>) {
        self.slots[INDIRECT_DATA_POINTERS] = block;
    }
}

/// the indirect block visited last, so that sequential access
/// doesn't walk the chain from its head every time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalCache {
    pub inode: InodeId,
    /// logical index mapped by the first slot of `pointers`
    pub base: usize,
    /// where `pointers` lives, relative to the data region
    pub block: BlockPtr,
    pub pointers: PointerBlock,
}

impl TraversalCache {
    /// check if the walk to `index` of `inode` can resume from here
    #[inline]
    pub fn covers(&self, inode: InodeId, index: usize) -> bool {
        self.inode == inode && index >= self.base
    }
}
