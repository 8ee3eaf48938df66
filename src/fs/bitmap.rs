use bitvec::prelude::*;
use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use super::{BlockDevice, BlockPtr, FsError, Result, BITMAP_WORDS, BLOCK_SIZE};

/// free/used state of every data block, one bit per block
///
/// words are scanned in index order and bits least-significant first,
/// so block `n` lives in bit `n % 32` of word `n / 32`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBitmap {
    data_bitmap: BitVec<u32, Lsb0>,
    total_blocks: u32,
    free_blocks: u32,
}

/// for serialize and deserialize
impl BlockBitmap {
    /// serialize into a full block of little-endian words
    pub fn serialize(&self) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE];
        LittleEndian::write_u32_into(self.data_bitmap.as_raw_slice(), &mut block);
        block
    }

    pub fn deserialize(block: &[u8], total_blocks: u32) -> Self {
        let mut words = vec![0u32; BITMAP_WORDS];
        LittleEndian::read_u32_into(&block[..BITMAP_WORDS * 4], &mut words);
        Self::from_words(words, total_blocks)
    }

    /// write the whole bitmap as one block to `location`
    pub fn flush<D>(&self, device: &mut D, location: u32) -> Result<()>
    where
        D: BlockDevice,
    {
        device.write_blocks(location, 1, &self.serialize())
    }
}

impl BlockBitmap {
    /// a bitmap with every block free
    pub fn new(total_blocks: u32) -> Self {
        Self::from_words(vec![0u32; BITMAP_WORDS], total_blocks)
    }

    /// restore a bitmap, recounting its free blocks
    pub fn from_words(words: Vec<u32>, total_blocks: u32) -> Self {
        let data_bitmap = BitVec::<u32, Lsb0>::from_vec(words);
        let used = data_bitmap[..total_blocks as usize].count_ones() as u32;
        Self {
            data_bitmap,
            total_blocks,
            free_blocks: total_blocks - used,
        }
    }

    #[inline]
    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    #[inline]
    pub fn free_blocks(&self) -> u32 {
        self.free_blocks
    }

    /// check if data block is owned by some file
    pub fn is_used(&self, block: BlockPtr) -> bool {
        (block as u32) < self.total_blocks && self.data_bitmap[block as usize]
    }
}

/// for data block allocation
impl BlockBitmap {
    /// allocate `n` free blocks, all or nothing
    ///
    /// # Return
    /// the allocated blocks in ascending order,
    /// or [FsError::DiskFull] with the bitmap untouched
    pub fn allocate(&mut self, n: usize) -> Result<Vec<BlockPtr>> {
        if n == 0 || n > self.free_blocks as usize {
            return Err(FsError::DiskFull {
                requested: n,
                free: self.free_blocks as usize,
            });
        }
        let mut working_copy = self.data_bitmap.clone();
        let mut blocks = Vec::with_capacity(n);
        for index in self.data_bitmap[..self.total_blocks as usize].iter_zeros() {
            working_copy.set(index, true);
            blocks.push(index as BlockPtr);
            if blocks.len() == n {
                break;
            }
        }
        if blocks.len() < n {
            // the free count lied, keep the bitmap as it was
            return Err(FsError::DiskFull {
                requested: n,
                free: blocks.len(),
            });
        }
        self.data_bitmap = working_copy;
        self.free_blocks -= n as u32;
        debug!("allocated {n} blocks starting at {}", blocks[0]);
        Ok(blocks)
    }

    pub fn allocate_one(&mut self) -> Result<BlockPtr> {
        Ok(self.allocate(1)?[0])
    }

    /// release data block
    pub fn free(&mut self, block: BlockPtr) -> Result<()> {
        if !self.is_used(block) {
            return Err(FsError::DoubleFree(block));
        }
        self.data_bitmap.set(block as usize, false);
        self.free_blocks += 1;
        Ok(())
    }
}
