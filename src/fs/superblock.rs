use bincode::{config, Decode, Encode};

use super::{
    FsError, InodeId, Result, BLOCK_SIZE, FS_MAGIC, INODES_PER_BLOCK, MAX_DATA_BLOCKS,
    MAX_INODE_BLOCKS, ROOT_INODE,
};

/// the size of a new volume, in blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// blocks in the data region
    pub total_blocks: u32,
    /// blocks reserved for the inode table
    pub inode_blocks: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            total_blocks: MAX_DATA_BLOCKS,
            inode_blocks: MAX_INODE_BLOCKS,
        }
    }
}

impl Geometry {
    pub fn new(total_blocks: u32, inode_blocks: u32) -> Self {
        Self {
            total_blocks,
            inode_blocks,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_blocks == 0 || self.total_blocks > MAX_DATA_BLOCKS {
            return Err(FsError::InvalidArgument(
                "data block count must be between 1 and the maximum volume size",
            ));
        }
        if self.inode_blocks == 0 || self.inode_blocks > MAX_INODE_BLOCKS {
            return Err(FsError::InvalidArgument(
                "inode table must take between 1 and 81 blocks",
            ));
        }
        Ok(())
    }

    /// blocks the whole device needs: superblock, inode table, bitmap and data
    pub fn device_blocks(&self) -> u32 {
        1 + self.inode_blocks + 1 + self.total_blocks
    }
}

/// The superblock of this filesystem, stored in block 0
///
/// every field is a little-endian `u32`, the rest of the block is zero padding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct SuperBlock {
    /// magic number
    pub magic: u32,
    pub block_size: u32,
    /// data block count
    pub total_blocks: u32,
    /// inode table size in blocks
    pub inode_blocks: u32,
    pub root_inode: u32,
}

impl SuperBlock {
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            magic: FS_MAGIC,
            block_size: BLOCK_SIZE as u32,
            total_blocks: geometry.total_blocks,
            inode_blocks: geometry.inode_blocks,
            root_inode: ROOT_INODE as u32,
        }
    }

    /// serialize into a full block
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut block = vec![0u8; BLOCK_SIZE];
        bincode::encode_into_slice(self, &mut block, config::legacy())
            .map_err(|e| FsError::InvalidSuperblock(e.to_string()))?;
        Ok(block)
    }

    pub fn deserialize(block: &[u8]) -> Result<Self> {
        let (superblock, _bytes_read): (Self, usize) =
            bincode::decode_from_slice(block, config::legacy())
                .map_err(|e| FsError::InvalidSuperblock(e.to_string()))?;
        Ok(superblock)
    }

    /// check the header against the limits compiled into this filesystem
    pub fn validate(&self) -> Result<()> {
        if self.magic != FS_MAGIC {
            return Err(FsError::InvalidSuperblock(format!(
                "bad magic number {:#x}",
                self.magic
            )));
        }
        if self.block_size as usize != BLOCK_SIZE {
            return Err(FsError::InvalidSuperblock(format!(
                "block size {} is not supported",
                self.block_size
            )));
        }
        if self.total_blocks == 0 || self.total_blocks > MAX_DATA_BLOCKS {
            return Err(FsError::InvalidSuperblock(format!(
                "data block count {} out of range",
                self.total_blocks
            )));
        }
        if self.inode_blocks == 0 || self.inode_blocks > MAX_INODE_BLOCKS {
            return Err(FsError::InvalidSuperblock(format!(
                "inode table size {} out of range",
                self.inode_blocks
            )));
        }
        if self.root_inode as usize >= self.inode_count() {
            return Err(FsError::InvalidSuperblock(format!(
                "root inode {} out of range",
                self.root_inode
            )));
        }
        Ok(())
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.total_blocks, self.inode_blocks)
    }

    pub fn inode_count(&self) -> usize {
        self.inode_blocks as usize * INODES_PER_BLOCK
    }

    pub fn root(&self) -> InodeId {
        self.root_inode as InodeId
    }

    #[inline]
    pub fn inode_table_block(&self) -> u32 {
        1
    }

    #[inline]
    pub fn bitmap_block(&self) -> u32 {
        1 + self.inode_blocks
    }

    #[inline]
    pub fn first_data_block(&self) -> u32 {
        self.bitmap_block() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superblock_layout() {
        let superblock = SuperBlock::new(&Geometry::new(64, 4));
        let block = superblock.serialize().unwrap();
        assert_eq!(block.len(), BLOCK_SIZE);
        assert_eq!(&block[0..4], &FS_MAGIC.to_le_bytes());
        assert_eq!(&block[4..8], &(BLOCK_SIZE as u32).to_le_bytes());
        assert_eq!(&block[8..12], &64u32.to_le_bytes());
        assert_eq!(&block[12..16], &4u32.to_le_bytes());
        assert_eq!(&block[16..20], &0u32.to_le_bytes());
        assert!(block[20..].iter().all(|b| *b == 0));

        assert_eq!(SuperBlock::deserialize(&block).unwrap(), superblock);
    }

    #[test]
    fn test_superblock_regions() {
        let superblock = SuperBlock::new(&Geometry::new(64, 4));
        assert_eq!(superblock.inode_table_block(), 1);
        assert_eq!(superblock.bitmap_block(), 5);
        assert_eq!(superblock.first_data_block(), 6);
        assert_eq!(superblock.inode_count(), 16);
        assert_eq!(superblock.geometry().device_blocks(), 70);
    }

    #[test]
    fn test_superblock_validation() {
        let good = SuperBlock::new(&Geometry::default());
        assert!(good.validate().is_ok());

        let bad_magic = SuperBlock { magic: 0, ..good };
        assert!(matches!(
            bad_magic.validate(),
            Err(FsError::InvalidSuperblock(_))
        ));
        let bad_block_size = SuperBlock {
            block_size: 512,
            ..good
        };
        assert!(bad_block_size.validate().is_err());
        let too_big = SuperBlock {
            total_blocks: MAX_DATA_BLOCKS + 1,
            ..good
        };
        assert!(too_big.validate().is_err());
        let no_inodes = SuperBlock {
            inode_blocks: 0,
            ..good
        };
        assert!(no_inodes.validate().is_err());
        let bad_root = SuperBlock {
            inode_blocks: 1,
            root_inode: 4,
            ..good
        };
        assert!(bad_root.validate().is_err());
    }

    #[test]
    fn test_geometry_validation() {
        assert!(Geometry::default().validate().is_ok());
        assert!(Geometry::new(0, 4).validate().is_err());
        assert!(Geometry::new(64, 0).validate().is_err());
        assert!(Geometry::new(64, MAX_INODE_BLOCKS + 1).validate().is_err());
        assert_eq!(Geometry::default().device_blocks(), crate::MAX_FS_SIZE);
    }
}
