//! what does our filesystem look like on the device and in memory
use log::{debug, info};

use super::{
    BlockBitmap, BlockDevice, BlockPtr, FsError, Geometry, Inode, InodeId, InodeTable, Result,
    SuperBlock, TraversalCache, BLOCK_SIZE,
};

/// One mounted volume: the storage engine every file operation goes through
///
/// it has the following layout:
/// - superblock, block 0
/// - inode table, blocks `1..=inode_blocks`
/// - bitmap, one block
/// - data blocks, addressed relative to the first block after the bitmap
///
/// the bitmap, the inode table and the traversal cache are owned by this
/// instance alone, callers must serialize access to it
#[derive(Debug)]
pub struct Volume<D> {
    device: D,
    superblock: SuperBlock,
    pub(crate) bitmap: BlockBitmap,
    pub(crate) inodes: InodeTable,
    pub(crate) cache: Option<TraversalCache>,
}

impl<D> Volume<D>
where
    D: BlockDevice,
{
    /// create a fresh filesystem on `device`
    /// # Params
    /// - `device`: the block device, something like **/dev/sda1**
    /// - `geometry`: data region and inode table sizes
    /// # Return
    /// the mounted volume, holding an empty root inode
    pub fn format(mut device: D, geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        check_device(&device, &geometry)?;

        let superblock = SuperBlock::new(&geometry);
        device.write_blocks(0, 1, &superblock.serialize()?)?;

        let mut inodes = InodeTable::new(geometry.inode_blocks);
        let root = inodes.allocate_inode()?;
        debug_assert_eq!(root, superblock.root());
        device.write_blocks(
            superblock.inode_table_block(),
            geometry.inode_blocks,
            &inodes.serialize()?,
        )?;

        let bitmap = BlockBitmap::new(geometry.total_blocks);
        bitmap.flush(&mut device, superblock.bitmap_block())?;
        device.flush()?;

        info!(
            "formatted volume: {} data blocks, {} inodes",
            geometry.total_blocks,
            inodes.len()
        );
        Ok(Self {
            device,
            superblock,
            bitmap,
            inodes,
            cache: None,
        })
    }

    /// load an existing filesystem from `device`
    ///
    /// the free block count is recomputed from the bitmap
    pub fn mount(device: D) -> Result<Self> {
        let mut block = vec![0u8; BLOCK_SIZE];
        device.read_blocks(0, 1, &mut block)?;
        let superblock = SuperBlock::deserialize(&block)?;
        superblock.validate()?;
        let geometry = superblock.geometry();
        check_device(&device, &geometry)
            .map_err(|_| FsError::InvalidSuperblock("device is smaller than the volume".into()))?;

        let mut table = vec![0u8; geometry.inode_blocks as usize * BLOCK_SIZE];
        device.read_blocks(superblock.inode_table_block(), geometry.inode_blocks, &mut table)?;
        let inodes = InodeTable::deserialize(&table, geometry.inode_blocks)?;
        if inodes.get(superblock.root()).is_err() {
            return Err(FsError::InvalidSuperblock(format!(
                "root inode {} is not in use",
                superblock.root()
            )));
        }

        device.read_blocks(superblock.bitmap_block(), 1, &mut block)?;
        let bitmap = BlockBitmap::deserialize(&block, geometry.total_blocks);

        info!(
            "mounted volume: {} data blocks, {} free",
            geometry.total_blocks,
            bitmap.free_blocks()
        );
        Ok(Self {
            device,
            superblock,
            bitmap,
            inodes,
            cache: None,
        })
    }
}

fn check_device<D>(device: &D, geometry: &Geometry) -> Result<()>
where
    D: BlockDevice,
{
    if device.block_size() != BLOCK_SIZE {
        return Err(FsError::InvalidArgument("device block size is not supported"));
    }
    if device.block_count() < geometry.device_blocks() {
        return Err(FsError::InvalidArgument("device is too small for the volume"));
    }
    Ok(())
}

/// get [SuperBlock], free space and the device of this filesystem
impl<D> Volume<D>
where
    D: BlockDevice,
{
    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub fn free_blocks(&self) -> u32 {
        self.bitmap.free_blocks()
    }

    #[inline]
    pub fn bitmap(&self) -> &BlockBitmap {
        &self.bitmap
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub(crate) fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// unmount, handing the device back
    pub fn into_device(mut self) -> Result<D> {
        self.device.flush()?;
        Ok(self.device)
    }

    /// device block number of a data block
    #[inline]
    pub fn absolute(&self, block: BlockPtr) -> u32 {
        self.superblock.first_data_block() + block as u32
    }
}

/// [Inode] operations
impl<D> Volume<D>
where
    D: BlockDevice,
{
    pub fn inode(&self, id: InodeId) -> Result<&Inode> {
        self.inodes.get(id)
    }

    pub fn file_size(&self, id: InodeId) -> Result<usize> {
        Ok(self.inodes.get(id)?.size as usize)
    }

    /// take a free inode, only in memory until [Volume::update_inode]
    pub fn allocate_inode(&mut self) -> Result<InodeId> {
        let id = self.inodes.allocate_inode()?;
        self.invalidate_cache(id);
        Ok(id)
    }

    /// persist the inode table block holding `id`
    pub fn update_inode(&mut self, id: InodeId) -> Result<()> {
        self.inodes.update(&mut self.device, id)
    }

    /// mark an inode unused and persist it
    ///
    /// its blocks must have been released with [Volume::release_blocks] first
    pub fn release_inode(&mut self, id: InodeId) -> Result<()> {
        self.inodes.release(id)?;
        self.invalidate_cache(id);
        debug!("released inode {id}");
        self.inodes.update(&mut self.device, id)
    }

    pub(crate) fn invalidate_cache(&mut self, id: InodeId) {
        if self.cache.as_ref().is_some_and(|cache| cache.inode == id) {
            self.cache = None;
        }
    }
}

/// data block operations
impl<D> Volume<D>
where
    D: BlockDevice,
{
    /// allocate `n` data blocks, in memory until [Volume::flush_bitmap]
    pub fn allocate_blocks(&mut self, n: usize) -> Result<Vec<BlockPtr>> {
        self.bitmap.allocate(n)
    }

    /// free one data block, in memory until [Volume::flush_bitmap]
    pub fn free_block(&mut self, block: BlockPtr) -> Result<()> {
        self.bitmap.free(block)
    }

    pub fn flush_bitmap(&mut self) -> Result<()> {
        self.bitmap
            .flush(&mut self.device, self.superblock.bitmap_block())
    }
}
