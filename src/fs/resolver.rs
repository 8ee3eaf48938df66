//! map a file's logical block index to a device block, and grow its chain
use log::{debug, warn};

use super::{
    BlockDevice, BlockPtr, FsError, InodeId, PointerBlock, Result, TraversalCache, Volume,
    BLOCK_SIZE, DIRECT_POINTERS, INDIRECT_DATA_POINTERS,
};

impl<D> Volume<D>
where
    D: BlockDevice,
{
    /// find the device block holding logical block `index` of inode `id`
    ///
    /// walks the direct pointers, then the chain of indirect blocks.
    /// the walk resumes from the last visited indirect block when it can,
    /// so reading a file front to back costs one chain read per indirect block
    pub fn resolve(&mut self, id: InodeId, index: usize) -> Result<u32> {
        let block = self.resolve_pointer(id, index)?;
        Ok(self.absolute(block))
    }

    /// like [Volume::resolve], relative to the data region
    pub(crate) fn resolve_pointer(&mut self, id: InodeId, index: usize) -> Result<BlockPtr> {
        let not_found = FsError::BlockNotFound { inode: id, index };
        let inode = self.inodes.get(id)?;
        if index < DIRECT_POINTERS {
            return inode.direct_blocks[index].ok_or(not_found);
        }
        let first_indirect = inode.indirect_block;

        let mut cursor = match self.cache.take() {
            Some(cache) if cache.covers(id, index) => cache,
            _ => {
                let Some(block) = first_indirect else {
                    return Err(not_found);
                };
                TraversalCache {
                    inode: id,
                    base: DIRECT_POINTERS,
                    block,
                    pointers: self.read_pointer_block(block)?,
                }
            }
        };
        while index - cursor.base >= INDIRECT_DATA_POINTERS {
            let Some(next) = cursor.pointers.link() else {
                return Err(not_found);
            };
            cursor = TraversalCache {
                inode: id,
                base: cursor.base + INDIRECT_DATA_POINTERS,
                block: next,
                pointers: self.read_pointer_block(next)?,
            };
        }

        let pointer = cursor.pointers.data(index - cursor.base);
        self.cache = Some(cursor);
        pointer.ok_or(not_found)
    }

    /// link freshly allocated data blocks after the live blocks of inode `id`
    ///
    /// direct pointers are filled first, then the chain of indirect blocks,
    /// which grows by one newly allocated block whenever the tail fills up.
    /// every indirect block and inode record is written as soon as it is complete.
    ///
    /// a failure part way leaves whatever was linked so far in place
    pub fn append_blocks(&mut self, id: InodeId, new_blocks: &[BlockPtr]) -> Result<()> {
        if new_blocks.is_empty() {
            return Err(FsError::InvalidArgument("no blocks to append"));
        }
        let live = self.inodes.get(id)?.block_count();
        debug!(
            "appending {} blocks to inode {id} after {live} live blocks",
            new_blocks.len()
        );
        let mut pending = new_blocks.iter().copied();

        let mut tail = if live <= DIRECT_POINTERS {
            let inode = self.inodes.get_mut(id)?;
            for slot in inode.direct_blocks[live..].iter_mut() {
                match pending.next() {
                    Some(block) => *slot = Some(block),
                    None => break,
                }
            }
            if pending.len() == 0 {
                return self.update_inode(id);
            }
            let first = self.new_pointer_block()?;
            self.inodes.get_mut(id)?.indirect_block = Some(first);
            self.update_inode(id)?;
            TraversalCache {
                inode: id,
                base: DIRECT_POINTERS,
                block: first,
                pointers: PointerBlock::empty(),
            }
        } else {
            // load the indirect block holding the last live pointer
            self.resolve_pointer(id, live - 1)?;
            self.cache.take().ok_or(FsError::BlockNotFound {
                inode: id,
                index: live - 1,
            })?
        };

        let mut next_index = live.max(DIRECT_POINTERS);
        loop {
            while next_index - tail.base < INDIRECT_DATA_POINTERS {
                let Some(block) = pending.next() else {
                    break;
                };
                tail.pointers.set_data(next_index - tail.base, Some(block));
                next_index += 1;
            }

            if pending.len() == 0 {
                self.write_pointer_block(tail.block, &tail.pointers)?;
                self.cache = Some(tail);
                return Ok(());
            }

            let successor = match self.new_pointer_block() {
                Ok(block) => block,
                Err(e) => {
                    warn!(
                        "inode {id}: chain growth stopped with {} blocks unlinked",
                        pending.len()
                    );
                    return Err(e);
                }
            };
            tail.pointers.set_link(Some(successor));
            self.write_pointer_block(tail.block, &tail.pointers)?;
            tail = TraversalCache {
                inode: id,
                base: tail.base + INDIRECT_DATA_POINTERS,
                block: successor,
                pointers: PointerBlock::empty(),
            };
        }
    }

    /// free every live data block of inode `id` and the indirect blocks pointing at them
    ///
    /// the inode record itself is not touched, see [Volume::release_inode]
    pub fn release_blocks(&mut self, id: InodeId) -> Result<()> {
        let count = self.inodes.get(id)?.block_count();
        let mut last_indirect = None;
        for index in 0..count {
            let block = self.resolve_pointer(id, index)?;
            self.free_block(block)?;
            if index >= DIRECT_POINTERS {
                let indirect = self.cache.as_ref().map(|cache| cache.block);
                if indirect != last_indirect {
                    if let Some(indirect) = indirect {
                        self.free_block(indirect)?;
                    }
                    last_indirect = indirect;
                }
            }
        }
        self.cache = None;
        debug!("released {count} data blocks of inode {id}");
        self.flush_bitmap()
    }

    /// allocate an indirect block, with every slot free on disk before anything links to it
    fn new_pointer_block(&mut self) -> Result<BlockPtr> {
        let block = self.bitmap.allocate_one()?;
        self.flush_bitmap()?;
        self.write_pointer_block(block, &PointerBlock::empty())?;
        debug!("new indirect block {block}");
        Ok(block)
    }

    fn read_pointer_block(&self, block: BlockPtr) -> Result<PointerBlock> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        self.device().read_blocks(self.absolute(block), 1, &mut buf)?;
        Ok(PointerBlock::deserialize(&buf))
    }

    fn write_pointer_block(&mut self, block: BlockPtr, pointers: &PointerBlock) -> Result<()> {
        let absolute = self.absolute(block);
        self.device_mut().write_blocks(absolute, 1, &pointers.serialize())
    }
}
