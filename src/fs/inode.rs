use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::utils::fs_size_calculator::blocks_for_size;

use super::{
    BlockDevice, BlockPtr, FsError, InodeId, Result, BLOCK_SIZE, DIRECT_POINTERS, FREE_SENTINEL,
    INODES_PER_BLOCK, INODE_SIZE,
};

/// pointer slot as stored on disk
#[inline]
pub(crate) fn encode_pointer(pointer: Option<BlockPtr>) -> i16 {
    pointer.map_or(FREE_SENTINEL, |block| block as i16)
}

#[inline]
pub(crate) fn decode_pointer(raw: i16) -> Option<BlockPtr> {
    (raw >= 0).then_some(raw as BlockPtr)
}

/// One file's record in the inode table
///
/// `size` alone decides which blocks are live, pointers past
/// `ceil(size / BLOCK_SIZE)` may still be linked but are never read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub used: bool,
    // unix-like metadata, stored but not interpreted
    pub mode: i32,
    pub link_count: i32,
    pub uid: i32,
    pub gid: i32,
    /// file size in bytes
    pub size: u32,
    pub direct_blocks: [Option<BlockPtr>; DIRECT_POINTERS],
    /// first indirect block of the chain
    pub indirect_block: Option<BlockPtr>,
}

impl Default for Inode {
    fn default() -> Self {
        Self {
            used: false,
            mode: 0,
            link_count: 0,
            uid: 0,
            gid: 0,
            size: 0,
            direct_blocks: [None; DIRECT_POINTERS],
            indirect_block: None,
        }
    }
}

/// This block is about serialization and deserialization
impl Inode {
    /// write the fixed 256 byte record
    pub fn serialize_into<W>(&self, w: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        w.write_i32::<LittleEndian>(self.used as i32)?;
        w.write_i32::<LittleEndian>(self.mode)?;
        w.write_i32::<LittleEndian>(self.link_count)?;
        w.write_i32::<LittleEndian>(self.uid)?;
        w.write_i32::<LittleEndian>(self.gid)?;
        w.write_i32::<LittleEndian>(self.size as i32)?;
        for pointer in self.direct_blocks {
            w.write_i16::<LittleEndian>(encode_pointer(pointer))?;
        }
        w.write_i16::<LittleEndian>(encode_pointer(self.indirect_block))
    }

    pub fn deserialize_from<R>(r: &mut R) -> io::Result<Self>
    where
        R: Read,
    {
        let used = r.read_i32::<LittleEndian>()? != 0;
        let mode = r.read_i32::<LittleEndian>()?;
        let link_count = r.read_i32::<LittleEndian>()?;
        let uid = r.read_i32::<LittleEndian>()?;
        let gid = r.read_i32::<LittleEndian>()?;
        let size = u32::try_from(r.read_i32::<LittleEndian>()?)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative file size"))?;
        let mut direct_blocks = [None; DIRECT_POINTERS];
        for pointer in direct_blocks.iter_mut() {
            *pointer = decode_pointer(r.read_i16::<LittleEndian>()?);
        }
        let indirect_block = decode_pointer(r.read_i16::<LittleEndian>()?);
        Ok(Self {
            used,
            mode,
            link_count,
            uid,
            gid,
            size,
            direct_blocks,
            indirect_block,
        })
    }
}

impl Inode {
    /// number of blocks holding live data
    pub fn block_count(&self) -> usize {
        blocks_for_size(self.size as usize)
    }
}

/// the fixed-capacity array of inode records, kept in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeTable {
    inodes: Vec<Inode>,
}

impl InodeTable {
    /// a table of unused records filling `inode_blocks` blocks
    pub fn new(inode_blocks: u32) -> Self {
        Self {
            inodes: vec![Inode::default(); inode_blocks as usize * INODES_PER_BLOCK],
        }
    }

    pub fn deserialize(buf: &[u8], inode_blocks: u32) -> Result<Self> {
        let count = inode_blocks as usize * INODES_PER_BLOCK;
        let mut cursor = Cursor::new(buf);
        let inodes = (0..count)
            .map(|_| Inode::deserialize_from(&mut cursor))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self { inodes })
    }

    /// serialize the records sharing table block `block_index`
    pub fn serialize_block(&self, block_index: usize) -> Result<Vec<u8>> {
        let mut block = Vec::with_capacity(BLOCK_SIZE);
        let first = block_index * INODES_PER_BLOCK;
        for inode in &self.inodes[first..first + INODES_PER_BLOCK] {
            inode.serialize_into(&mut block)?;
        }
        Ok(block)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut table = Vec::with_capacity(self.inodes.len() * INODE_SIZE);
        for inode in &self.inodes {
            inode.serialize_into(&mut table)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    /// look up a record that is in use
    pub fn get(&self, id: InodeId) -> Result<&Inode> {
        self.inodes
            .get(id as usize)
            .filter(|inode| inode.used)
            .ok_or(FsError::InodeNotFound(id))
    }

    pub fn get_mut(&mut self, id: InodeId) -> Result<&mut Inode> {
        self.inodes
            .get_mut(id as usize)
            .filter(|inode| inode.used)
            .ok_or(FsError::InodeNotFound(id))
    }

    /// take the first unused record and reset it to an empty file
    pub fn allocate_inode(&mut self) -> Result<InodeId> {
        let index = self
            .inodes
            .iter()
            .position(|inode| !inode.used)
            .ok_or(FsError::InodesExhausted)?;
        self.inodes[index] = Inode {
            used: true,
            ..Inode::default()
        };
        debug!("allocated inode {index}");
        Ok(index as InodeId)
    }

    /// mark a record unused, its block pointers are left as they are
    pub fn release(&mut self, id: InodeId) -> Result<()> {
        self.get_mut(id)?.used = false;
        Ok(())
    }

    /// persist the table block holding `id`,
    /// this rewrites every record sharing that block
    pub fn update<D>(&self, device: &mut D, id: InodeId) -> Result<()>
    where
        D: BlockDevice,
    {
        if id as usize >= self.inodes.len() {
            return Err(FsError::InodeNotFound(id));
        }
        let block_index = id as usize / INODES_PER_BLOCK;
        device.write_blocks(1 + block_index as u32, 1, &self.serialize_block(block_index)?)
    }
}
