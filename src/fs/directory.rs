//! the flat root directory, stored as the content of the root inode
use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use super::{
    inode::{decode_pointer, encode_pointer},
    BlockDevice, FsError, InodeId, Result, Volume, BLOCK_SIZE, DIR_ENTRIES_PER_BLOCK,
    DIR_ENTRY_SIZE, MAX_FILENAME,
};

/// the name field holds up to [MAX_FILENAME] bytes and a terminating NUL
const NAME_FIELD: usize = MAX_FILENAME + 1;

/// check if `name` can be stored in a directory entry
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FsError::InvalidArgument("empty file name"));
    }
    if name.len() > MAX_FILENAME {
        return Err(FsError::InvalidArgument("file name too long"));
    }
    if name.as_bytes().contains(&0) {
        return Err(FsError::InvalidArgument("file name contains NUL"));
    }
    Ok(())
}

/// one 64-byte slot of the root directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// `None` for a free slot
    pub inode: Option<InodeId>,
}

impl DirEntry {
    pub fn new(name: &str, inode: InodeId) -> Self {
        Self {
            name: name.to_string(),
            inode: Some(inode),
        }
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.inode.is_some()
    }

    /// pack into `buf`, which must hold [DIR_ENTRY_SIZE] bytes
    pub fn serialize_into(&self, buf: &mut [u8]) {
        let buf = &mut buf[..DIR_ENTRY_SIZE];
        buf.fill(0);
        let name = self.name.as_bytes();
        let len = name.len().min(MAX_FILENAME);
        buf[..len].copy_from_slice(&name[..len]);
        LittleEndian::write_i16(
            &mut buf[NAME_FIELD..NAME_FIELD + 2],
            encode_pointer(self.inode),
        );
    }

    pub fn deserialize(buf: &[u8]) -> Self {
        let field = &buf[..NAME_FIELD];
        let len = field.iter().position(|b| *b == 0).unwrap_or(MAX_FILENAME);
        let inode = decode_pointer(LittleEndian::read_i16(&buf[NAME_FIELD..NAME_FIELD + 2]));
        Self {
            name: String::from_utf8_lossy(&field[..len]).into_owned(),
            inode,
        }
    }
}

/// every slot of the root directory, loaded wholesale at mount
///
/// the directory only grows, one block of free slots at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    root: InodeId,
    entries: Vec<DirEntry>,
}

impl Directory {
    /// read the directory stored in inode `root`
    ///
    /// the directory always grows by whole blocks, any other size means a corrupted volume
    pub fn load<D>(volume: &mut Volume<D>, root: InodeId) -> Result<Self>
    where
        D: BlockDevice,
    {
        let size = volume.file_size(root)?;
        if size % BLOCK_SIZE != 0 {
            return Err(FsError::InvalidSuperblock(format!(
                "root directory size {size} is not a multiple of the block size"
            )));
        }
        let mut buf = vec![0u8; size];
        if size > 0 {
            volume.read(root, 0, &mut buf)?;
        }
        let entries = buf
            .chunks_exact(DIR_ENTRY_SIZE)
            .map(DirEntry::deserialize)
            .collect::<Vec<_>>();
        debug!("loaded {} directory slots", entries.len());
        Ok(Self { root, entries })
    }

    /// slot of the used entry called `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.is_used() && entry.name == name)
    }

    pub fn get(&self, slot: usize) -> Option<&DirEntry> {
        self.entries.get(slot)
    }

    /// replace slot `slot` in memory, see [Directory::update]
    pub fn set(&mut self, slot: usize, entry: DirEntry) -> Result<()> {
        let target = self
            .entries
            .get_mut(slot)
            .ok_or(FsError::InvalidArgument("directory slot out of range"))?;
        *target = entry;
        Ok(())
    }

    /// the first free slot, appending a block of free slots when there is none
    pub fn free_slot<D>(&mut self, volume: &mut Volume<D>) -> Result<usize>
    where
        D: BlockDevice,
    {
        if let Some(slot) = self.entries.iter().position(|entry| !entry.is_used()) {
            return Ok(slot);
        }
        let slot = self.entries.len();
        let fresh = vec![DirEntry::default(); DIR_ENTRIES_PER_BLOCK];
        volume.write(self.root, slot * DIR_ENTRY_SIZE, &serialize_entries(&fresh))?;
        self.entries.extend(fresh);
        debug!("directory grew to {} slots", self.entries.len());
        Ok(slot)
    }

    /// persist the directory block holding `slot`
    pub fn update<D>(&self, volume: &mut Volume<D>, slot: usize) -> Result<()>
    where
        D: BlockDevice,
    {
        if slot >= self.entries.len() {
            return Err(FsError::InvalidArgument("directory slot out of range"));
        }
        let first = slot / DIR_ENTRIES_PER_BLOCK * DIR_ENTRIES_PER_BLOCK;
        let block = &self.entries[first..first + DIR_ENTRIES_PER_BLOCK];
        volume.write(self.root, first * DIR_ENTRY_SIZE, &serialize_entries(block))?;
        Ok(())
    }

    /// number of slots, used or free
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// used entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|entry| entry.is_used())
    }
}

fn serialize_entries(entries: &[DirEntry]) -> Vec<u8> {
    let mut buf = vec![0u8; entries.len() * DIR_ENTRY_SIZE];
    for (entry, chunk) in entries.iter().zip(buf.chunks_exact_mut(DIR_ENTRY_SIZE)) {
        entry.serialize_into(chunk);
    }
    debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
    buf
}
