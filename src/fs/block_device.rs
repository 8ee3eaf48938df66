//! the raw block device our filesystem lives on
use std::{
    fs::OpenOptions,
    io::{Error, ErrorKind},
    ops::Range,
    path::Path,
};

use log::debug;
use memmap2::MmapMut;

use super::{Result, BLOCK_SIZE};

/// a device that transfers whole, fixed-size blocks
///
/// every transfer either moves exactly `count` blocks or fails
pub trait BlockDevice {
    fn block_size(&self) -> usize;

    fn block_count(&self) -> u32;

    /// read `count` consecutive blocks starting at `start` into `buf`
    fn read_blocks(&self, start: u32, count: u32, buf: &mut [u8]) -> Result<()>;

    /// write `count` consecutive blocks starting at `start` from `buf`
    fn write_blocks(&mut self, start: u32, count: u32, buf: &[u8]) -> Result<()>;

    /// push buffered writes down to the backing storage
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// byte range covered by a transfer, or an I/O error if the device or the buffer is too short
fn transfer_range(
    block_size: usize,
    block_count: u32,
    start: u32,
    count: u32,
    buf_len: usize,
) -> Result<Range<usize>> {
    let end_block = start as u64 + count as u64;
    if end_block > block_count as u64 {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            format!("blocks {start}..{end_block} past end of device ({block_count} blocks)"),
        )
        .into());
    }
    let len = count as usize * block_size;
    if buf_len < len {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("buffer of {buf_len} bytes can't hold {count} blocks"),
        )
        .into());
    }
    let begin = start as usize * block_size;
    Ok(begin..begin + len)
}

/// a device kept entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryDisk {
    data: Vec<u8>,
    block_count: u32,
}

impl MemoryDisk {
    pub fn new(block_count: u32) -> Self {
        Self {
            data: vec![0u8; block_count as usize * BLOCK_SIZE],
            block_count,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl BlockDevice for MemoryDisk {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn read_blocks(&self, start: u32, count: u32, buf: &mut [u8]) -> Result<()> {
        let range = transfer_range(BLOCK_SIZE, self.block_count, start, count, buf.len())?;
        let len = range.len();
        buf[..len].copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_blocks(&mut self, start: u32, count: u32, buf: &[u8]) -> Result<()> {
        let range = transfer_range(BLOCK_SIZE, self.block_count, start, count, buf.len())?;
        let len = range.len();
        self.data[range].copy_from_slice(&buf[..len]);
        Ok(())
    }
}

/// a device backed by a disk image file, mapped into memory
#[derive(Debug)]
pub struct ImageDisk {
    image_file_mmap: MmapMut,
    block_count: u32,
}

impl ImageDisk {
    /// create a new zero-filled image file holding `block_count` blocks
    ///
    /// refuses to overwrite an existing file
    pub fn create<P>(image_path: P, block_count: u32) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(image_path.as_ref())?;
        // all regions are zeroed by `set_len`
        file.set_len(block_count as u64 * BLOCK_SIZE as u64)?;
        debug!(
            "created image {:?} with {block_count} blocks",
            image_path.as_ref()
        );
        Self::map(&file, block_count)
    }

    /// open an existing image file for read and write
    pub fn open<P>(image_path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(image_path.as_ref())?;
        let len = file.metadata()?.len();
        if len % BLOCK_SIZE as u64 != 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("image size {len} is not a multiple of the block size {BLOCK_SIZE}"),
            )
            .into());
        }
        let block_count = u32::try_from(len / BLOCK_SIZE as u64)
            .map_err(|_| Error::new(ErrorKind::InvalidData, "image file is too large"))?;
        Self::map(&file, block_count)
    }

    fn map(file: &std::fs::File, block_count: u32) -> Result<Self> {
        // Safety
        // the mapping stays valid as long as nobody truncates the image file underneath us,
        // the filesystem assumes it is the only user of its device.
        let image_file_mmap = unsafe { MmapMut::map_mut(file)? };
        Ok(Self {
            image_file_mmap,
            block_count,
        })
    }
}

impl BlockDevice for ImageDisk {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn read_blocks(&self, start: u32, count: u32, buf: &mut [u8]) -> Result<()> {
        let range = transfer_range(BLOCK_SIZE, self.block_count, start, count, buf.len())?;
        let len = range.len();
        buf[..len].copy_from_slice(&self.image_file_mmap[range]);
        Ok(())
    }

    fn write_blocks(&mut self, start: u32, count: u32, buf: &[u8]) -> Result<()> {
        let range = transfer_range(BLOCK_SIZE, self.block_count, start, count, buf.len())?;
        let len = range.len();
        self.image_file_mmap[range].copy_from_slice(&buf[..len]);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.image_file_mmap.flush()?)
    }
}
