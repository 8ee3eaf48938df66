//! byte range read and write over the blocks of a file
use log::{debug, warn};

use super::{BlockDevice, FsError, InodeId, Result, Volume, BLOCK_SIZE, MAX_FILE_SIZE};
use crate::utils::fs_size_calculator::growth_blocks;

impl<D> Volume<D>
where
    D: BlockDevice,
{
    /// read file content of inode `id` starting at `offset`
    /// # Params
    /// - `id`: the inode to read
    /// - `offset`: byte offset in the file
    /// - `buf`: filled from its start, at most up to the end of the file
    /// # Return
    /// the number of bytes read, `0` when `offset` is at or past the end of the file
    pub fn read(&mut self, id: InodeId, offset: usize, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(FsError::InvalidArgument("read of zero bytes"));
        }
        let size = self.file_size(id)?;
        if offset >= size {
            return Ok(0);
        }
        let length = buf.len().min(size - offset);
        let first = offset / BLOCK_SIZE;
        let last = (offset + length - 1) / BLOCK_SIZE;

        // stage the whole span, then copy out the requested bytes
        let mut scratch = vec![0u8; (last - first + 1) * BLOCK_SIZE];
        for (index, chunk) in (first..=last).zip(scratch.chunks_exact_mut(BLOCK_SIZE)) {
            let block = self.resolve(id, index)?;
            self.device().read_blocks(block, 1, chunk)?;
        }
        let start = offset - first * BLOCK_SIZE;
        buf[..length].copy_from_slice(&scratch[start..start + length]);
        Ok(length)
    }

    /// write `data` into the file of inode `id` at `offset`, growing the file if needed
    ///
    /// partially covered blocks keep the bytes around the written range,
    /// fully covered blocks are overwritten without being read first.
    /// bytes between the old end of the file and `offset` are left unspecified
    /// # Return
    /// the number of bytes written, always `data.len()` on success
    pub fn write(&mut self, id: InodeId, offset: usize, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Err(FsError::InvalidArgument("write of zero bytes"));
        }
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= MAX_FILE_SIZE)
            .ok_or(FsError::InvalidArgument("write past the largest file size"))?;
        let size = self.file_size(id)?;
        if end > size {
            self.grow(id, size, end)?;
        }

        let mut block_buf = vec![0u8; BLOCK_SIZE];
        let mut written = 0;
        while written < data.len() {
            let position = offset + written;
            let within = position % BLOCK_SIZE;
            let chunk = (BLOCK_SIZE - within).min(data.len() - written);
            let block = self.resolve(id, position / BLOCK_SIZE)?;
            let src = &data[written..written + chunk];
            if chunk == BLOCK_SIZE {
                self.device_mut().write_blocks(block, 1, src)?;
            } else {
                self.device().read_blocks(block, 1, &mut block_buf)?;
                block_buf[within..within + chunk].copy_from_slice(src);
                self.device_mut().write_blocks(block, 1, &block_buf)?;
            }
            written += chunk;
        }
        Ok(written)
    }

    /// make inode `id` hold `new_size` bytes
    ///
    /// checks the free space for data and indirect blocks up front,
    /// so a disk full failure leaves nothing changed
    fn grow(&mut self, id: InodeId, old_size: usize, new_size: usize) -> Result<()> {
        let (data_blocks, indirect_blocks) = growth_blocks(old_size, new_size);
        let free = self.free_blocks() as usize;
        if data_blocks + indirect_blocks > free {
            return Err(FsError::DiskFull {
                requested: data_blocks + indirect_blocks,
                free,
            });
        }

        if data_blocks > 0 {
            let blocks = self.allocate_blocks(data_blocks)?;
            self.flush_bitmap()?;
            if let Err(e) = self.append_blocks(id, &blocks) {
                warn!("inode {id}: growth to {new_size} bytes failed after allocation: {e}");
                return Err(e);
            }
        }
        self.inodes.get_mut(id)?.size = new_size as u32;
        debug!("inode {id} grew from {old_size} to {new_size} bytes");
        self.update_inode(id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        fs::{DIRECT_POINTERS, INDIRECT_DATA_POINTERS},
        utils::init_test_environment::{init_test_volume, pattern},
    };

    #[test]
    fn test_write_then_read_small_file() {
        let mut volume = init_test_volume(64, 4);
        let id = volume.allocate_inode().unwrap();
        assert_eq!(id, 1);
        let data = pattern(2048, 1);

        assert_eq!(volume.write(id, 0, &data).unwrap(), 2048);
        assert_eq!(volume.file_size(id).unwrap(), 2048);
        assert_eq!(volume.free_blocks(), 62);

        let mut buf = vec![0u8; 2048];
        assert_eq!(volume.read(id, 0, &mut buf).unwrap(), 2048);
        assert_eq!(buf, data);
    }

    #[test]
    fn test_write_past_direct_pointers() {
        let mut volume = init_test_volume(256, 4);
        let id = volume.allocate_inode().unwrap();
        let direct_bytes = DIRECT_POINTERS * BLOCK_SIZE;
        volume.write(id, 0, &pattern(direct_bytes, 2)).unwrap();
        assert_eq!(volume.inode(id).unwrap().indirect_block, None);
        let free = volume.free_blocks();

        let tail = pattern(BLOCK_SIZE, 3);
        volume.write(id, direct_bytes, &tail).unwrap();
        // one data block and exactly one indirect block
        assert_eq!(volume.free_blocks(), free - 2);
        let indirect = volume.inode(id).unwrap().indirect_block.unwrap();
        let resolved = volume.resolve(id, DIRECT_POINTERS).unwrap();
        assert_ne!(resolved, volume.absolute(indirect));

        let mut buf = vec![0u8; BLOCK_SIZE];
        volume.read(id, direct_bytes, &mut buf).unwrap();
        assert_eq!(buf, tail);
    }

    #[test]
    fn test_disk_full_leaves_file_unchanged() {
        let mut volume = init_test_volume(64, 4);
        let id = volume.allocate_inode().unwrap();
        volume.write(id, 0, &pattern(100, 4)).unwrap();
        let bitmap = volume.bitmap().clone();

        let result = volume.write(id, 0, &pattern(65 * BLOCK_SIZE, 5));
        assert!(matches!(
            result,
            Err(FsError::DiskFull {
                requested: 64,
                free: 63
            })
        ));
        assert_eq!(volume.file_size(id).unwrap(), 100);
        assert_eq!(volume.bitmap(), &bitmap);
    }

    #[test]
    fn test_disk_full_counts_indirect_blocks() {
        let total = DIRECT_POINTERS as u32 + 1;
        let mut volume = init_test_volume(total, 4);
        let id = volume.allocate_inode().unwrap();
        // enough room for the data, none for the indirect block
        let result = volume.write(id, 0, &pattern(total as usize * BLOCK_SIZE, 6));
        assert!(matches!(result, Err(FsError::DiskFull { .. })));
        assert_eq!(volume.free_blocks(), total);
        assert_eq!(volume.file_size(id).unwrap(), 0);
    }

    #[test]
    fn test_partial_block_writes_keep_neighbours() {
        let mut volume = init_test_volume(64, 4);
        let id = volume.allocate_inode().unwrap();
        let mut expected = pattern(3000, 7);
        volume.write(id, 0, &expected).unwrap();

        // straddles the first block boundary
        let patch = [0xaa; 10];
        volume.write(id, 1020, &patch).unwrap();
        expected[1020..1030].copy_from_slice(&patch);
        // stays inside the third block
        let patch = [0x55; 100];
        volume.write(id, 2100, &patch).unwrap();
        expected[2100..2200].copy_from_slice(&patch);

        assert_eq!(volume.file_size(id).unwrap(), 3000);
        let mut buf = vec![0u8; 3000];
        assert_eq!(volume.read(id, 0, &mut buf).unwrap(), 3000);
        assert_eq!(buf, expected);

        let mut buf = vec![0u8; 20];
        assert_eq!(volume.read(id, 1015, &mut buf).unwrap(), 20);
        assert_eq!(buf, expected[1015..1035]);
    }

    #[test]
    fn test_size_only_grows() {
        let mut volume = init_test_volume(64, 4);
        let id = volume.allocate_inode().unwrap();
        volume.write(id, 0, &pattern(5000, 8)).unwrap();
        volume.write(id, 10, &pattern(200, 9)).unwrap();
        assert_eq!(volume.file_size(id).unwrap(), 5000);
        volume.write(id, 4990, &pattern(20, 10)).unwrap();
        assert_eq!(volume.file_size(id).unwrap(), 5010);
        // growing inside the last block takes no new block
        assert_eq!(volume.free_blocks(), 64 - 5);
    }

    #[test]
    fn test_sparse_write() {
        let mut volume = init_test_volume(64, 4);
        let id = volume.allocate_inode().unwrap();
        let data = pattern(10, 11);
        volume.write(id, 5000, &data).unwrap();
        assert_eq!(volume.file_size(id).unwrap(), 5010);
        assert_eq!(volume.free_blocks(), 64 - 5);

        let mut buf = [0u8; 10];
        volume.read(id, 5000, &mut buf).unwrap();
        assert_eq!(&buf[..], &data[..]);
    }

    #[test]
    fn test_read_clamps_to_end_of_file() {
        let mut volume = init_test_volume(64, 4);
        let id = volume.allocate_inode().unwrap();
        let data = pattern(1500, 12);
        volume.write(id, 0, &data).unwrap();

        let mut buf = vec![0u8; 4096];
        assert_eq!(volume.read(id, 1000, &mut buf).unwrap(), 500);
        assert_eq!(buf[..500], data[1000..]);
        assert_eq!(volume.read(id, 1500, &mut buf).unwrap(), 0);
        assert_eq!(volume.read(id, 9999, &mut buf).unwrap(), 0);

        assert!(matches!(
            volume.read(id, 0, &mut []),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            volume.write(id, 0, &[]),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            volume.read(id + 1, 0, &mut buf),
            Err(FsError::InodeNotFound(_))
        ));
    }

    #[test]
    fn test_write_too_large_file() {
        let mut volume = init_test_volume(64, 4);
        let id = volume.allocate_inode().unwrap();
        assert!(matches!(
            volume.write(id, MAX_FILE_SIZE, &[1]),
            Err(FsError::InvalidArgument(_))
        ));
        assert_eq!(volume.file_size(id).unwrap(), 0);
    }

    #[test]
    fn test_large_file_in_chunks() {
        let mut volume = init_test_volume(1400, 4);
        let id = volume.allocate_inode().unwrap();
        let blocks = DIRECT_POINTERS + INDIRECT_DATA_POINTERS + 20;
        let data = pattern(blocks * BLOCK_SIZE + 17, 13);

        // chunks that never line up with block boundaries
        for (i, chunk) in data.chunks(3000).enumerate() {
            assert_eq!(volume.write(id, i * 3000, chunk).unwrap(), chunk.len());
        }
        assert_eq!(volume.file_size(id).unwrap(), data.len());
        // data blocks plus two indirect blocks
        assert_eq!(volume.free_blocks(), 1400 - (blocks as u32 + 1) - 2);

        let mut buf = vec![0u8; data.len()];
        assert_eq!(volume.read(id, 0, &mut buf).unwrap(), data.len());
        assert_eq!(buf, data);
    }

    #[test]
    fn test_files_never_share_blocks() {
        let mut volume = init_test_volume(1024, 4);
        let first = volume.allocate_inode().unwrap();
        let second = volume.allocate_inode().unwrap();
        let a = pattern(150 * BLOCK_SIZE, 14);
        let b = pattern(150 * BLOCK_SIZE, 15);
        // interleave the growth of both files
        for (i, (x, y)) in a.chunks(1500).zip(b.chunks(1500)).enumerate() {
            volume.write(first, i * 1500, x).unwrap();
            volume.write(second, i * 1500, y).unwrap();
        }

        let mut seen = HashSet::new();
        for id in [first, second] {
            for index in 0..150 {
                assert!(seen.insert(volume.resolve(id, index).unwrap()));
            }
        }
        let mut buf = vec![0u8; a.len()];
        volume.read(first, 0, &mut buf).unwrap();
        assert_eq!(buf, a);
        volume.read(second, 0, &mut buf).unwrap();
        assert_eq!(buf, b);
    }

    #[test]
    fn test_content_survives_remount() {
        let mut volume = init_test_volume(256, 4);
        let id = volume.allocate_inode().unwrap();
        let data = pattern(130 * BLOCK_SIZE + 5, 16);
        volume.write(id, 0, &data).unwrap();
        let free = volume.free_blocks();

        let mut volume = Volume::mount(volume.into_device().unwrap()).unwrap();
        assert_eq!(volume.free_blocks(), free);
        assert_eq!(volume.file_size(id).unwrap(), data.len());
        let mut buf = vec![0u8; data.len()];
        volume.read(id, 0, &mut buf).unwrap();
        assert_eq!(buf, data);
    }
}
