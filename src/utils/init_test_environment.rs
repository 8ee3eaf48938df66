use crate::fs::{Geometry, MemoryDisk, SimpleFs, Volume};

/// format a fresh in-memory volume with the given geometry
pub fn init_test_volume(total_blocks: u32, inode_blocks: u32) -> Volume<MemoryDisk> {
    let geometry = Geometry::new(total_blocks, inode_blocks);
    let disk = MemoryDisk::new(geometry.device_blocks());
    Volume::format(disk, geometry).expect("format test volume failed")
}

/// format a fresh in-memory filesystem with the given geometry
pub fn init_test_environment(total_blocks: u32, inode_blocks: u32) -> SimpleFs<MemoryDisk> {
    let geometry = Geometry::new(total_blocks, inode_blocks);
    let disk = MemoryDisk::new(geometry.device_blocks());
    SimpleFs::format(disk, geometry).expect("format test filesystem failed")
}

/// deterministic, non-repeating-per-block test content
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i % 251) as u8 ^ (i / 1024) as u8 ^ seed)
        .collect()
}
