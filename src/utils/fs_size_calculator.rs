//! This module contains functions to calculate the size of different fs components

use crate::fs::{BLOCK_SIZE, DIRECT_POINTERS, INDIRECT_DATA_POINTERS};

/// calculate how many blocks hold `size` bytes of file content
/// # Arguments
/// - `size`: the file size in bytes
/// # Return
/// the number of data blocks, rounded up
/// # Example
/// ```
/// use simplefs::utils::fs_size_calculator::blocks_for_size;
/// assert_eq!(blocks_for_size(0), 0);
/// assert_eq!(blocks_for_size(1), 1);
/// assert_eq!(blocks_for_size(2048), 2);
/// assert_eq!(blocks_for_size(2049), 3);
/// ```
pub const fn blocks_for_size(size: usize) -> usize {
    size.div_ceil(BLOCK_SIZE)
}

/// calculate how many indirect blocks a file of `block_count` data blocks needs
/// # Arguments
/// - `block_count`: the number of data blocks of the file
/// # Return
/// the number of indirect blocks in the file's chain
/// # Example
/// ```
/// use simplefs::utils::fs_size_calculator::indirect_blocks_for;
/// // 115 direct pointers, 511 data pointers per indirect block
/// assert_eq!(indirect_blocks_for(115), 0);
/// assert_eq!(indirect_blocks_for(116), 1);
/// assert_eq!(indirect_blocks_for(115 + 511), 1);
/// assert_eq!(indirect_blocks_for(115 + 511 + 1), 2);
/// ```
pub const fn indirect_blocks_for(block_count: usize) -> usize {
    block_count
        .saturating_sub(DIRECT_POINTERS)
        .div_ceil(INDIRECT_DATA_POINTERS)
}

/// calculate the blocks a file needs to grow from `old_size` to `new_size` bytes
/// # Return
/// a tuple of (data blocks, indirect blocks)
/// # Example
/// ```
/// use simplefs::utils::fs_size_calculator::growth_blocks;
/// assert_eq!(growth_blocks(0, 2048), (2, 0));
/// assert_eq!(growth_blocks(100, 1000), (0, 0));
/// assert_eq!(growth_blocks(115 * 1024, 116 * 1024), (1, 1));
/// ```
pub const fn growth_blocks(old_size: usize, new_size: usize) -> (usize, usize) {
    let old_blocks = blocks_for_size(old_size);
    let new_blocks = blocks_for_size(new_size);
    if new_blocks <= old_blocks {
        return (0, 0);
    }
    (
        new_blocks - old_blocks,
        indirect_blocks_for(new_blocks) - indirect_blocks_for(old_blocks),
    )
}

/// calculate the byte size of a disk image
/// # Arguments
/// - `device_blocks`: the number of blocks on the device
/// # Example
/// ```
/// use simplefs::utils::fs_size_calculator::image_size;
/// assert_eq!(image_size(70), 70 * 1024);
/// ```
pub const fn image_size(device_blocks: u32) -> u64 {
    device_blocks as u64 * BLOCK_SIZE as u64
}
