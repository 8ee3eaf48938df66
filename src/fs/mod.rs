//! our simple filesystem, laid out on a fixed-size block device
pub mod bitmap;
pub mod block_device;
pub mod directory;
pub mod error;
pub mod fs_api_impl;
pub mod fs_layout;
pub mod indirect;
pub mod inode;
pub mod superblock;
mod resolver;
mod transfer;
pub use bitmap::*;
pub use block_device::*;
pub use directory::*;
pub use error::*;
pub use fs_api_impl::*;
pub use fs_layout::*;
pub use indirect::*;
pub use inode::*;
pub use superblock::*;

/// index of an inode record in the inode table
pub type InodeId = u16;
/// data block number, relative to the first block of the data region
pub type BlockPtr = u16;

pub const FS_MAGIC: u32 = 0xACBD_0005;
pub const BLOCK_SIZE: usize = 1024;
/// largest device we know how to address, in blocks
pub const MAX_FS_SIZE: u32 = 1024 * 8;

pub const INODE_SIZE: usize = 256;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
pub const MAX_INODE_BLOCKS: u32 = 81;
/// superblock, inode table and bitmap are carved out of the device
pub const MAX_DATA_BLOCKS: u32 = MAX_FS_SIZE - 1 - MAX_INODE_BLOCKS - 1;

pub const DIRECT_POINTERS: usize = 115;
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / std::mem::size_of::<i16>();
/// the last slot of an indirect block links to the next one
pub const INDIRECT_DATA_POINTERS: usize = POINTERS_PER_BLOCK - 1;
pub const BITMAP_WORDS: usize = BLOCK_SIZE / std::mem::size_of::<u32>();

pub const ROOT_INODE: InodeId = 0;
pub const DIR_ENTRY_SIZE: usize = 64;
pub const MAX_FILENAME: usize = 32;
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;
pub const MAX_OPEN_FILES: usize = 16;
/// file sizes are stored as signed 32-bit integers
pub const MAX_FILE_SIZE: usize = i32::MAX as usize;

/// on-disk marker of a free pointer slot or a free directory entry
const FREE_SENTINEL: i16 = -1;
