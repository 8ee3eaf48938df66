//! create our filesystem
use std::path::Path;

use byte_unit::Byte;
use log::info;

use crate::{
    fs::{Geometry, ImageDisk, SimpleFs},
    utils::fs_size_calculator::image_size,
};

/// create a new filesystem in a new image file
/// # Params
/// - `image_file_path`: the path of the image file, which must not exist yet
/// - `geometry`: data region and inode table sizes
///
/// # Return
/// an [anyhow::Result] type to indicate whether the operation is successful
pub fn mkfs<P>(image_file_path: P, geometry: Geometry) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    // check before the image file gets created
    geometry.validate()?;
    let device_blocks = geometry.device_blocks();
    let disk = ImageDisk::create(image_file_path.as_ref(), device_blocks)?;
    let fs = SimpleFs::format(disk, geometry)?;
    fs.into_device()?;

    info!(
        "mkfs() created {:?} with geometry {geometry:?}",
        image_file_path.as_ref()
    );
    println!(
        "created a {} file system with {} data blocks and {} inode table blocks",
        Byte::from_bytes(image_size(device_blocks) as _).get_appropriate_unit(true),
        geometry.total_blocks,
        geometry.inode_blocks
    );
    Ok(())
}
