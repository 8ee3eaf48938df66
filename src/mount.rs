//! open an image file and mount the filesystem stored in it
use std::path::Path;

use anyhow::Context;
use log::info;

use crate::fs::{ImageDisk, SimpleFs};

/// mount the filesystem stored in `image_path`
///
/// the image stays mapped until the returned filesystem is dropped,
/// call [SimpleFs::into_device] to flush it before that
pub fn mount<P>(image_path: P) -> anyhow::Result<SimpleFs<ImageDisk>>
where
    P: AsRef<Path>,
{
    let image_path = image_path.as_ref();
    let disk = ImageDisk::open(image_path)
        .with_context(|| format!("can't open image file {image_path:?}"))?;
    let fs = SimpleFs::mount(disk)?;
    info!("mount() mounted {image_path:?}");
    Ok(fs)
}
