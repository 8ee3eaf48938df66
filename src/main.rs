use std::io::Write;

use anyhow::Context;
use clap::Parser;
use simplefs::{
    cli_interface::{FileArgs, ImageArgs, PutArgs, SimpleFsCli},
    FsError, BLOCK_SIZE,
};

/// a CLI interface to users to create our filesystem in an image file,
/// or to inspect and change the files inside an existing one.
///
/// a failing filesystem call exits with the matching errno.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = SimpleFsCli::parse();
    if let Err(e) = run(args) {
        if let Some(fs_error) = e.downcast_ref::<FsError>() {
            eprintln!("simplefs: {e:#}");
            std::process::exit(fs_error.errno());
        }
        return Err(e);
    }
    Ok(())
}

fn run(args: SimpleFsCli) -> anyhow::Result<()> {
    match args {
        SimpleFsCli::Mkfs(args) => {
            simplefs::mkfs::mkfs(&args.image_file_path, args.geometry())?;
        }
        SimpleFsCli::Ls(ImageArgs { image_file_path }) => {
            let fs = simplefs::mount::mount(image_file_path)?;
            for (name, size) in fs.list()? {
                println!("{size:>10} {name}");
            }
        }
        SimpleFsCli::Stat(ImageArgs { image_file_path }) => {
            let fs = simplefs::mount::mount(image_file_path)?;
            let superblock = fs.volume().superblock();
            println!("block size:         {}", superblock.block_size);
            println!("data blocks:        {}", superblock.total_blocks);
            println!("free blocks:        {}", fs.free_blocks());
            println!("inode table blocks: {}", superblock.inode_blocks);
            println!("inodes:             {}", superblock.inode_count());
        }
        SimpleFsCli::Put(PutArgs {
            image_file_path,
            name,
            source,
        }) => {
            let content = std::fs::read(&source)
                .with_context(|| format!("can't read host file {source:?}"))?;
            let mut fs = simplefs::mount::mount(image_file_path)?;
            let fd = fs.open(&name)?;
            // an empty host file still creates the file
            if !content.is_empty() {
                fs.write(fd, &content)?;
            }
            fs.close(fd)?;
            fs.into_device()?;
        }
        SimpleFsCli::Cat(FileArgs {
            image_file_path,
            name,
        }) => {
            let mut fs = simplefs::mount::mount(image_file_path)?;
            // `open` would create a missing file
            fs.file_size(&name)?;
            let fd = fs.open(&name)?;
            fs.seek(fd, 0)?;
            let mut stdout = std::io::stdout().lock();
            let mut buf = vec![0u8; 16 * BLOCK_SIZE];
            loop {
                let read = fs.read(fd, &mut buf)?;
                if read == 0 {
                    break;
                }
                stdout.write_all(&buf[..read])?;
            }
            stdout.flush()?;
            fs.close(fd)?;
        }
        SimpleFsCli::Rm(FileArgs {
            image_file_path,
            name,
        }) => {
            let mut fs = simplefs::mount::mount(image_file_path)?;
            fs.remove(&name)?;
            fs.into_device()?;
        }
    }
    Ok(())
}
