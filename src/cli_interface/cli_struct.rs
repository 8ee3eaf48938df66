use clap::Parser;

use crate::fs::{Geometry, MAX_DATA_BLOCKS, MAX_INODE_BLOCKS};

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum SimpleFsCli {
    /// create a new file system
    Mkfs(MkfsArgs),
    /// list the files of a file system with their sizes
    Ls(ImageArgs),
    /// show the geometry and free space of a file system
    Stat(ImageArgs),
    /// append the content of a host file to a file in the file system
    Put(PutArgs),
    /// print a file of the file system to stdout
    Cat(FileArgs),
    /// delete a file from the file system
    Rm(FileArgs),
}

///make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct MkfsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the number of data blocks of the file system
    #[clap(short = 'b', long, default_value_t = MAX_DATA_BLOCKS)]
    pub total_blocks: u32,
    /// the number of blocks holding the inode table
    #[clap(short, long, default_value_t = MAX_INODE_BLOCKS)]
    pub inode_blocks: u32,
}

impl MkfsArgs {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.total_blocks, self.inode_blocks)
    }
}

/// subcommands working on a whole image
#[derive(clap::Args, Debug, PartialEq)]
pub struct ImageArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
}

/// subcommands working on one file of an image
#[derive(clap::Args, Debug, PartialEq)]
pub struct FileArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the name of the file inside the file system
    #[clap(short, long)]
    pub name: String,
}

/// copy a host file into the file system
#[derive(clap::Args, Debug, PartialEq)]
#[command(about = "append a host file to a file in the file system")]
pub struct PutArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the name of the file inside the file system
    #[clap(short, long)]
    pub name: String,
    /// the host file to copy from
    #[clap(short, long)]
    pub source: String,
}
