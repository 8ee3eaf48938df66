use thiserror::Error;

use super::{BlockPtr, InodeId};

/// everything that can go wrong inside the filesystem
#[derive(Debug, Error)]
pub enum FsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("inode {0} does not exist")]
    InodeNotFound(InodeId),
    #[error("inode {inode} has no block at logical index {index}")]
    BlockNotFound { inode: InodeId, index: usize },
    #[error("no such file: {0}")]
    FileNotFound(String),
    #[error("disk full: {requested} blocks requested, {free} free")]
    DiskFull { requested: usize, free: usize },
    #[error("block {0} is already free")]
    DoubleFree(BlockPtr),
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no free inode left")]
    InodesExhausted,
    #[error("invalid superblock: {0}")]
    InvalidSuperblock(String),
    #[error("file is in use")]
    FileBusy,
    #[error("bad file descriptor: {0}")]
    BadDescriptor(usize),
    #[error("too many open files")]
    TooManyOpenFiles,
}

impl FsError {
    /// the errno a POSIX caller would expect for this error
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::InodeNotFound(_) | FsError::FileNotFound(_) => libc::ENOENT,
            FsError::BlockNotFound { .. }
            | FsError::Io(_)
            | FsError::DoubleFree(_)
            | FsError::InvalidSuperblock(_) => libc::EIO,
            FsError::DiskFull { .. } | FsError::InodesExhausted => libc::ENOSPC,
            FsError::FileBusy => libc::EBUSY,
            FsError::BadDescriptor(_) => libc::EBADF,
            FsError::TooManyOpenFiles => libc::EMFILE,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(
            FsError::DiskFull {
                requested: 3,
                free: 1
            }
            .errno(),
            libc::ENOSPC
        );
        assert_eq!(FsError::FileNotFound("a".into()).errno(), libc::ENOENT);
        assert_eq!(FsError::BadDescriptor(3).errno(), libc::EBADF);
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        assert_eq!(FsError::from(io).errno(), libc::EIO);
    }
}
