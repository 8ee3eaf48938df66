//! named files on top of a [Volume]: the root directory and the open-file table
use log::info;

use super::{
    validate_name, BlockDevice, DirEntry, Directory, FsError, Geometry, InodeId, Result, Volume,
    MAX_OPEN_FILES,
};

/// index into the open-file table
pub type Fd = usize;

/// one slot of the open-file table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub inode: InodeId,
    /// byte offset the next read or write starts at
    pub position: usize,
}

/// our filesystem as a program sees it: a flat namespace of files
/// read and written through descriptors
#[derive(Debug)]
pub struct SimpleFs<D> {
    volume: Volume<D>,
    root: Directory,
    open_files: [Option<OpenFile>; MAX_OPEN_FILES],
    /// next directory slot visited by [SimpleFs::next_file_name]
    listing_cursor: usize,
}

impl<D> SimpleFs<D>
where
    D: BlockDevice,
{
    /// create a fresh, empty filesystem on `device`
    pub fn format(device: D, geometry: Geometry) -> Result<Self> {
        Self::from_volume(Volume::format(device, geometry)?)
    }

    /// load the filesystem stored on `device`
    pub fn mount(device: D) -> Result<Self> {
        Self::from_volume(Volume::mount(device)?)
    }

    fn from_volume(mut volume: Volume<D>) -> Result<Self> {
        let root_inode = volume.superblock().root();
        let root = Directory::load(&mut volume, root_inode)?;
        Ok(Self {
            volume,
            root,
            open_files: [None; MAX_OPEN_FILES],
            listing_cursor: 0,
        })
    }

    #[inline]
    pub fn volume(&self) -> &Volume<D> {
        &self.volume
    }

    #[inline]
    pub fn free_blocks(&self) -> u32 {
        self.volume.free_blocks()
    }

    /// unmount, handing the device back
    pub fn into_device(self) -> Result<D> {
        self.volume.into_device()
    }
}

/// descriptor operations
impl<D> SimpleFs<D>
where
    D: BlockDevice,
{
    /// open the file called `name`, creating it if it doesn't exist
    /// # Params
    /// - `name`: the file name, at most [MAX_FILENAME](super::MAX_FILENAME) bytes
    /// # Return
    /// a descriptor positioned at the end of the file
    pub fn open(&mut self, name: &str) -> Result<Fd> {
        info!("open() called with name: {name:?}");
        validate_name(name)?;
        let existing = self.lookup(name);
        if let Some(inode) = existing {
            if self.is_open(inode) {
                return Err(FsError::FileBusy);
            }
        }
        let fd = self
            .open_files
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TooManyOpenFiles)?;

        let inode = match existing {
            Some(inode) => inode,
            None => self.create(name)?,
        };
        let position = self.volume.file_size(inode)?;
        self.open_files[fd] = Some(OpenFile { inode, position });
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        info!("close() called with fd: {fd}");
        self.open_files
            .get_mut(fd)
            .and_then(Option::take)
            .map(|_| ())
            .ok_or(FsError::BadDescriptor(fd))
    }

    /// read from the current position of `fd` into `buf`
    /// # Return
    /// the number of bytes read, `0` at the end of the file
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        info!("read() called with fd: {fd}, size: {}", buf.len());
        let file = self.open_file(fd)?;
        let read = self.volume.read(file.inode, file.position, buf)?;
        self.set_position(fd, file.position + read);
        Ok(read)
    }

    /// write `data` at the current position of `fd`, growing the file as needed
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        info!("write() called with fd: {fd}, size: {}", data.len());
        let file = self.open_file(fd)?;
        let written = self.volume.write(file.inode, file.position, data)?;
        self.set_position(fd, file.position + written);
        Ok(written)
    }

    /// move the position of `fd`, which can't go past the end of the file
    pub fn seek(&mut self, fd: Fd, position: usize) -> Result<()> {
        info!("seek() called with fd: {fd}, position: {position}");
        let file = self.open_file(fd)?;
        if position > self.volume.file_size(file.inode)? {
            return Err(FsError::InvalidArgument("seek past the end of the file"));
        }
        self.set_position(fd, position);
        Ok(())
    }

    /// current position of `fd`
    pub fn tell(&self, fd: Fd) -> Result<usize> {
        Ok(self.open_file(fd)?.position)
    }

    fn open_file(&self, fd: Fd) -> Result<OpenFile> {
        self.open_files
            .get(fd)
            .copied()
            .flatten()
            .ok_or(FsError::BadDescriptor(fd))
    }

    fn set_position(&mut self, fd: Fd, position: usize) {
        if let Some(Some(file)) = self.open_files.get_mut(fd) {
            file.position = position;
        }
    }

    fn is_open(&self, inode: InodeId) -> bool {
        self.open_files
            .iter()
            .flatten()
            .any(|file| file.inode == inode)
    }
}

/// name operations
impl<D> SimpleFs<D>
where
    D: BlockDevice,
{
    /// delete the file called `name` and free its blocks
    pub fn remove(&mut self, name: &str) -> Result<()> {
        info!("remove() called with name: {name:?}");
        validate_name(name)?;
        let Some(slot) = self.root.find(name) else {
            return Err(FsError::FileNotFound(name.to_string()));
        };
        let inode = self.entry_inode(slot, name)?;
        if inode == self.volume.superblock().root() {
            return Err(FsError::InvalidArgument("the root directory can't be removed"));
        }
        if self.is_open(inode) {
            return Err(FsError::FileBusy);
        }

        self.volume.release_blocks(inode)?;
        self.volume.release_inode(inode)?;
        self.root.set(slot, DirEntry::default())?;
        self.root.update(&mut self.volume, slot)
    }

    /// size in bytes of the file called `name`
    pub fn file_size(&self, name: &str) -> Result<usize> {
        let inode = self
            .lookup(name)
            .ok_or_else(|| FsError::FileNotFound(name.to_string()))?;
        self.volume.file_size(inode)
    }

    /// walk the directory one name per call
    ///
    /// returns `None` once every file has been visited, and starts over on the next call
    pub fn next_file_name(&mut self) -> Option<String> {
        while let Some(entry) = self.root.get(self.listing_cursor) {
            self.listing_cursor += 1;
            if entry.is_used() {
                return Some(entry.name.clone());
            }
        }
        self.listing_cursor = 0;
        None
    }

    /// every file with its size, in directory order
    pub fn list(&self) -> Result<Vec<(String, usize)>> {
        self.root
            .iter()
            .map(|entry| {
                let inode = self.entry_inode_of(entry)?;
                Ok((entry.name.clone(), self.volume.file_size(inode)?))
            })
            .collect()
    }

    fn lookup(&self, name: &str) -> Option<InodeId> {
        self.root
            .find(name)
            .and_then(|slot| self.root.get(slot))
            .and_then(|entry| entry.inode)
    }

    fn entry_inode(&self, slot: usize, name: &str) -> Result<InodeId> {
        self.root
            .get(slot)
            .and_then(|entry| entry.inode)
            .ok_or_else(|| FsError::FileNotFound(name.to_string()))
    }

    fn entry_inode_of(&self, entry: &DirEntry) -> Result<InodeId> {
        entry
            .inode
            .ok_or_else(|| FsError::FileNotFound(entry.name.clone()))
    }

    /// take a directory slot and an inode for a new, empty file
    fn create(&mut self, name: &str) -> Result<InodeId> {
        let slot = self.root.free_slot(&mut self.volume)?;
        let inode = self.volume.allocate_inode()?;
        self.volume.update_inode(inode)?;
        self.root.set(slot, DirEntry::new(name, inode))?;
        self.root.update(&mut self.volume, slot)?;
        info!("created file {name:?} with inode {inode} in slot {slot}");
        Ok(inode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        utils::init_test_environment::{init_test_environment, pattern},
        BLOCK_SIZE, MAX_FILENAME,
    };

    #[test]
    fn test_open_creates_empty_file() {
        let mut fs = init_test_environment(64, 4);
        let fd = fs.open("new.txt").unwrap();
        assert_eq!(fs.file_size("new.txt").unwrap(), 0);
        assert_eq!(fs.tell(fd).unwrap(), 0);
        // the first directory block
        assert_eq!(fs.free_blocks(), 63);
        assert!(matches!(
            fs.file_size("missing"),
            Err(FsError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_reopen_appends() {
        let mut fs = init_test_environment(64, 4);
        let fd = fs.open("log").unwrap();
        fs.write(fd, b"hello ").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("log").unwrap();
        assert_eq!(fs.tell(fd).unwrap(), 6);
        fs.write(fd, b"world").unwrap();
        fs.seek(fd, 0).unwrap();
        let mut buf = [0u8; 32];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 11);
        assert_eq!(&buf[..11], b"hello world");
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_open_twice_is_busy() {
        let mut fs = init_test_environment(64, 4);
        let fd = fs.open("a").unwrap();
        assert!(matches!(fs.open("a"), Err(FsError::FileBusy)));
        fs.close(fd).unwrap();
        assert!(fs.open("a").is_ok());
    }

    #[test]
    fn test_open_file_table_is_bounded() {
        let mut fs = init_test_environment(64, 8);
        let fds = (0..MAX_OPEN_FILES)
            .map(|i| fs.open(&format!("f{i}")).unwrap())
            .collect::<Vec<_>>();
        assert!(matches!(
            fs.open("one-too-many"),
            Err(FsError::TooManyOpenFiles)
        ));
        // nothing was created for the refused open
        assert!(fs.file_size("one-too-many").is_err());

        fs.close(fds[3]).unwrap();
        assert_eq!(fs.open("one-too-many").unwrap(), fds[3]);
    }

    #[test]
    fn test_bad_descriptors() {
        let mut fs = init_test_environment(64, 4);
        let fd = fs.open("a").unwrap();
        fs.close(fd).unwrap();
        assert!(matches!(fs.close(fd), Err(FsError::BadDescriptor(_))));
        assert!(matches!(
            fs.write(fd, b"x"),
            Err(FsError::BadDescriptor(_))
        ));
        assert!(matches!(
            fs.read(MAX_OPEN_FILES, &mut [0u8; 4]),
            Err(FsError::BadDescriptor(_))
        ));
    }

    #[test]
    fn test_seek_within_file() {
        let mut fs = init_test_environment(64, 4);
        let fd = fs.open("a").unwrap();
        let data = pattern(3000, 1);
        fs.write(fd, &data).unwrap();

        fs.seek(fd, 1000).unwrap();
        fs.write(fd, &[0u8; 24]).unwrap();
        assert_eq!(fs.tell(fd).unwrap(), 1024);
        fs.seek(fd, 3000).unwrap();
        assert!(matches!(
            fs.seek(fd, 3001),
            Err(FsError::InvalidArgument(_))
        ));

        fs.seek(fd, 990).unwrap();
        let mut buf = [0u8; 40];
        fs.read(fd, &mut buf).unwrap();
        assert_eq!(buf[..10], data[990..1000]);
        assert!(buf[10..34].iter().all(|b| *b == 0));
        assert_eq!(buf[34..], data[1024..1030]);
    }

    #[test]
    fn test_remove_frees_blocks() {
        let mut fs = init_test_environment(256, 4);
        let fd = fs.open("big").unwrap();
        let free = fs.free_blocks();
        fs.write(fd, &pattern(130 * BLOCK_SIZE, 2)).unwrap();
        assert_eq!(fs.free_blocks(), free - 131);

        assert!(matches!(fs.remove("big"), Err(FsError::FileBusy)));
        fs.close(fd).unwrap();
        fs.remove("big").unwrap();
        assert_eq!(fs.free_blocks(), free);
        assert!(matches!(
            fs.remove("big"),
            Err(FsError::FileNotFound(_))
        ));

        // the slot and the inode are both reused
        let fd = fs.open("again").unwrap();
        assert_eq!(fs.tell(fd).unwrap(), 0);
        assert_eq!(fs.list().unwrap(), vec![("again".to_string(), 0)]);
    }

    #[test]
    fn test_next_file_name_wraps() {
        let mut fs = init_test_environment(64, 4);
        for name in ["x", "y", "z"] {
            let fd = fs.open(name).unwrap();
            fs.close(fd).unwrap();
        }
        fs.remove("y").unwrap();

        assert_eq!(fs.next_file_name().as_deref(), Some("x"));
        assert_eq!(fs.next_file_name().as_deref(), Some("z"));
        assert_eq!(fs.next_file_name(), None);
        assert_eq!(fs.next_file_name().as_deref(), Some("x"));
    }

    #[test]
    fn test_invalid_names() {
        let mut fs = init_test_environment(64, 4);
        assert!(matches!(fs.open(""), Err(FsError::InvalidArgument(_))));
        let long = "n".repeat(MAX_FILENAME + 1);
        assert!(matches!(fs.open(&long), Err(FsError::InvalidArgument(_))));
        assert!(fs.open(&long[..MAX_FILENAME]).is_ok());
    }

    #[test]
    fn test_files_survive_remount() {
        let mut fs = init_test_environment(256, 4);
        let first = pattern(5000, 3);
        let second = pattern(200, 4);
        for (name, data) in [("first", &first), ("second", &second)] {
            let fd = fs.open(name).unwrap();
            fs.write(fd, data).unwrap();
            fs.close(fd).unwrap();
        }
        let free = fs.free_blocks();

        let mut fs = SimpleFs::mount(fs.into_device().unwrap()).unwrap();
        assert_eq!(fs.free_blocks(), free);
        assert_eq!(
            fs.list().unwrap(),
            vec![("first".to_string(), 5000), ("second".to_string(), 200)]
        );
        let fd = fs.open("first").unwrap();
        fs.seek(fd, 0).unwrap();
        let mut buf = vec![0u8; 5000];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 5000);
        assert_eq!(buf, first);
    }
}
