use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::SCRATCH_DIR_PREFIX;

static NEXT_SCRATCH_ID: AtomicU64 = AtomicU64::new(0);

/// Scratch directory with automatic cleanup
///
/// The directory and everything in it is removed on drop unless
/// [`keep_on_drop`](ScratchDir::keep_on_drop) was called. A scratch dir owned
/// by an abandoned workload is never dropped and stays on disk.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl ScratchDir {
    /// Create a uniquely named directory inside `parent`
    pub fn create_in(parent: &Path) -> io::Result<Self> {
        let id = NEXT_SCRATCH_ID.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}{}_{}", SCRATCH_DIR_PREFIX, process::id(), id);
        let path = parent.join(name);

        fs::create_dir_all(&path)?;
        debug!(path = %path.display(), "created scratch directory");

        Ok(Self {
            path,
            cleanup_on_drop: true,
        })
    }

    /// Disable automatic cleanup (for debugging)
    pub fn keep_on_drop(&mut self) {
        self.cleanup_on_drop = false;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Write `data` to a new file and force it to disk
pub fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Write `block` `count` times back to back into a new file, then sync
pub fn write_blocks(path: &Path, block: &[u8], count: u64) -> io::Result<()> {
    let mut file = File::create(path)?;
    for _ in 0..count {
        file.write_all(block)?;
    }
    file.sync_all()
}

/// Read a whole file back
pub fn read_all(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Write `block` at each offset of an existing file, then sync
pub fn write_at_offsets(path: &Path, block: &[u8], offsets: &[u64]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    for &offset in offsets {
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(block)?;
    }
    file.sync_all()
}

/// Read `buf.len()` bytes at each offset; returns bytes read
pub fn read_at_offsets(path: &Path, buf: &mut [u8], offsets: &[u64]) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut total = 0u64;
    for &offset in offsets {
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        total += buf.len() as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scratch_dir_cleanup() {
        let parent = tempdir().unwrap();
        let scratch = ScratchDir::create_in(parent.path()).unwrap();
        write_synced(&scratch.file("a.dat"), b"hello").unwrap();

        let path = scratch.path().to_owned();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_DIR_PREFIX));

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_dir_keep_on_drop() {
        let parent = tempdir().unwrap();
        let mut scratch = ScratchDir::create_in(parent.path()).unwrap();
        scratch.keep_on_drop();

        let path = scratch.path().to_owned();
        drop(scratch);
        assert!(path.exists());
    }

    #[test]
    fn test_unique_names() {
        let parent = tempdir().unwrap();
        let a = ScratchDir::create_in(parent.path()).unwrap();
        let b = ScratchDir::create_in(parent.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_offset_io() {
        let parent = tempdir().unwrap();
        let scratch = ScratchDir::create_in(parent.path()).unwrap();
        let path = scratch.file("data.dat");

        write_synced(&path, &[0u8; 64]).unwrap();
        write_at_offsets(&path, &[7u8; 8], &[0, 32]).unwrap();

        let data = read_all(&path).unwrap();
        assert_eq!(data.len(), 64);
        assert_eq!(&data[0..8], &[7u8; 8]);
        assert_eq!(&data[8..32], &[0u8; 24]);
        assert_eq!(&data[32..40], &[7u8; 8]);

        let mut buf = [0u8; 8];
        assert_eq!(read_at_offsets(&path, &mut buf, &[32, 56]).unwrap(), 16);
        assert_eq!(buf, [0u8; 8]);
    }

    #[test]
    fn test_write_blocks() {
        let parent = tempdir().unwrap();
        let scratch = ScratchDir::create_in(parent.path()).unwrap();
        let path = scratch.file("seq.dat");

        write_blocks(&path, &[1u8, 2, 3, 4], 3).unwrap();
        assert_eq!(read_all(&path).unwrap(), vec![1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]);

        // Past the end of the file
        let mut buf = [0u8; 4];
        assert!(read_at_offsets(&path, &mut buf, &[10]).is_err());
    }
}
