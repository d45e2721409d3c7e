//! File-I/O capability the prime store is written against.
//!
//! The store never touches `std::fs` directly. It goes through [`ShardIo`],
//! which has two implementations:
//!
//! - [`FsIo`]: the real filesystem. Appends use `O_APPEND` + `write_all` +
//!   `flush`, plus `sync_data` when constructed as durable.
//! - [`MemIo`]: a path → bytes map. Clones share the same map, so a test can
//!   keep a handle and inspect what the store wrote.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Primitive file operations consumed by [`PrimeStore`](crate::shard::PrimeStore).
pub trait ShardIo {
    /// Whether `dir` exists as a directory.
    fn dir_exists(&self, dir: &Path) -> bool;

    /// Create `dir` and any missing parents. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory cannot be created.
    fn create_dir(&self, dir: &Path) -> io::Result<()>;

    /// Whether `path` exists as a file.
    fn file_exists(&self, path: &Path) -> bool;

    /// Size of the file at `path` in bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file is missing or unreadable.
    fn file_size(&self, path: &Path) -> io::Result<u64>;

    /// Full contents of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file is missing or unreadable.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// The last `len` bytes of the file at `path` (fewer if the file is
    /// shorter).
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file is missing or unreadable.
    fn read_tail(&self, path: &Path, len: usize) -> io::Result<Vec<u8>> {
        let bytes = self.read_file(path)?;
        let start = bytes.len().saturating_sub(len);
        Ok(bytes[start..].to_vec())
    }

    /// Append `bytes` to the file at `path`, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error on open or write failure.
    fn append_bytes(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Replace the contents of the file at `path`. Only used for sidecar
    /// files; shards themselves are append-only.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error on write failure.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// [`ShardIo`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsIo {
    durable: bool,
}

impl FsIo {
    /// Filesystem I/O that flushes appends but leaves syncing to the OS.
    #[must_use]
    pub const fn new() -> Self {
        Self { durable: false }
    }

    /// Filesystem I/O that calls `sync_data` after every append.
    #[must_use]
    pub const fn durable() -> Self {
        Self { durable: true }
    }
}

impl ShardIo for FsIo {
    fn dir_exists(&self, dir: &Path) -> bool {
        dir.is_dir()
    }

    fn create_dir(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_tail(&self, path: &Path, len: usize) -> io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        file.seek(SeekFrom::Start(size.saturating_sub(len as u64)))?;
        let mut buf = Vec::with_capacity(len);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn append_bytes(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(bytes)?;
        file.flush()?;
        if self.durable {
            file.sync_data()?;
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::write(path, bytes)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemState {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

/// [`ShardIo`] backed by an in-memory map. Single-threaded.
#[derive(Debug, Clone, Default)]
pub struct MemIo {
    state: Rc<RefCell<MemState>>,
}

impl MemIo {
    /// Empty in-memory filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the bytes stored at `path`, if any.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.state.borrow().files.get(path).cloned()
    }

    /// Store `bytes` at `path` directly, creating its parent directory.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut state = self.state.borrow_mut();
        if let Some(parent) = path.parent() {
            state.dirs.insert(parent.to_path_buf());
        }
        state.files.insert(path, bytes.into());
    }

    /// Every file path currently stored, in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state.borrow().files.keys().cloned().collect()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", path.display()),
    )
}

impl ShardIo for MemIo {
    fn dir_exists(&self, dir: &Path) -> bool {
        self.state.borrow().dirs.contains(dir)
    }

    fn create_dir(&self, dir: &Path) -> io::Result<()> {
        self.state.borrow_mut().dirs.insert(dir.to_path_buf());
        Ok(())
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.state.borrow().files.contains_key(path)
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        self.state
            .borrow()
            .files
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| not_found(path))
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.get(path).ok_or_else(|| not_found(path))
    }

    fn append_bytes(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !state.dirs.contains(parent) {
                return Err(not_found(parent));
            }
        }
        state
            .files
            .entry(path.to_path_buf())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.state
            .borrow_mut()
            .files
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}
