//! Width-sharded prime storage.
//!
//! Primes are stored under a single directory, one shard file per byte
//! width, as raw big-endian integers of that width:
//!
//! ```text
//! primes/
//!   primes_1.bin        # 2..=251, one byte each (sealed)
//!   primes_1.manifest   # manifest for the sealed shard
//!   primes_2.bin        # 257..=65521, two bytes each (sealed)
//!   primes_2.manifest
//!   primes_3.bin        # active shard
//!   lock                # advisory lock held by `primes run`
//! ```
//!
//! # Invariants
//!
//! - Every value in `primes_<n>.bin` has a minimal encoding of exactly `n`
//!   bytes, and the file size is a multiple of `n`.
//! - Values are strictly ascending within a shard and across shards.
//! - Once `primes_<n+1>.bin` exists, `primes_<n>.bin` is sealed and never
//!   appended to again. Because of this the number of primes already on
//!   disk is `Σ size(n) / n`, which is all `save` needs to find the delta.
//! - Shards are only ever appended to. Nothing is rewritten or truncated.
//! - Widths are contiguous from 1; a shard after a missing width is corrupt.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::codec::{self, MAX_WIDTH};
use crate::error::ErrorCode;
use crate::io::{FsIo, ShardIo};
use crate::sequence::PrimeSequence;

/// Directory name used when no other store location is configured.
pub const DEFAULT_STORE_DIR: &str = "primes";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while loading, saving or checking a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A shard or sidecar could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A shard, sidecar or the store directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A shard exists for a width the format does not support.
    #[error("shard width {width} is outside 1..=8")]
    WidthOutOfRange { width: usize },

    /// A stored value is 0 or 1.
    #[error("{}: stored value {value} is not a prime", path.display())]
    InvalidValue { path: PathBuf, value: u64 },

    /// A stored value's minimal width differs from its shard width.
    #[error(
        "{}: value {value} needs {actual} byte(s) but the shard width is {width}",
        path.display()
    )]
    WidthMismatch {
        path: PathBuf,
        value: u64,
        width: usize,
        actual: usize,
    },

    /// A shard's size is not a multiple of its width.
    #[error("{}: size {len} is not a multiple of width {width}", path.display())]
    Misaligned {
        path: PathBuf,
        len: u64,
        width: usize,
    },

    /// A stored value does not exceed the one before it.
    #[error("{}: {value} does not follow {previous}", path.display())]
    NotAscending {
        path: PathBuf,
        previous: u64,
        value: u64,
    },

    /// A shard exists after a missing width.
    #[error("shard width {width} exists but width {missing} is missing")]
    Gap { missing: usize, width: usize },

    /// A sealed shard no longer matches its manifest.
    #[error("{shard}: {detail}")]
    ManifestMismatch { shard: String, detail: String },

    /// The store already holds more primes than the sequence being saved.
    #[error("store holds {on_disk} primes but the sequence only has {in_memory}")]
    StoreAhead { on_disk: usize, in_memory: usize },
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::ShardReadFailed,
            Self::Write { .. } => ErrorCode::ShardWriteFailed,
            Self::WidthOutOfRange { .. } => ErrorCode::ShardWidthOutOfRange,
            Self::InvalidValue { .. } => ErrorCode::InvalidStoredValue,
            Self::WidthMismatch { .. } => ErrorCode::ShardWidthMismatch,
            Self::Misaligned { .. } => ErrorCode::ShardSizeMisaligned,
            Self::NotAscending { .. } => ErrorCode::ShardOrderViolation,
            Self::Gap { .. } => ErrorCode::ShardGap,
            Self::ManifestMismatch { .. } => ErrorCode::ShardManifestMismatch,
            Self::StoreAhead { .. } => ErrorCode::StoreAheadOfSequence,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether this error means the stored data itself is malformed, as
    /// opposed to an I/O failure or a caller mistake.
    #[must_use]
    pub const fn is_format_violation(&self) -> bool {
        !matches!(
            self,
            Self::Read { .. } | Self::Write { .. } | Self::StoreAhead { .. }
        )
    }
}

fn read_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    }
}

fn write_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Manifest for a sealed shard, recording integrity metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardManifest {
    /// Shard file name (e.g., `"primes_1.bin"`).
    pub shard_name: String,
    /// Number of primes in the shard.
    pub entry_count: u64,
    /// Total byte length of the shard file.
    pub byte_len: u64,
    /// BLAKE3 hash of the entire shard file contents.
    pub file_hash: String,
}

impl ShardManifest {
    /// Build the manifest describing `content`, the bytes of a width-`width`
    /// shard.
    #[must_use]
    pub fn for_shard(width: usize, content: &[u8]) -> Self {
        Self {
            shard_name: shard_filename(width),
            entry_count: (content.len() / width) as u64,
            byte_len: content.len() as u64,
            file_hash: format!("blake3:{}", blake3::hash(content).to_hex()),
        }
    }

    /// Serialize manifest to a human-readable format.
    #[must_use]
    pub fn to_string_repr(&self) -> String {
        format!(
            "shard: {}\nentry_count: {}\nbyte_len: {}\nfile_hash: {}\n",
            self.shard_name, self.entry_count, self.byte_len, self.file_hash
        )
    }

    /// Parse a manifest from its string representation.
    ///
    /// Returns `None` if required fields are missing or unparseable.
    #[must_use]
    pub fn from_string_repr(s: &str) -> Option<Self> {
        let mut shard_name = None;
        let mut entry_count = None;
        let mut byte_len = None;
        let mut file_hash = None;

        for line in s.lines() {
            if let Some(val) = line.strip_prefix("shard: ") {
                shard_name = Some(val.to_string());
            } else if let Some(val) = line.strip_prefix("entry_count: ") {
                entry_count = val.parse().ok();
            } else if let Some(val) = line.strip_prefix("byte_len: ") {
                byte_len = val.parse().ok();
            } else if let Some(val) = line.strip_prefix("file_hash: ") {
                file_hash = Some(val.to_string());
            }
        }

        Some(Self {
            shard_name: shard_name?,
            entry_count: entry_count?,
            byte_len: byte_len?,
            file_hash: file_hash?,
        })
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of a [`PrimeStore::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// Primes appended by this save.
    pub appended: usize,
    /// Primes on disk after this save.
    pub on_disk: usize,
    /// Widths sealed (manifest written) by this save.
    pub sealed: Vec<usize>,
}

/// Size of one shard on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardSummary {
    pub width: usize,
    pub entries: u64,
    pub bytes: u64,
    /// Whether a higher-width shard exists, closing this one.
    pub sealed: bool,
    /// Whether a manifest sidecar exists for this shard.
    pub has_manifest: bool,
}

/// Store overview built from file sizes and the tail of the last shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub dir: PathBuf,
    pub exists: bool,
    pub shards: Vec<ShardSummary>,
    pub total: u64,
    pub largest: Option<u64>,
}

/// Result of a full [`PrimeStore::verify`] pass.
#[derive(Debug)]
pub struct VerifyReport {
    pub shards: Vec<ShardSummary>,
    /// Primes that decoded cleanly.
    pub checked: u64,
    pub problems: Vec<StoreError>,
}

impl VerifyReport {
    /// Whether the store passed every check.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Shard filename for a given byte width.
#[must_use]
pub fn shard_filename(width: usize) -> String {
    format!("primes_{width}.bin")
}

/// Manifest filename for a given byte width.
#[must_use]
pub fn manifest_filename(width: usize) -> String {
    format!("primes_{width}.manifest")
}

// ---------------------------------------------------------------------------
// PrimeStore
// ---------------------------------------------------------------------------

/// Maps a [`PrimeSequence`] to and from the shard files in one directory.
///
/// The store keeps no copy of the sequence between calls; `load` hands one
/// out and `save` takes one in.
#[derive(Debug, Clone)]
pub struct PrimeStore<I = FsIo> {
    dir: PathBuf,
    io: I,
}

impl PrimeStore<FsIo> {
    /// Store in `dir` on the real filesystem.
    #[must_use]
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, FsIo::new())
    }
}

impl<I: ShardIo> PrimeStore<I> {
    /// Store in `dir` using the given I/O capability.
    ///
    /// Does not touch the filesystem; directories are created by the first
    /// [`save`](Self::save).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, io: I) -> Self {
        Self {
            dir: dir.into(),
            io,
        }
    }

    /// The store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the shard holding primes of `width` bytes.
    #[must_use]
    pub fn shard_path(&self, width: usize) -> PathBuf {
        self.dir.join(shard_filename(width))
    }

    /// Path of the manifest for the shard of `width` bytes.
    #[must_use]
    pub fn manifest_path(&self, width: usize) -> PathBuf {
        self.dir.join(manifest_filename(width))
    }

    /// Path of the advisory lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.dir.join("lock")
    }

    /// Whether the store directory exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.io.dir_exists(&self.dir)
    }

    // -----------------------------------------------------------------------
    // Shard listing
    // -----------------------------------------------------------------------

    /// Widths of the existing shards, `1..=k` with no gaps.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WidthOutOfRange`] if shards run past width 8
    /// and [`StoreError::Gap`] if a shard exists after a missing width.
    pub fn widths(&self) -> Result<Vec<usize>, StoreError> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let mut widths = Vec::new();
        let mut width = 1;
        while self.io.file_exists(&self.shard_path(width)) {
            if width > MAX_WIDTH {
                return Err(StoreError::WidthOutOfRange { width });
            }
            widths.push(width);
            width += 1;
        }

        let missing = width;
        if let Some(stray) = (missing + 1..=MAX_WIDTH + 1)
            .find(|&w| self.io.file_exists(&self.shard_path(w)))
        {
            return Err(StoreError::Gap {
                missing,
                width: stray,
            });
        }

        Ok(widths)
    }

    fn aligned_len(&self, width: usize) -> Result<u64, StoreError> {
        let path = self.shard_path(width);
        let len = self.io.file_size(&path).map_err(read_err(&path))?;
        if len % width as u64 != 0 {
            return Err(StoreError::Misaligned { path, len, width });
        }
        Ok(len)
    }

    /// Number of primes already on disk.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a shard cannot be sized or its size is not
    /// a multiple of its width.
    pub fn durable_count(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        for width in self.widths()? {
            count += (self.aligned_len(width)? / width as u64) as usize;
        }
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Read every shard back into a sequence, in width order.
    ///
    /// Returns an empty sequence when the store directory does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] on I/O failure, and a format violation
    /// (see [`StoreError::is_format_violation`]) if any shard is out of
    /// range, misaligned, holds 0 or 1, holds a value of the wrong width,
    /// or breaks ascending order.
    pub fn load(&self) -> Result<PrimeSequence, StoreError> {
        let widths = self.widths()?;
        if widths.is_empty() {
            debug!(dir = %self.dir.display(), "no stored primes");
            return Ok(PrimeSequence::new());
        }

        let mut capacity = 0;
        for &width in &widths {
            capacity += (self.aligned_len(width)? / width as u64) as usize;
        }
        let mut primes = PrimeSequence::with_capacity(capacity);

        for width in widths {
            let path = self.shard_path(width);
            let content = self.io.read_file(&path).map_err(read_err(&path))?;
            if content.len() % width != 0 {
                return Err(StoreError::Misaligned {
                    path,
                    len: content.len() as u64,
                    width,
                });
            }

            for chunk in content.chunks_exact(width) {
                let value = codec::decode(chunk);
                check_value(&path, width, value)?;
                primes.push(value).map_err(|e| StoreError::NotAscending {
                    path: path.clone(),
                    previous: e.last.unwrap_or(0),
                    value,
                })?;
            }

            debug!(
                shard = %path.display(),
                entries = content.len() / width,
                "loaded shard"
            );
        }

        Ok(primes)
    }

    // -----------------------------------------------------------------------
    // Save
    // -----------------------------------------------------------------------

    /// Append every prime of `primes` not yet on disk.
    ///
    /// The number already stored is recomputed from shard sizes, so calling
    /// this again with the same sequence appends nothing, and calling it
    /// after the sequence has grown appends only the new tail. Bytes are
    /// grouped by width and appended once per width.
    ///
    /// Widths the sequence skips are written as empty shards. Every shard
    /// below the top width that has no manifest yet is sealed by writing
    /// one, so a manifest lost to an interrupted save is filled in later.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] on I/O failure, a format violation if
    /// the existing shards are malformed, or [`StoreError::StoreAhead`] if
    /// the store holds more primes than `primes`.
    pub fn save(&self, primes: &PrimeSequence) -> Result<SaveReport, StoreError> {
        if !self.exists() {
            self.io.create_dir(&self.dir).map_err(write_err(&self.dir))?;
        }

        let existing = self.widths()?;
        let mut on_disk = 0;
        for &width in &existing {
            on_disk += (self.aligned_len(width)? / width as u64) as usize;
        }

        if on_disk > primes.len() {
            return Err(StoreError::StoreAhead {
                on_disk,
                in_memory: primes.len(),
            });
        }

        let delta = &primes[on_disk..];
        let mut by_width: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
        for &prime in delta {
            let width = codec::byte_width(prime);
            codec::encode_into(prime, by_width.entry(width).or_default());
        }

        // Widths skipped by the delta get an empty shard so the set stays
        // contiguous from 1.
        let top = existing.last().copied().unwrap_or(0);
        let new_top = by_width.keys().next_back().copied().unwrap_or(top).max(top);
        for width in top + 1..new_top {
            by_width.entry(width).or_default();
        }

        for (width, bytes) in by_width {
            let path = self.shard_path(width);
            self.io
                .append_bytes(&path, &bytes)
                .map_err(write_err(&path))?;
            debug!(
                shard = %path.display(),
                appended = bytes.len() / width,
                "appended primes"
            );
        }

        let sealed = self.seal_below(new_top)?;

        Ok(SaveReport {
            appended: delta.len(),
            on_disk: on_disk + delta.len(),
            sealed,
        })
    }

    fn seal_below(&self, width: usize) -> Result<Vec<usize>, StoreError> {
        let mut sealed = Vec::new();
        for lower in 1..width {
            if !self.io.file_exists(&self.shard_path(lower))
                || self.io.file_exists(&self.manifest_path(lower))
            {
                continue;
            }
            let manifest = self.write_manifest(lower)?;
            info!(
                shard = %manifest.shard_name,
                entries = manifest.entry_count,
                "sealed shard"
            );
            sealed.push(lower);
        }
        Ok(sealed)
    }

    // -----------------------------------------------------------------------
    // Manifest generation
    // -----------------------------------------------------------------------

    /// Generate and write the manifest for the shard of `width` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the shard cannot be read or the manifest
    /// cannot be written.
    pub fn write_manifest(&self, width: usize) -> Result<ShardManifest, StoreError> {
        let shard_path = self.shard_path(width);
        let content = self
            .io
            .read_file(&shard_path)
            .map_err(read_err(&shard_path))?;
        let manifest = ShardManifest::for_shard(width, &content);

        let manifest_path = self.manifest_path(width);
        self.io
            .write_file(&manifest_path, manifest.to_string_repr().as_bytes())
            .map_err(write_err(&manifest_path))?;
        Ok(manifest)
    }

    /// Read the manifest for the shard of `width` bytes, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the manifest exists but cannot be read.
    pub fn read_manifest(&self, width: usize) -> Result<Option<ShardManifest>, StoreError> {
        let path = self.manifest_path(width);
        if !self.io.file_exists(&path) {
            return Ok(None);
        }
        let bytes = self.io.read_file(&path).map_err(read_err(&path))?;
        Ok(ShardManifest::from_string_repr(&String::from_utf8_lossy(
            &bytes,
        )))
    }

    // -----------------------------------------------------------------------
    // Summary
    // -----------------------------------------------------------------------

    /// Shard sizes, total count and largest prime, without decoding the
    /// whole store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the shard layout is malformed or a shard
    /// cannot be read.
    pub fn summary(&self) -> Result<StoreSummary, StoreError> {
        let widths = self.widths()?;
        let top = widths.last().copied();

        let mut shards = Vec::with_capacity(widths.len());
        for &width in &widths {
            let bytes = self.aligned_len(width)?;
            shards.push(ShardSummary {
                width,
                entries: bytes / width as u64,
                bytes,
                sealed: Some(width) != top,
                has_manifest: self.io.file_exists(&self.manifest_path(width)),
            });
        }

        let largest = match shards.iter().rev().find(|s| s.entries > 0) {
            Some(shard) => {
                let path = self.shard_path(shard.width);
                let tail = self
                    .io
                    .read_tail(&path, shard.width)
                    .map_err(read_err(&path))?;
                Some(codec::decode(&tail))
            }
            None => None,
        };

        Ok(StoreSummary {
            dir: self.dir.clone(),
            exists: self.exists(),
            total: shards.iter().map(|s| s.entries).sum(),
            shards,
            largest,
        })
    }

    // -----------------------------------------------------------------------
    // Verify
    // -----------------------------------------------------------------------

    /// Check every shard and collect all format problems instead of stopping
    /// at the first one.
    ///
    /// Each shard contributes at most one value-level problem; scanning that
    /// shard stops there but later shards are still checked. Sealed shards
    /// with a manifest are compared against it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] only when a file cannot be read at all.
    pub fn verify(&self) -> Result<VerifyReport, StoreError> {
        let mut report = VerifyReport {
            shards: Vec::new(),
            checked: 0,
            problems: Vec::new(),
        };
        if !self.exists() {
            return Ok(report);
        }

        let present: Vec<usize> = (1..=MAX_WIDTH + 1)
            .filter(|&w| self.io.file_exists(&self.shard_path(w)))
            .collect();
        let top = present.last().copied();

        let mut expected = 1;
        for &width in &present {
            if width != expected {
                report.problems.push(StoreError::Gap {
                    missing: expected,
                    width,
                });
            }
            expected = width + 1;
        }
        if top == Some(MAX_WIDTH + 1) {
            report.problems.push(StoreError::WidthOutOfRange {
                width: MAX_WIDTH + 1,
            });
        }

        let mut previous: Option<u64> = None;
        for width in present.into_iter().filter(|&w| w <= MAX_WIDTH) {
            let path = self.shard_path(width);
            let content = self.io.read_file(&path).map_err(read_err(&path))?;
            let len = content.len() as u64;

            if content.len() % width != 0 {
                report.problems.push(StoreError::Misaligned {
                    path: path.clone(),
                    len,
                    width,
                });
            }

            for chunk in content.chunks_exact(width) {
                let value = codec::decode(chunk);
                if let Err(problem) = check_value(&path, width, value) {
                    report.problems.push(problem);
                    break;
                }
                if let Some(prev) = previous.filter(|&prev| value <= prev) {
                    report.problems.push(StoreError::NotAscending {
                        path: path.clone(),
                        previous: prev,
                        value,
                    });
                    break;
                }
                previous = Some(value);
                report.checked += 1;
            }

            let manifest = self.read_manifest(width)?;
            if let Some(manifest) = &manifest {
                if let Some(detail) = manifest_drift(manifest, width, &content) {
                    report.problems.push(StoreError::ManifestMismatch {
                        shard: shard_filename(width),
                        detail,
                    });
                }
            }

            report.shards.push(ShardSummary {
                width,
                entries: len / width as u64,
                bytes: len,
                sealed: Some(width) != top,
                has_manifest: manifest.is_some(),
            });
        }

        Ok(report)
    }
}

fn check_value(path: &Path, width: usize, value: u64) -> Result<(), StoreError> {
    if value <= 1 {
        return Err(StoreError::InvalidValue {
            path: path.to_path_buf(),
            value,
        });
    }
    let actual = codec::byte_width(value);
    if actual != width {
        return Err(StoreError::WidthMismatch {
            path: path.to_path_buf(),
            value,
            width,
            actual,
        });
    }
    Ok(())
}

fn manifest_drift(manifest: &ShardManifest, width: usize, content: &[u8]) -> Option<String> {
    let actual = ShardManifest::for_shard(width, content);
    if manifest.byte_len != actual.byte_len {
        Some(format!(
            "manifest records {} bytes, shard has {}",
            manifest.byte_len, actual.byte_len
        ))
    } else if manifest.entry_count != actual.entry_count {
        Some(format!(
            "manifest records {} entries, shard has {}",
            manifest.entry_count, actual.entry_count
        ))
    } else if manifest.file_hash != actual.file_hash {
        Some("shard contents changed since it was sealed".to_string())
    } else {
        None
    }
}
