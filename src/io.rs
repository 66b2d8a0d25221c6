//! Memory-mapped file loading.
//!
//! Section and string-table data is referenced by slice directly into the
//! mapping rather than copied, so a `FileMap` must outlive every reader
//! borrowing from it.

use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{DumpError, Result};

/// A read-only memory mapping of one object file.
pub struct FileMap {
    path: PathBuf,
    mmap: Mmap,
}

impl FileMap {
    /// Open a file and map it read-only.
    ///
    /// Fails if the path cannot be opened or mapped, or the file is empty
    /// (an empty file cannot be an object file, and mmap rejects it anyway).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;

        debug!(path = %path.display(), size = len, "mapping object file");

        if len == 0 {
            return Err(DumpError::FileTooSmall(0));
        }

        // Safety: read-only map of a regular file; we never hand out
        // mutable access and the map is dropped with self.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    /// Path the mapping was created from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The mapped bytes.
    pub fn data(&self) -> &[u8] {
        &self.mmap
    }
}
