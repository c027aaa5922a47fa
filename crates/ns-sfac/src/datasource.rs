//! Raw bytes of a table document before parsing.

use std::fs::File;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Where the bytes of a table document live while it is parsed.
///
/// A table file is mapped read-only (`TableFile::open`) or handed over as a
/// buffer (`TableFile::from_bytes`). The bytes are only needed until the
/// document is parsed; dropping the value unmaps the file.
pub enum DataSource {
    /// Caller-supplied buffer.
    Owned(Vec<u8>),
    /// Read-only mapping of a table file.
    Mmap(memmap2::Mmap),
}

impl DataSource {
    /// Map the table file at `path`.
    pub fn map(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and lives only while the document is
        // parsed; table files are not rewritten during provider construction.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(DataSource::Mmap(mmap))
    }

    /// Whether the bytes come from a file mapping.
    pub fn is_mapped(&self) -> bool {
        matches!(self, DataSource::Mmap(_))
    }

    /// Document bytes.
    pub fn bytes(&self) -> &[u8] {
        match self {
            DataSource::Owned(v) => v,
            DataSource::Mmap(m) => m,
        }
    }

    /// Deserialize the whole document.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(self.bytes())?)
    }
}
