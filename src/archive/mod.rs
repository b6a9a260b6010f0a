//! Read access to an exported archive.
//!
//! The resolver never touches `std::fs` directly. It reads through the
//! [`Archive`] trait, which has two implementations:
//!
//! | Type | Backing store |
//! |------|---------------|
//! | [`FsArchive`] | an extracted takeout directory on disk |
//! | [`MemArchive`] | an in-memory file map (tests, embedders that unpacked elsewhere) |
//!
//! All paths are archive-relative and `/`-separated. The root directory is
//! the empty string.

mod filter;
pub mod fs;
pub mod memory;

pub use filter::WalkFilter;
pub use fs::FsArchive;
pub use memory::MemArchive;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ArchiveError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
}

/// Read-only view of an archive tree.
///
/// `Sync` so directories can be matched on the rayon pool.
pub trait Archive: Sync {
    /// Immediate children of `dir`, sorted by name.
    fn list_directory(&self, dir: &str) -> Result<Vec<DirEntry>, ArchiveError>;

    /// Full contents of the file at `path`.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, ArchiveError>;

    fn stat(&self, path: &str) -> Result<FileStat, ArchiveError>;
}
