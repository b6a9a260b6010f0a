//! Archive backed by an extracted takeout directory.

use super::{Archive, ArchiveError, DirEntry, FileStat};
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }
}

impl Archive for FsArchive {
    fn list_directory(&self, dir: &str) -> Result<Vec<DirEntry>, ArchiveError> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(self.resolve(dir))
            .min_depth(1)
            .max_depth(1)
            // A symlinked directory is listed as a plain entry and never
            // descended into, so a link back to an ancestor cannot loop.
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry?;
            entries.push(DirEntry {
                // Non-UTF-8 names cannot be matched against sidecar titles anyway
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: entry.file_type().is_dir(),
            });
        }
        Ok(entries)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, ArchiveError> {
        std::fs::read(self.resolve(path)).map_err(|e| ArchiveError::io(path, e))
    }

    fn stat(&self, path: &str) -> Result<FileStat, ArchiveError> {
        let meta = std::fs::metadata(self.resolve(path)).map_err(|e| ArchiveError::io(path, e))?;
        Ok(FileStat { size: meta.len() })
    }
}
