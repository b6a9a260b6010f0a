//! In-memory archive.
//!
//! Directories exist implicitly as ancestors of added files, or explicitly via
//! [`MemArchive::add_dir`]. Paths can be marked unreadable to exercise the
//! per-entry error handling.

use super::{Archive, ArchiveError, DirEntry, FileStat};
use std::collections::{BTreeMap, BTreeSet};
use std::io;

#[derive(Debug, Clone, Default)]
pub struct MemArchive {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    unreadable: BTreeSet<String>,
}

impl MemArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: &str, content: impl Into<Vec<u8>>) -> &mut Self {
        let path = path.trim_matches('/');
        self.register_ancestors(path);
        self.files.insert(path.to_string(), content.into());
        self
    }

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        let path = path.trim_matches('/');
        self.register_ancestors(path);
        self.dirs.insert(path.to_string());
        self
    }

    /// Make listing, reading, or stat-ing `path` fail with a permission error.
    pub fn fail_on(&mut self, path: &str) -> &mut Self {
        self.unreadable.insert(path.trim_matches('/').to_string());
        self
    }

    fn register_ancestors(&mut self, path: &str) {
        let mut end = 0;
        while let Some(pos) = path[end..].find('/') {
            end += pos;
            self.dirs.insert(path[..end].to_string());
            end += 1;
        }
    }

    fn check_readable(&self, path: &str) -> Result<(), ArchiveError> {
        if self.unreadable.contains(path) {
            return Err(ArchiveError::io(
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "marked unreadable"),
            ));
        }
        Ok(())
    }
}

impl Archive for MemArchive {
    fn list_directory(&self, dir: &str) -> Result<Vec<DirEntry>, ArchiveError> {
        self.check_readable(dir)?;
        if !dir.is_empty() && !self.dirs.contains(dir) {
            return Err(ArchiveError::NotFound(dir.to_string()));
        }
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let mut children: BTreeMap<&str, bool> = BTreeMap::new();
        let files = self.files.keys().map(|p| (p, false));
        let dirs = self.dirs.iter().map(|p| (p, true));
        for (path, is_dir) in files.chain(dirs) {
            let Some(rest) = path.strip_prefix(prefix.as_str()) else {
                continue;
            };
            match rest.find('/') {
                Some(pos) => {
                    children.insert(&rest[..pos], true);
                }
                None if !rest.is_empty() => {
                    children.entry(rest).or_insert(is_dir);
                }
                None => {}
            }
        }

        Ok(children
            .into_iter()
            .map(|(name, is_dir)| DirEntry {
                name: name.to_string(),
                is_dir,
            })
            .collect())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, ArchiveError> {
        self.check_readable(path)?;
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(path.to_string()))
    }

    fn stat(&self, path: &str) -> Result<FileStat, ArchiveError> {
        self.check_readable(path)?;
        self.files
            .get(path)
            .map(|content| FileStat {
                size: content.len() as u64,
            })
            .ok_or_else(|| ArchiveError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[DirEntry]) -> Vec<(&str, bool)> {
        entries.iter().map(|e| (e.name.as_str(), e.is_dir)).collect()
    }

    #[test]
    fn ancestors_become_directories() {
        let mut archive = MemArchive::new();
        archive.add_file("Takeout/Google Photos/Album/a.jpg", "x");

        assert_eq!(
            names(&archive.list_directory("").unwrap()),
            vec![("Takeout", true)]
        );
        assert_eq!(
            names(&archive.list_directory("Takeout/Google Photos").unwrap()),
            vec![("Album", true)]
        );
        assert_eq!(
            names(&archive.list_directory("Takeout/Google Photos/Album").unwrap()),
            vec![("a.jpg", false)]
        );
    }

    #[test]
    fn sibling_prefixes_do_not_leak() {
        let mut archive = MemArchive::new();
        archive.add_file("Album/a.jpg", "x");
        archive.add_file("Album 2/b.jpg", "y");

        assert_eq!(
            names(&archive.list_directory("Album").unwrap()),
            vec![("a.jpg", false)]
        );
    }

    #[test]
    fn empty_directories_are_listed() {
        let mut archive = MemArchive::new();
        archive.add_dir("Empty");
        assert_eq!(names(&archive.list_directory("").unwrap()), vec![("Empty", true)]);
        assert!(archive.list_directory("Empty").unwrap().is_empty());
    }

    #[test]
    fn stat_and_read() {
        let mut archive = MemArchive::new();
        archive.add_file("a.jpg", vec![1u8, 2, 3]);
        assert_eq!(archive.stat("a.jpg").unwrap().size, 3);
        assert_eq!(archive.read_file("a.jpg").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            archive.read_file("b.jpg"),
            Err(ArchiveError::NotFound(_))
        ));
    }

    #[test]
    fn unreadable_paths_fail() {
        let mut archive = MemArchive::new();
        archive.add_file("Album/a.jpg", "x").fail_on("Album/a.jpg");
        assert!(matches!(
            archive.read_file("Album/a.jpg"),
            Err(ArchiveError::Io { .. })
        ));
        assert!(archive.stat("Album/a.jpg").is_err());
        // Listing the parent still works.
        assert_eq!(archive.list_directory("Album").unwrap().len(), 1);
    }
}
