//! Stage one: a single traversal of the archive.
//!
//! Produces every directory listing (files sized and classified by name) and
//! the album table, before any matching starts. Matching never depends on the
//! order directories were visited in.
//!
//! A directory is classified as:
//!
//! | Kind | Rule | Descriptor |
//! |------|------|------------|
//! | year bucket | name matches an `albums.year_bucket_patterns` regex | `is_year_bucket = true`, named after the directory |
//! | named album | holds an album-definition sidecar | named by the sidecar title, directory name if empty |
//! | folder album | `albums.folder_albums` and holds media | named after the directory |
//! | plain | anything else | none |
//!
//! The year-bucket rule wins over an album sidecar.

use crate::archive::{Archive, ArchiveError, WalkFilter};
use crate::config::{AlbumsConfig, ConfigError};
use crate::naming::{self, Classifier, EntryKind, SidecarKind};
use crate::report::{Issue, IssueKind, Report};
use crate::resolve::CancelToken;
use crate::sidecar::{self, SidecarDocument};
use crate::types::{AlbumDescriptor, ArchiveEntry};
use log::{debug, info};
use regex::Regex;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("cannot list archive root: {0}")]
    RootUnreadable(#[source] ArchiveError),
    #[error("indexing cancelled")]
    Cancelled,
}

/// Files of one directory that survived the walk filter and have a known
/// kind, sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryListing {
    pub path: String,
    pub files: Vec<ArchiveEntry>,
    /// Path of the sidecar that defines this directory's album, if any.
    pub album_definition: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    directories: BTreeMap<String, DirectoryListing>,
    albums: BTreeMap<String, AlbumDescriptor>,
}

impl ArchiveIndex {
    /// Listings in directory-path order.
    pub fn directories(&self) -> impl Iterator<Item = &DirectoryListing> {
        self.directories.values()
    }

    pub fn directory(&self, path: &str) -> Option<&DirectoryListing> {
        self.directories.get(path)
    }

    /// Album descriptor of the directory at `path`.
    pub fn album(&self, path: &str) -> Option<&AlbumDescriptor> {
        self.albums.get(path)
    }

    pub fn albums(&self) -> impl Iterator<Item = &AlbumDescriptor> {
        self.albums.values()
    }

    pub fn file_count(&self) -> usize {
        self.directories.values().map(|d| d.files.len()).sum()
    }
}

/// Compiled album classification rules.
#[derive(Debug, Clone)]
pub struct AlbumRules {
    pub year_buckets: Vec<Regex>,
    pub folder_albums: bool,
}

impl AlbumRules {
    pub fn from_config(config: &AlbumsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            year_buckets: config.year_bucket_regexes()?,
            folder_albums: config.folder_albums,
        })
    }

    pub fn is_year_bucket(&self, dir_name: &str) -> bool {
        self.year_buckets.iter().any(|re| re.is_match(dir_name))
    }
}

/// Walk the whole archive once.
///
/// Only a failure to list the root is fatal. Unreadable subdirectories and
/// files that cannot be stat'ed are recorded on `report` and skipped.
pub fn build_index<A: Archive + ?Sized>(
    archive: &A,
    filter: &WalkFilter,
    classifier: &Classifier,
    rules: &AlbumRules,
    report: &Report,
    cancel: &CancelToken,
) -> Result<ArchiveIndex, IndexError> {
    let mut index = ArchiveIndex::default();
    let mut queue = VecDeque::from([String::new()]);

    while let Some(dir) = queue.pop_front() {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let entries = match archive.list_directory(&dir) {
            Ok(entries) => entries,
            Err(e) if dir.is_empty() => return Err(IndexError::RootUnreadable(e)),
            Err(e) => {
                report.record_issue(Issue::new(
                    dir.as_str(),
                    IssueKind::ArchiveRead {
                        error: e.to_string(),
                    },
                ));
                continue;
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = naming::join(&dir, &entry.name);
            if entry.is_dir {
                if filter.skip_directory(&path, &entry.name) {
                    debug!("skipping directory {path}");
                } else {
                    queue.push_back(path);
                }
                continue;
            }
            if !filter.accept_file(&entry.name)
                || classifier.classify(&entry.name) == EntryKind::Ignored
            {
                continue;
            }
            match archive.stat(&path) {
                Ok(stat) => files.push(ArchiveEntry {
                    path,
                    directory: dir.clone(),
                    base_name: entry.name,
                    size: stat.size,
                }),
                Err(e) => report.record_issue(Issue::new(
                    path,
                    IssueKind::ArchiveRead {
                        error: e.to_string(),
                    },
                )),
            }
        }
        files.sort_by(|a, b| a.base_name.cmp(&b.base_name));

        let album = find_album_definition(archive, &files, classifier);
        let descriptor = classify_directory(&dir, &files, album.as_ref(), classifier, rules);
        if let Some(descriptor) = descriptor {
            debug!(
                "{dir:?} is {} {:?}",
                if descriptor.is_year_bucket { "year bucket" } else { "album" },
                descriptor.album_name
            );
            index.albums.insert(dir.clone(), descriptor);
        }
        index.directories.insert(
            dir.clone(),
            DirectoryListing {
                path: dir,
                files,
                album_definition: album.map(|(path, _)| path),
            },
        );
    }

    info!(
        "indexed {} directories, {} files, {} albums",
        index.directories.len(),
        index.file_count(),
        index.albums.len()
    );
    Ok(index)
}

/// First JSON file (by name) whose key carries no media extension and whose
/// content is an album document. Returns its path and title.
fn find_album_definition<A: Archive + ?Sized>(
    archive: &A,
    files: &[ArchiveEntry],
    classifier: &Classifier,
) -> Option<(String, String)> {
    files
        .iter()
        .filter(|f| classifier.classify(&f.base_name) == EntryKind::Sidecar(SidecarKind::Json))
        .filter(|f| {
            naming::parse_sidecar_name(&f.base_name, classifier)
                .is_some_and(|s| !classifier.has_media_extension(&s.key))
        })
        .find_map(|f| {
            let bytes = archive.read_file(&f.path).ok()?;
            match sidecar::parse_document(&bytes).ok()? {
                SidecarDocument::Album(album) => Some((f.path.clone(), album.title)),
                SidecarDocument::Media(_) => None,
            }
        })
}

fn classify_directory(
    dir: &str,
    files: &[ArchiveEntry],
    album: Option<&(String, String)>,
    classifier: &Classifier,
    rules: &AlbumRules,
) -> Option<AlbumDescriptor> {
    if dir.is_empty() {
        return None;
    }
    let dir_name = naming::base_name(dir);
    let descriptor = |name: &str, is_year_bucket| AlbumDescriptor {
        directory_path: dir.to_string(),
        album_name: name.to_string(),
        is_year_bucket,
    };

    if rules.is_year_bucket(dir_name) {
        return Some(descriptor(dir_name, true));
    }
    if let Some((_, title)) = album {
        let name = if title.trim().is_empty() { dir_name } else { title.as_str() };
        return Some(descriptor(name, false));
    }
    let has_media = files.iter().any(|f| classifier.has_media_extension(&f.base_name));
    (rules.folder_albums && has_media).then(|| descriptor(dir_name, false))
}
