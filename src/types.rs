//! Types shared between the resolver stages and handed to the caller.
//!
//! [`ArchiveEntry`] and [`AlbumDescriptor`] come out of the index stage and are
//! immutable from then on. [`AssetRecord`] is the emitted unit: one per
//! logical asset after duplicate merging.

use crate::date::DateSource;
use crate::report::Issue;
use crate::sidecar::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A file as listed in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Archive-relative path (`Takeout/Google Photos/Album/IMG_1.jpg`).
    pub path: String,
    /// Parent directory, `""` for the root.
    pub directory: String,
    pub base_name: String,
    pub size: u64,
}

/// How a directory contributes album membership to the media it holds.
///
/// Ordered by directory path first, so record album sets print in archive
/// order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlbumDescriptor {
    pub directory_path: String,
    pub album_name: String,
    /// Year buckets (`Photos from 2023`) are not real albums.
    pub is_year_bucket: bool,
}

/// How a record got its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    /// A sidecar was matched to the media directly.
    Matched,
    /// Metadata borrowed from a related file's sidecar (edited variant,
    /// forgotten duplicate).
    Inherited,
    /// No sidecar at all.
    Orphan,
}

impl MatchOutcome {
    pub fn has_sidecar(self) -> bool {
        !matches!(self, MatchOutcome::Orphan)
    }
}

/// Canonical record for one logical asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRecord {
    /// First source path in directory-then-name order. Records are emitted in
    /// this order.
    pub path: String,
    pub title: String,
    pub source_paths: BTreeSet<String>,
    /// Live-photo / motion-photo containers attached to this asset.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub companions: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub xmp_sidecars: BTreeSet<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub date_source: Option<DateSource>,
    pub albums: BTreeSet<AlbumDescriptor>,
    pub sidecar_present: bool,
    pub sidecar_path: Option<String>,
    pub match_outcome: MatchOutcome,
    pub favorited: bool,
    pub archived: bool,
    pub trashed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl AssetRecord {
    /// Named albums only, year buckets excluded.
    pub fn album_names(&self) -> Vec<&str> {
        self.albums
            .iter()
            .filter(|a| !a.is_year_bucket)
            .map(|a| a.album_name.as_str())
            .collect()
    }
}
