//! Shared test utilities for the reconciler test suite.
//!
//! Builds takeout-shaped archives in memory and provides lookup helpers over
//! the emitted records.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut takeout = TakeoutBuilder::new();
//! takeout
//!     .album("Trip", "Trip")
//!     .image("Trip/IMG_1.jpg", 10)
//!     .media_sidecar("Trip/IMG_1.jpg.json", "IMG_1.jpg", Some(1_600_000_000));
//!
//! let (records, report) = run(takeout.archive(), &ResolverConfig::default());
//! let record = find_record(&records, "Trip/IMG_1.jpg");
//! assert_eq!(record.album_names(), vec!["Trip"]);
//! ```

use crate::archive::MemArchive;
use crate::config::ResolverConfig;
use crate::exif::NoExif;
use crate::report::Report;
use crate::resolve::{CancelToken, resolve};
use crate::types::AssetRecord;

// =========================================================================
// Archive setup
// =========================================================================

/// Fluent builder for takeout-shaped archives.
#[derive(Default)]
pub struct TakeoutBuilder {
    archive: MemArchive,
}

impl TakeoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a media file of `len` bytes. Content is derived from the length
    /// only, so equal sizes mean equal content.
    pub fn image(&mut self, path: &str, len: usize) -> &mut Self {
        self.archive.add_file(path, vec![b'x'; len]);
        self
    }

    /// Add a per-media sidecar with an optional `photoTakenTime`.
    pub fn media_sidecar(&mut self, path: &str, title: &str, taken: Option<i64>) -> &mut Self {
        let taken = taken.unwrap_or(0);
        let json = serde_json::json!({
            "title": title,
            "photoTakenTime": { "timestamp": taken.to_string() },
        });
        self.archive.add_file(path, json.to_string());
        self
    }

    /// Add a `metadata.json` album definition to `dir`.
    pub fn album(&mut self, dir: &str, title: &str) -> &mut Self {
        let json = serde_json::json!({
            "title": title,
            "date": { "timestamp": "1600000000" },
        });
        self.archive
            .add_file(&format!("{dir}/metadata.json"), json.to_string());
        self
    }

    pub fn file(&mut self, path: &str, content: &str) -> &mut Self {
        self.archive.add_file(path, content);
        self
    }

    pub fn fail_on(&mut self, path: &str) -> &mut Self {
        self.archive.fail_on(path);
        self
    }

    pub fn archive(&self) -> &MemArchive {
        &self.archive
    }
}

// =========================================================================
// Running
// =========================================================================

/// Resolve `archive` to completion. Panics on a fatal error.
pub fn run(archive: &MemArchive, config: &ResolverConfig) -> (Vec<AssetRecord>, Report) {
    let mut resolution = resolve(archive, &NoExif, config, CancelToken::new()).unwrap();
    let records = resolution
        .by_ref()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    (records, resolution.into_report())
}

/// Default config with uploads of sidecar-less media forced, so orphans show
/// up in the output.
pub fn forcing_config() -> ResolverConfig {
    let mut config = ResolverConfig::default();
    config.upload.force_without_sidecar = true;
    config
}

// =========================================================================
// Record lookups: panic with the available paths on a miss
// =========================================================================

/// Find the record whose canonical path is `path`. Panics if not found.
pub fn find_record<'a>(records: &'a [AssetRecord], path: &str) -> &'a AssetRecord {
    records.iter().find(|r| r.path == path).unwrap_or_else(|| {
        let paths = record_paths(records);
        panic!("record '{path}' not found. Available: {paths:?}")
    })
}

/// Find the record that has `path` among its sources. Panics if not found.
pub fn find_source<'a>(records: &'a [AssetRecord], path: &str) -> &'a AssetRecord {
    records
        .iter()
        .find(|r| r.source_paths.contains(path))
        .unwrap_or_else(|| {
            let paths = record_paths(records);
            panic!("no record has source '{path}'. Available: {paths:?}")
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// Canonical paths in emission order.
pub fn record_paths(records: &[AssetRecord]) -> Vec<&str> {
    records.iter().map(|r| r.path.as_str()).collect()
}

/// Album names of one record in directory order, year buckets included.
pub fn all_album_names(record: &AssetRecord) -> Vec<&str> {
    record
        .albums
        .iter()
        .map(|a| a.album_name.as_str())
        .collect()
}
