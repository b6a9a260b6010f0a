//! # Takeout Reconcile
//!
//! Turns an extracted Google Photos takeout into one canonical record per
//! asset: the media file (and its copies), the JSON sidecar that describes
//! it, its capture time, and the albums it belongs to.
//!
//! # The Problem
//!
//! A takeout is not a faithful dump of the library:
//!
//! - Every photo appears once per album plus once in its `Photos from YYYY`
//!   year bucket.
//! - Long names are truncated to 46 UTF-16 units, but the media and its
//!   sidecar are truncated differently (`…ORIGINA.jpg` vs `…ORIGIN.json`).
//! - Duplicate names get a `(N)` index, placed before the extension on the
//!   media (`IMG_1(1).jpg`) and after it on the sidecar (`IMG_1.jpg(1).json`).
//! - Edited variants (`-edited`, localized) and motion-photo containers have
//!   no sidecar of their own.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Index    archive   →  ArchiveIndex      (one walk, album table)
//! 2. Match    directory →  DirectoryMatch    (per directory, parallel)
//! 3. Merge    matches   →  AssetRecord       (dates, duplicates, emission)
//! ```
//!
//! Indexing finishes before matching starts, so matching never depends on
//! traversal order. Directories are matched independently on the rayon pool.
//! Merging is sequential and runs in directory order, which keeps the output
//! deterministic regardless of thread count.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`archive`] | Read-only archive access: filesystem, in-memory, walk filter |
//! | [`index`] | Stage 1: traversal, file classification, album detection |
//! | [`matcher`] | Stage 2: sidecar ↔ media matching within one directory |
//! | [`resolve`] | Stage 3 and orchestration: dates, merging, lazy emission, cancellation |
//! | [`naming`] | Name decomposition: extensions, `(N)` indexes, truncation, edited suffixes |
//! | [`sidecar`] | JSON sidecar parsing (media and album documents) |
//! | [`date`] | Capture-time resolution: sidecar, file name stamps, EXIF |
//! | [`exif`] | Pluggable embedded capture-time lookup |
//! | [`dedup`] | Duplicate keys and record merging |
//! | [`report`] | Outcome counters and per-entry issues |
//! | [`config`] | TOML config loading, merging, and validation |
//! | [`types`] | Records and descriptors shared across stages |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Issues, Not Errors
//!
//! Only three things stop a run: an invalid config, an unreadable archive
//! root, and cancellation. Everything else (a malformed sidecar, a file that
//! cannot be read, a sidecar that matches nothing) becomes an
//! [`report::Issue`] on the [`report::Report`] and, where it concerns one
//! asset, on that record. A takeout with a thousand broken files still
//! yields every asset that can be reconciled.
//!
//! ## Strongest Match Wins
//!
//! Within a directory, sidecars claim media strongest rule first (exact,
//! then truncated, then stem). A weaker sidecar can never steal media a
//! stronger one fits. Ties are broken by fixed preferences and finally by
//! path, so the same archive always pairs the same way.
//!
//! ## Year Buckets Are Not Albums
//!
//! `Photos from 2023` is where the export puts everything taken that year.
//! It is tracked on every record (so callers can tell where copies came
//! from) but flagged, and [`types::AssetRecord::album_names`] leaves it out.

pub mod archive;
pub mod config;
pub mod date;
pub mod dedup;
pub mod exif;
pub mod index;
pub mod matcher;
pub mod naming;
pub mod output;
pub mod report;
pub mod resolve;
pub mod sidecar;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
