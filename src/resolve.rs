//! Orchestration: index, match, date, merge, emit.
//!
//! ```text
//! resolve()           build_index       one walk, album table
//!   └─ first next()   match_directory   per directory, on the rayon pool
//!                     resolve_date      sidecar / filename / EXIF
//!                     dedup::merge      sequential, first-seen order
//!   └─ next() ...     records in directory-then-name order
//! ```
//!
//! Indexing happens up front so a broken root fails fast. Matching is
//! deferred to the first pull. Every record is known before the first one is
//! emitted, because a duplicate in the last directory can change a record
//! from the first.
//!
//! A [`CancelToken`] is checked per directory while indexing and matching and
//! before every emitted record. After cancellation the iterator yields one
//! `Err(ResolveError::Cancelled)` and then ends.

use crate::archive::{Archive, ArchiveError, WalkFilter};
use crate::config::{ConfigError, ResolverConfig};
use crate::date::resolve_date;
use crate::dedup::{self, DedupKey};
use crate::exif::ExifSource;
use crate::index::{AlbumRules, ArchiveIndex, DirectoryListing, IndexError, build_index};
use crate::matcher::{MatchedAsset, match_directory};
use crate::naming::{self, Classifier};
use crate::report::{Outcome, Report};
use crate::types::{AlbumDescriptor, AssetRecord, MatchOutcome};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("cannot list archive root: {0}")]
    RootUnreadable(#[source] ArchiveError),
    #[error("resolution cancelled")]
    Cancelled,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<IndexError> for ResolveError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::RootUnreadable(source) => ResolveError::RootUnreadable(source),
            IndexError::Cancelled => ResolveError::Cancelled,
        }
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

enum State {
    Pending,
    Emitting(std::vec::IntoIter<AssetRecord>),
    Done,
}

/// A resolution in progress. Iterate it to get the records.
pub struct Resolution<'a, A: Archive + ?Sized, E: ExifSource + ?Sized> {
    archive: &'a A,
    exif: &'a E,
    config: ResolverConfig,
    classifier: Classifier,
    index: ArchiveIndex,
    report: Report,
    cancel: CancelToken,
    state: State,
}

/// Start resolving `archive`.
///
/// Validates `config` and indexes the archive before returning. Fails only
/// for invalid config, an unreadable root, or cancellation during indexing.
pub fn resolve<'a, A, E>(
    archive: &'a A,
    exif: &'a E,
    config: &ResolverConfig,
    cancel: CancelToken,
) -> Result<Resolution<'a, A, E>, ResolveError>
where
    A: Archive + ?Sized,
    E: ExifSource + ?Sized,
{
    config.validate()?;
    let classifier = Classifier::new(
        &config.matching.image_extensions,
        &config.matching.video_extensions,
    );
    let filter = WalkFilter::from_config(&config.walk)?;
    let rules = AlbumRules::from_config(&config.albums)?;
    let report = Report::new();

    let index = build_index(archive, &filter, &classifier, &rules, &report, &cancel)?;

    Ok(Resolution {
        archive,
        exif,
        config: config.clone(),
        classifier,
        index,
        report,
        cancel,
        state: State::Pending,
    })
}

impl<A: Archive + ?Sized, E: ExifSource + ?Sized> Resolution<'_, A, E> {
    /// Counters and issues so far. Complete once iteration has ended.
    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn into_report(self) -> Report {
        self.report
    }

    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// Match every directory and merge duplicates.
    fn reconcile(&self) -> Result<Vec<AssetRecord>, ResolveError> {
        let listings: Vec<&DirectoryListing> = self.index.directories().collect();
        let per_directory: Option<Vec<Vec<(DedupKey, AssetRecord)>>> = listings
            .par_iter()
            .map(|listing| {
                if self.cancel.is_cancelled() {
                    return None;
                }
                let matched = match_directory(
                    self.archive,
                    listing,
                    &self.classifier,
                    &self.config.matching,
                    &self.report,
                );
                let records: Vec<(DedupKey, AssetRecord)> = matched
                    .assets
                    .into_iter()
                    .map(|asset| self.build_record(listing, asset))
                    .collect();
                // A cancel that lands while this directory was matched discards it.
                (!self.cancel.is_cancelled()).then_some(records)
            })
            .collect();
        let per_directory = per_directory.ok_or(ResolveError::Cancelled)?;

        let merged = dedup::merge(per_directory.into_iter().flatten(), &self.report);

        let force = self.config.upload.force_without_sidecar;
        let mut records = Vec::with_capacity(merged.len());
        for record in merged {
            if record.match_outcome == MatchOutcome::Orphan {
                self.report.count(Outcome::OrphanMedia);
                if !force {
                    debug!("{}: no sidecar, not emitted", record.path);
                    continue;
                }
                self.report.count(Outcome::ForcedUpload);
            }
            records.push(record);
        }

        let mut members: BTreeMap<AlbumDescriptor, usize> =
            self.index.albums().map(|a| (a.clone(), 0)).collect();
        for album in records.iter().flat_map(|r| &r.albums) {
            *members.entry(album.clone()).or_default() += 1;
        }
        self.report.set_album_members(members);

        records.sort_by(|a, b| {
            (naming::parent(&a.path), naming::base_name(&a.path))
                .cmp(&(naming::parent(&b.path), naming::base_name(&b.path)))
        });
        info!("{} records", records.len());
        Ok(records)
    }

    fn build_record(&self, listing: &DirectoryListing, asset: MatchedAsset) -> (DedupKey, AssetRecord) {
        let MatchedAsset {
            entry,
            outcome,
            title,
            sidecar,
            sidecar_path,
            companions,
            xmp,
            issues,
        } = asset;

        let resolved = resolve_date(
            sidecar.as_ref().and_then(|s| s.taken_at_utc()),
            &entry.base_name,
            || self.exif.capture_time(&entry.path),
            &self.config.dates,
        );
        let key = dedup::dedup_key(
            self.archive,
            &entry,
            self.config.dedup.fingerprint,
            &self.report,
        );

        let record = AssetRecord {
            path: entry.path.clone(),
            title,
            source_paths: BTreeSet::from([entry.path]),
            companions: companions.into_iter().collect(),
            xmp_sidecars: xmp.into_iter().collect(),
            captured_at: resolved.map(|r| r.at),
            date_source: resolved.map(|r| r.source),
            albums: self.index.album(&listing.path).cloned().into_iter().collect(),
            sidecar_present: outcome.has_sidecar(),
            sidecar_path,
            match_outcome: outcome,
            favorited: sidecar.as_ref().is_some_and(|s| s.favorited),
            archived: sidecar.as_ref().is_some_and(|s| s.archived),
            trashed: sidecar.as_ref().is_some_and(|s| s.trashed),
            geo: sidecar.as_ref().and_then(|s| s.geo),
            description: sidecar.and_then(|s| s.description),
            issues,
        };
        (key, record)
    }
}

impl<A: Archive + ?Sized, E: ExifSource + ?Sized> Iterator for Resolution<'_, A, E> {
    type Item = Result<AssetRecord, ResolveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, State::Done) {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.state = State::Done;
            return Some(Err(ResolveError::Cancelled));
        }
        if matches!(self.state, State::Pending) {
            match self.reconcile() {
                Ok(records) => self.state = State::Emitting(records.into_iter()),
                Err(e) => {
                    self.state = State::Done;
                    return Some(Err(e));
                }
            }
        }
        match &mut self.state {
            State::Emitting(records) => match records.next() {
                Some(record) => Some(Ok(record)),
                None => {
                    self.state = State::Done;
                    None
                }
            },
            State::Pending | State::Done => None,
        }
    }
}
