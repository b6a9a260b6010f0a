//! Cross-directory duplicate merging.
//!
//! The export copies a photo into every album it belongs to and into its
//! year bucket. Two records are the same asset when their normalized names
//! agree and their fingerprints agree. The normalized name drops the
//! duplicate index and ignores case, so `IMG_1(1).JPG` in one folder merges
//! with `img_1.jpg` in another when the content matches.
//!
//! Merging keeps the first record seen and unions everything else into it.
//! Two copies in the same directory are never merged: the export gives them
//! distinct `(N)` names because they are distinct files.

use crate::archive::Archive;
use crate::config::FingerprintKind;
use crate::naming::{parent, parse_media_name};
use crate::report::{Issue, IssueKind, Outcome, Report};
use crate::types::{ArchiveEntry, AssetRecord, MatchOutcome};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Size(u64),
    /// Hex SHA-256 of the content.
    Sha256(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub name: String,
    pub fingerprint: Fingerprint,
}

/// Base name with the duplicate index removed, lowercased.
pub fn normalized_name(base_name: &str) -> String {
    parse_media_name(base_name).key.to_lowercase()
}

/// Key for `entry`. A SHA-256 read failure is reported and falls back to
/// the size.
pub fn dedup_key<A: Archive + ?Sized>(
    archive: &A,
    entry: &ArchiveEntry,
    kind: FingerprintKind,
    report: &Report,
) -> DedupKey {
    let fingerprint = match kind {
        FingerprintKind::Size => Fingerprint::Size(entry.size),
        FingerprintKind::Sha256 => match archive.read_file(&entry.path) {
            Ok(bytes) => Fingerprint::Sha256(format!("{:x}", Sha256::digest(&bytes))),
            Err(e) => {
                report.record_issue(Issue::new(
                    entry.path.as_str(),
                    IssueKind::ArchiveRead {
                        error: e.to_string(),
                    },
                ));
                Fingerprint::Size(entry.size)
            }
        },
    };
    DedupKey {
        name: normalized_name(&entry.base_name),
        fingerprint,
    }
}

fn strength(outcome: MatchOutcome) -> u8 {
    match outcome {
        MatchOutcome::Matched => 2,
        MatchOutcome::Inherited => 1,
        MatchOutcome::Orphan => 0,
    }
}

/// Fold `other` into `kept`.
///
/// `kept` keeps its path. Sidecar-derived fields come from whichever side
/// has the stronger match. A missing capture time is filled from `other`.
pub fn absorb(kept: &mut AssetRecord, other: AssetRecord) {
    if strength(other.match_outcome) > strength(kept.match_outcome) {
        kept.title = other.title;
        kept.sidecar_present = other.sidecar_present;
        kept.sidecar_path = other.sidecar_path;
        kept.match_outcome = other.match_outcome;
        kept.favorited = other.favorited;
        kept.archived = other.archived;
        kept.trashed = other.trashed;
        kept.geo = other.geo;
        kept.description = other.description;
        if other.captured_at.is_some() {
            kept.captured_at = other.captured_at;
            kept.date_source = other.date_source;
        }
    }
    if kept.captured_at.is_none() {
        kept.captured_at = other.captured_at;
        kept.date_source = other.date_source;
    }

    kept.source_paths.extend(other.source_paths);
    kept.companions.extend(other.companions);
    kept.xmp_sidecars.extend(other.xmp_sidecars);
    kept.albums.extend(other.albums);
    kept.issues.extend(other.issues);
    if kept.match_outcome.has_sidecar() {
        kept.issues.retain(|i| i.kind != IssueKind::UnmatchedMedia);
    }
    kept.issues.sort();
    kept.issues.dedup();
}

/// Merge keyed records, keeping first-appearance order.
///
/// A record joins the first earlier record with its key that has no copy in
/// its own directory, or starts a new one.
pub fn merge(
    records: impl IntoIterator<Item = (DedupKey, AssetRecord)>,
    report: &Report,
) -> Vec<AssetRecord> {
    let mut slots: HashMap<DedupKey, Vec<usize>> = HashMap::new();
    let mut merged: Vec<AssetRecord> = Vec::new();
    for (key, record) in records {
        let candidates = slots.entry(key).or_default();
        let directory = parent(&record.path);
        let target = candidates.iter().copied().find(|&i| {
            !merged[i]
                .source_paths
                .iter()
                .any(|p| parent(p) == directory)
        });
        match target {
            Some(i) => {
                absorb(&mut merged[i], record);
                report.count(Outcome::MergedDuplicate);
            }
            None => {
                candidates.push(merged.len());
                merged.push(record);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemArchive;
    use crate::date::DateSource;
    use crate::types::AlbumDescriptor;
    use chrono::DateTime;
    use std::collections::BTreeSet;

    fn entry(path: &str, size: u64) -> ArchiveEntry {
        let (dir, name) = path.rsplit_once('/').unwrap();
        ArchiveEntry {
            path: path.into(),
            directory: dir.into(),
            base_name: name.into(),
            size,
        }
    }

    fn record(path: &str, outcome: MatchOutcome) -> AssetRecord {
        let (dir, name) = path.rsplit_once('/').unwrap();
        AssetRecord {
            path: path.into(),
            title: name.into(),
            source_paths: BTreeSet::from([path.to_string()]),
            companions: BTreeSet::new(),
            xmp_sidecars: BTreeSet::new(),
            captured_at: None,
            date_source: None,
            albums: BTreeSet::from([AlbumDescriptor {
                directory_path: dir.into(),
                album_name: dir.into(),
                is_year_bucket: false,
            }]),
            sidecar_present: outcome.has_sidecar(),
            sidecar_path: outcome.has_sidecar().then(|| format!("{path}.json")),
            match_outcome: outcome,
            favorited: false,
            archived: false,
            trashed: false,
            geo: None,
            description: None,
            issues: Vec::new(),
        }
    }

    fn size_key(name: &str, size: u64) -> DedupKey {
        DedupKey {
            name: normalized_name(name),
            fingerprint: Fingerprint::Size(size),
        }
    }

    // =========================================================================
    // Keys
    // =========================================================================

    #[test]
    fn normalized_name_drops_index_and_case() {
        assert_eq!(normalized_name("IMG_1(1).JPG"), "img_1.jpg");
        assert_eq!(normalized_name("img_1.jpg"), "img_1.jpg");
        assert_ne!(normalized_name("IMG_1.jpg"), normalized_name("IMG_1.heic"));
    }

    #[test]
    fn size_fingerprint_reads_nothing() {
        let archive = MemArchive::new();
        let report = Report::new();
        let key = dedup_key(&archive, &entry("A/x.jpg", 7), FingerprintKind::Size, &report);
        assert_eq!(key.fingerprint, Fingerprint::Size(7));
        assert!(report.issues().is_empty());
    }

    #[test]
    fn sha256_distinguishes_equal_sizes() {
        let mut archive = MemArchive::new();
        archive
            .add_file("A/x.jpg", "aaaa")
            .add_file("B/x.jpg", "bbbb")
            .add_file("C/x.jpg", "aaaa");
        let report = Report::new();
        let key = |p: &str| dedup_key(&archive, &entry(p, 4), FingerprintKind::Sha256, &report);

        assert_ne!(key("A/x.jpg"), key("B/x.jpg"));
        assert_eq!(key("A/x.jpg"), key("C/x.jpg"));
        assert_eq!(
            key("A/x.jpg").fingerprint,
            Fingerprint::Sha256(
                "61be55a8e2f6b4e172338bddf184d6dbee29c98853e0a0485ecee7f27b9af0b4".into()
            )
        );
    }

    #[test]
    fn sha256_read_failure_falls_back_to_size() {
        let mut archive = MemArchive::new();
        archive.add_file("A/x.jpg", "aaaa").fail_on("A/x.jpg");
        let report = Report::new();
        let key = dedup_key(&archive, &entry("A/x.jpg", 4), FingerprintKind::Sha256, &report);
        assert_eq!(key.fingerprint, Fingerprint::Size(4));
        assert_eq!(report.get(Outcome::ArchiveReadError), 1);
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn same_name_and_size_merge() {
        let report = Report::new();
        let merged = merge(
            vec![
                (size_key("IMG_8172.jpg", 52), record("Album/IMG_8172.jpg", MatchOutcome::Matched)),
                (size_key("IMG_8172.jpg", 25), record("Photos from 2020/IMG_8172.jpg", MatchOutcome::Matched)),
                (size_key("IMG_8172.jpg", 52), record("Photos from 2023/IMG_8172.jpg", MatchOutcome::Matched)),
            ],
            &report,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].path, "Album/IMG_8172.jpg");
        assert_eq!(
            merged[0].source_paths,
            BTreeSet::from(["Album/IMG_8172.jpg".into(), "Photos from 2023/IMG_8172.jpg".into()])
        );
        assert_eq!(merged[0].albums.len(), 2);
        assert_eq!(merged[1].path, "Photos from 2020/IMG_8172.jpg");
        assert_eq!(report.get(Outcome::MergedDuplicate), 1);
    }

    #[test]
    fn orphan_takes_sidecar_fields_from_absorbed_match() {
        let mut orphan = record("A/x.jpg", MatchOutcome::Orphan);
        orphan.issues.push(Issue::new("A/x.jpg", IssueKind::UnmatchedMedia));
        let mut matched = record("B/x.jpg", MatchOutcome::Matched);
        matched.title = "Sunset".into();
        matched.favorited = true;
        matched.captured_at = DateTime::from_timestamp(1_600_000_000, 0);
        matched.date_source = Some(DateSource::Sidecar);

        absorb(&mut orphan, matched);
        assert_eq!(orphan.path, "A/x.jpg");
        assert_eq!(orphan.title, "Sunset");
        assert_eq!(orphan.match_outcome, MatchOutcome::Matched);
        assert!(orphan.sidecar_present);
        assert!(orphan.favorited);
        assert_eq!(orphan.date_source, Some(DateSource::Sidecar));
        assert!(orphan.issues.is_empty());
    }

    #[test]
    fn weaker_record_only_fills_gaps() {
        let mut matched = record("A/x.jpg", MatchOutcome::Matched);
        matched.title = "Sunset".into();
        let mut orphan = record("B/x.jpg", MatchOutcome::Orphan);
        orphan.captured_at = DateTime::from_timestamp(1_500_000_000, 0);
        orphan.date_source = Some(DateSource::Filename);

        absorb(&mut matched, orphan);
        assert_eq!(matched.title, "Sunset");
        assert_eq!(matched.match_outcome, MatchOutcome::Matched);
        assert_eq!(matched.date_source, Some(DateSource::Filename));
        assert_eq!(matched.source_paths.len(), 2);
    }

    #[test]
    fn indexed_copy_merges_with_plain_name() {
        let report = Report::new();
        let merged = merge(
            vec![
                (size_key("IMG_1.jpg", 9), record("A/IMG_1.jpg", MatchOutcome::Matched)),
                (size_key("IMG_1(1).jpg", 9), record("B/IMG_1(1).jpg", MatchOutcome::Matched)),
            ],
            &report,
        );
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn numbered_copies_in_one_directory_stay_apart() {
        let report = Report::new();
        let merged = merge(
            vec![
                (size_key("IMG_3479.JPG", 9), record("Y/IMG_3479.JPG", MatchOutcome::Matched)),
                (size_key("IMG_3479(1).JPG", 9), record("Y/IMG_3479(1).JPG", MatchOutcome::Matched)),
                (size_key("IMG_3479.JPG", 9), record("A/IMG_3479.JPG", MatchOutcome::Matched)),
                (size_key("IMG_3479(1).JPG", 9), record("A/IMG_3479(1).JPG", MatchOutcome::Matched)),
            ],
            &report,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged[0].source_paths,
            BTreeSet::from(["Y/IMG_3479.JPG".into(), "A/IMG_3479.JPG".into()])
        );
        assert_eq!(
            merged[1].source_paths,
            BTreeSet::from(["Y/IMG_3479(1).JPG".into(), "A/IMG_3479(1).JPG".into()])
        );
        assert_eq!(report.get(Outcome::MergedDuplicate), 2);
    }
}
