//! Outcome counters and per-entry issues for one resolution pass.
//!
//! A [`Report`] is shared by reference across the rayon pool. Counters are
//! atomics and can be read at any time, including while the pass is running.
//! Everything that needs more than a number (issues, the per-sidecar outcome
//! table, album member tallies) sits behind a single mutex.

use crate::types::AlbumDescriptor;
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Everything the pass counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Sidecar matched exactly one media entry.
    Matched,
    /// Sidecar matched nothing.
    Unmatched,
    /// Sidecar had several candidates; the first by path was taken.
    Ambiguous,
    /// A record absorbed a duplicate from another directory.
    MergedDuplicate,
    /// Record without any sidecar.
    OrphanMedia,
    /// Orphan record emitted because uploads without sidecar are forced.
    ForcedUpload,
    /// Media that borrowed a related file's sidecar.
    Inherited,
    /// Live-photo / motion-photo container attached to a primary.
    Companion,
    MalformedSidecar,
    ArchiveReadError,
}

impl Outcome {
    pub const ALL: [Outcome; 10] = [
        Outcome::Matched,
        Outcome::Unmatched,
        Outcome::Ambiguous,
        Outcome::MergedDuplicate,
        Outcome::OrphanMedia,
        Outcome::ForcedUpload,
        Outcome::Inherited,
        Outcome::Companion,
        Outcome::MalformedSidecar,
        Outcome::ArchiveReadError,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Matched => "matched",
            Outcome::Unmatched => "unmatched",
            Outcome::Ambiguous => "ambiguous",
            Outcome::MergedDuplicate => "merged duplicates",
            Outcome::OrphanMedia => "orphan media",
            Outcome::ForcedUpload => "forced uploads",
            Outcome::Inherited => "inherited",
            Outcome::Companion => "companions",
            Outcome::MalformedSidecar => "malformed sidecars",
            Outcome::ArchiveReadError => "read errors",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Why a sidecar found no media.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum UnmatchedReason {
    /// No media in the directory fits the sidecar's name.
    NoCandidate,
    /// Every candidate was taken by a stronger sidecar.
    Claimed { by: String },
    Malformed { error: String },
    Unreadable { error: String },
}

/// Final state of one sidecar. Every sidecar ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum SidecarOutcome {
    Matched { media: String },
    Ambiguous { chosen: String, surplus: Vec<String> },
    Unmatched(UnmatchedReason),
}

impl SidecarOutcome {
    pub fn outcome(&self) -> Outcome {
        match self {
            SidecarOutcome::Matched { .. } => Outcome::Matched,
            SidecarOutcome::Ambiguous { .. } => Outcome::Ambiguous,
            SidecarOutcome::Unmatched(_) => Outcome::Unmatched,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum IssueKind {
    MalformedSidecar { error: String },
    UnmatchedSidecar,
    UnmatchedMedia,
    /// Media was a candidate of `sidecar` but lost the tie-break.
    Ambiguous { sidecar: String },
    ArchiveRead { error: String },
}

/// A non-fatal condition attached to one archive path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Issue {
    pub path: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl Issue {
    pub fn new(path: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::MalformedSidecar { error } => write!(f, "malformed sidecar: {error}"),
            IssueKind::UnmatchedSidecar => f.write_str("sidecar matches no media"),
            IssueKind::UnmatchedMedia => f.write_str("no sidecar for media"),
            IssueKind::Ambiguous { sidecar } => {
                write!(f, "candidate of {sidecar} not chosen")
            }
            IssueKind::ArchiveRead { error } => write!(f, "read error: {error}"),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

#[derive(Debug, Default)]
struct Ledger {
    issues: Vec<Issue>,
    sidecars: BTreeMap<String, SidecarOutcome>,
    album_members: BTreeMap<AlbumDescriptor, usize>,
}

/// Running tally for one pass.
#[derive(Debug, Default)]
pub struct Report {
    counters: [AtomicU64; Outcome::ALL.len()],
    ledger: Mutex<Ledger>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn count(&self, outcome: Outcome) {
        self.add(outcome, 1);
    }

    pub fn add(&self, outcome: Outcome, n: u64) {
        self.counters[outcome.slot()].fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self, outcome: Outcome) -> u64 {
        self.counters[outcome.slot()].load(Ordering::Relaxed)
    }

    /// Current value of every counter, in [`Outcome::ALL`] order.
    pub fn counts(&self) -> Vec<(Outcome, u64)> {
        Outcome::ALL.iter().map(|&o| (o, self.get(o))).collect()
    }

    /// Record a non-fatal condition. Read errors and malformed sidecars are
    /// also counted here.
    pub fn record_issue(&self, issue: Issue) {
        match &issue.kind {
            IssueKind::ArchiveRead { .. } => self.count(Outcome::ArchiveReadError),
            IssueKind::MalformedSidecar { .. } => self.count(Outcome::MalformedSidecar),
            _ => {}
        }
        warn!("{issue}");
        self.ledger().issues.push(issue);
    }

    /// Record the final state of a sidecar and bump its counter.
    pub fn record_sidecar(&self, path: &str, outcome: SidecarOutcome) {
        self.count(outcome.outcome());
        self.ledger().sidecars.insert(path.to_string(), outcome);
    }

    pub fn set_album_members(&self, members: BTreeMap<AlbumDescriptor, usize>) {
        self.ledger().album_members = members;
    }

    /// All issues so far, sorted by path.
    pub fn issues(&self) -> Vec<Issue> {
        let mut issues = self.ledger().issues.clone();
        issues.sort();
        issues
    }

    pub fn sidecar_outcomes(&self) -> BTreeMap<String, SidecarOutcome> {
        self.ledger().sidecars.clone()
    }

    pub fn sidecar_outcome(&self, path: &str) -> Option<SidecarOutcome> {
        self.ledger().sidecars.get(path).cloned()
    }

    /// Record count per album, including albums nothing matched into.
    pub fn album_members(&self) -> BTreeMap<AlbumDescriptor, usize> {
        self.ledger().album_members.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn counters_start_at_zero() {
        let report = Report::new();
        assert!(report.counts().iter().all(|(_, n)| *n == 0));
        assert_eq!(report.counts().len(), Outcome::ALL.len());
    }

    #[test]
    fn slots_are_distinct() {
        let report = Report::new();
        for (i, outcome) in Outcome::ALL.iter().enumerate() {
            report.add(*outcome, i as u64 + 1);
        }
        for (i, outcome) in Outcome::ALL.iter().enumerate() {
            assert_eq!(report.get(*outcome), i as u64 + 1, "{outcome:?}");
        }
    }

    #[test]
    fn counts_from_many_threads() {
        let report = Report::new();
        (0..1000).into_par_iter().for_each(|_| report.count(Outcome::Matched));
        assert_eq!(report.get(Outcome::Matched), 1000);
    }

    #[test]
    fn sidecar_outcomes_count_once_each() {
        let report = Report::new();
        report.record_sidecar("a.jpg.json", SidecarOutcome::Matched { media: "a.jpg".into() });
        report.record_sidecar(
            "b.jpg.json",
            SidecarOutcome::Unmatched(UnmatchedReason::NoCandidate),
        );
        report.record_sidecar(
            "c.jpg.json",
            SidecarOutcome::Ambiguous {
                chosen: "c.jpg".into(),
                surplus: vec!["c.JPG".into()],
            },
        );
        assert_eq!(report.get(Outcome::Matched), 1);
        assert_eq!(report.get(Outcome::Unmatched), 1);
        assert_eq!(report.get(Outcome::Ambiguous), 1);
        assert_eq!(report.sidecar_outcomes().len(), 3);
        assert_eq!(
            report.sidecar_outcome("a.jpg.json"),
            Some(SidecarOutcome::Matched { media: "a.jpg".into() })
        );
    }

    #[test]
    fn issues_sorted_and_counted() {
        let report = Report::new();
        report.record_issue(Issue::new("z.json", IssueKind::MalformedSidecar { error: "eof".into() }));
        report.record_issue(Issue::new("a.jpg", IssueKind::ArchiveRead { error: "denied".into() }));
        report.record_issue(Issue::new("m.jpg", IssueKind::UnmatchedMedia));

        let paths: Vec<String> = report.issues().into_iter().map(|i| i.path).collect();
        assert_eq!(paths, vec!["a.jpg", "m.jpg", "z.json"]);
        assert_eq!(report.get(Outcome::MalformedSidecar), 1);
        assert_eq!(report.get(Outcome::ArchiveReadError), 1);
    }

    #[test]
    fn issue_display() {
        let issue = Issue::new(
            "Album/IMG_1(1).jpg",
            IssueKind::Ambiguous {
                sidecar: "Album/IMG_1.jpg.json".into(),
            },
        );
        assert_eq!(
            issue.to_string(),
            "Album/IMG_1(1).jpg: candidate of Album/IMG_1.jpg.json not chosen"
        );
    }

    #[test]
    fn outcome_labels_unique() {
        let mut labels: Vec<&str> = Outcome::ALL.iter().map(|o| o.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), Outcome::ALL.len());
    }
}
