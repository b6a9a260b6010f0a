//! Per-directory sidecar ↔ media matching.
//!
//! Sidecars only ever describe media in their own directory, so each
//! directory is matched independently (and in parallel, see
//! [`resolve`](crate::resolve)).
//!
//! ## Candidate rules
//!
//! A media entry is a candidate for a sidecar when both carry the same
//! duplicate index and one of these holds, strongest first:
//!
//! | Kind | Rule | Example |
//! |------|------|---------|
//! | exact | media key equals sidecar key | `IMG_1.jpg` / `IMG_1.jpg.json` |
//! | truncated | keys agree after truncation to `max_name_length` | `PXL_…ORIGINA.jpg` / `PXL_…ORIGIN.json` |
//! | stem | media stem equals sidecar key | `27_06_12 - 2.jpg` / `27_06_12 - 2.json` |
//!
//! An index-0 sidecar may also match a media name that merely *looks*
//! indexed (`Party (2019).jpg`), but only exactly.
//!
//! ## Assignment
//!
//! Sidecars are assigned strongest-kind first, then by name. A media entry
//! taken by one sidecar is not available to the next. Among the remaining
//! candidates of the best kind, non-companion beats companion, original beats
//! edited, and the extension the sidecar declares beats others. If several are
//! still left, the first by path wins and the rest are reported ambiguous.
//!
//! ## After assignment
//!
//! Unclaimed media are resolved in three passes:
//!
//! 1. companion containers (`.MP`, live-photo `.MOV`) attach to the primary
//!    of the same stem;
//! 2. edited variants inherit the sidecar of their original;
//! 3. `name(N).ext` with no sidecar of its own inherits the index-0 sidecar
//!    of `name.ext`.
//!
//! Anything left is an orphan. XMP files attach to the media they name.

use crate::archive::Archive;
use crate::config::MatchingConfig;
use crate::index::DirectoryListing;
use crate::naming::{
    self, Classifier, EntryKind, MediaName, SidecarKind, SidecarName, parse_media_name,
    parse_sidecar_name, truncate_utf16,
};
use crate::report::{Issue, IssueKind, Outcome, Report, SidecarOutcome, UnmatchedReason};
use crate::sidecar::{self, SidecarDocument, SidecarMetadata};
use crate::types::{ArchiveEntry, MatchOutcome};
use log::debug;

/// How a media name satisfied a sidecar key. Ordered strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Exact,
    Truncated,
    Stem,
}

/// Decide whether media `m` is a candidate for sidecar `s`.
pub fn match_kind(m: &MediaName, s: &SidecarName, limit: usize) -> Option<MatchKind> {
    if m.index == s.index {
        if m.key == s.key {
            return Some(MatchKind::Exact);
        }
        if truncate_utf16(&m.key, limit) == truncate_utf16(&s.key, limit) {
            return Some(MatchKind::Truncated);
        }
        if m.key_stem == s.key {
            return Some(MatchKind::Stem);
        }
    }
    if s.index == 0 && m.index != 0 && m.name == s.key {
        return Some(MatchKind::Exact);
    }
    None
}

/// One media file of the directory and everything that resolved onto it.
#[derive(Debug, Clone)]
pub struct MatchedAsset {
    pub entry: ArchiveEntry,
    pub outcome: MatchOutcome,
    /// Sidecar title when matched directly, the file name otherwise.
    pub title: String,
    pub sidecar: Option<SidecarMetadata>,
    pub sidecar_path: Option<String>,
    /// Paths of companion containers attached to this asset.
    pub companions: Vec<String>,
    pub xmp: Vec<String>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone)]
pub struct DirectoryMatch {
    pub directory: String,
    /// One per non-companion media entry, in name order.
    pub assets: Vec<MatchedAsset>,
}

struct MediaSlot<'a> {
    entry: &'a ArchiveEntry,
    name: MediaName,
    companion: bool,
    /// Key stem of the original when this is an edited variant.
    edited_of: Option<String>,
}

struct SidecarSlot<'a> {
    entry: &'a ArchiveEntry,
    name: SidecarName,
    meta: SidecarMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Unresolved,
    /// Matched by sidecar slot `n`.
    Direct(usize),
    /// Borrowing the sidecar of slot `n`.
    Inherited(usize),
    /// Attached to media slot `n`.
    Companion(usize),
    Orphan,
}

/// Keep only the entries satisfying `keep`, unless none do.
fn prefer(pool: &mut Vec<usize>, keep: impl Fn(usize) -> bool) {
    if pool.iter().any(|&i| keep(i)) {
        pool.retain(|&i| keep(i));
    }
}

fn declared_extension<'a>(s: &'a SidecarSlot<'_>, classifier: &Classifier) -> Option<&'a str> {
    [s.name.key.as_str(), s.meta.title.as_str()]
        .into_iter()
        .find(|name| classifier.has_media_extension(name))
        .and_then(|name| naming::split_extension(name).1)
}

/// Match every sidecar of one directory to its media.
///
/// Sidecar outcomes and issues go to `report` as they are decided. Never
/// fails: read errors and malformed sidecars become issues.
pub fn match_directory<A: Archive + ?Sized>(
    archive: &A,
    listing: &DirectoryListing,
    classifier: &Classifier,
    config: &MatchingConfig,
    report: &Report,
) -> DirectoryMatch {
    let limit = config.max_name_length;

    let media: Vec<MediaSlot> = listing
        .files
        .iter()
        .filter(|f| classifier.has_media_extension(&f.base_name))
        .map(|entry| {
            let name = parse_media_name(&entry.base_name);
            MediaSlot {
                entry,
                companion: config.is_companion_extension(&name.extension),
                edited_of: naming::strip_edited_suffix(&name.key_stem, &config.edited_suffixes)
                    .map(str::to_string),
                name,
            }
        })
        .collect();

    let mut sidecars: Vec<SidecarSlot> = Vec::new();
    let mut broken: Vec<SidecarName> = Vec::new();
    for entry in &listing.files {
        if classifier.classify(&entry.base_name) != EntryKind::Sidecar(SidecarKind::Json)
            || listing.album_definition.as_deref() == Some(entry.path.as_str())
        {
            continue;
        }
        let Some(name) = parse_sidecar_name(&entry.base_name, classifier) else {
            continue;
        };
        let parsed = archive
            .read_file(&entry.path)
            .map_err(|e| {
                let error = e.to_string();
                report.record_issue(Issue::new(
                    entry.path.as_str(),
                    IssueKind::ArchiveRead {
                        error: error.clone(),
                    },
                ));
                UnmatchedReason::Unreadable { error }
            })
            .and_then(|bytes| {
                sidecar::parse_document(&bytes).map_err(|e| {
                    let error = e.to_string();
                    report.record_issue(Issue::new(
                        entry.path.as_str(),
                        IssueKind::MalformedSidecar {
                            error: error.clone(),
                        },
                    ));
                    UnmatchedReason::Malformed { error }
                })
            });
        match parsed {
            Ok(SidecarDocument::Media(meta)) => sidecars.push(SidecarSlot { entry, name, meta }),
            Ok(SidecarDocument::Album(_)) => debug!("{}: extra album sidecar ignored", entry.path),
            Err(reason) => {
                report.record_sidecar(&entry.path, SidecarOutcome::Unmatched(reason));
                broken.push(name);
            }
        }
    }

    let candidates: Vec<Vec<(usize, MatchKind)>> = sidecars
        .iter()
        .map(|s| {
            media
                .iter()
                .enumerate()
                .filter_map(|(mi, m)| match_kind(&m.name, &s.name, limit).map(|k| (mi, k)))
                .collect()
        })
        .collect();

    let mut order: Vec<usize> = (0..sidecars.len()).collect();
    order.sort_by(|&a, &b| {
        let rank = |si: usize| candidates[si].iter().map(|(_, k)| *k).min();
        // Sidecars without candidates go last.
        (rank(a).is_none(), rank(a))
            .cmp(&(rank(b).is_none(), rank(b)))
            .then_with(|| sidecars[a].entry.base_name.cmp(&sidecars[b].entry.base_name))
    });

    let mut roles = vec![Role::Unresolved; media.len()];
    let mut surplus_issues: Vec<Vec<Issue>> = vec![Vec::new(); media.len()];

    for si in order {
        let sidecar = &sidecars[si];
        let available: Vec<(usize, MatchKind)> = candidates[si]
            .iter()
            .filter(|(mi, _)| roles[*mi] == Role::Unresolved)
            .copied()
            .collect();

        let Some(best) = available.iter().map(|(_, k)| *k).min() else {
            let reason = candidates[si]
                .iter()
                .find_map(|(mi, _)| match roles[*mi] {
                    Role::Direct(by) => Some(UnmatchedReason::Claimed {
                        by: sidecars[by].entry.path.clone(),
                    }),
                    _ => None,
                })
                .unwrap_or(UnmatchedReason::NoCandidate);
            report.record_issue(Issue::new(
                sidecar.entry.path.as_str(),
                IssueKind::UnmatchedSidecar,
            ));
            report.record_sidecar(&sidecar.entry.path, SidecarOutcome::Unmatched(reason));
            continue;
        };

        let mut pool: Vec<usize> = available
            .iter()
            .filter(|(_, k)| *k == best)
            .map(|(mi, _)| *mi)
            .collect();
        prefer(&mut pool, |mi| !media[mi].companion);
        prefer(&mut pool, |mi| media[mi].edited_of.is_none());
        if let Some(ext) = declared_extension(sidecar, classifier) {
            prefer(&mut pool, |mi| media[mi].name.extension.eq_ignore_ascii_case(ext));
        }
        pool.sort_by(|&a, &b| media[a].entry.path.cmp(&media[b].entry.path));

        let chosen = pool[0];
        roles[chosen] = Role::Direct(si);
        let outcome = if pool.len() > 1 {
            let surplus: Vec<String> = pool[1..]
                .iter()
                .map(|&mi| media[mi].entry.path.clone())
                .collect();
            for &mi in &pool[1..] {
                let issue = Issue::new(
                    media[mi].entry.path.as_str(),
                    IssueKind::Ambiguous {
                        sidecar: sidecar.entry.path.clone(),
                    },
                );
                report.record_issue(issue.clone());
                surplus_issues[mi].push(issue);
            }
            SidecarOutcome::Ambiguous {
                chosen: media[chosen].entry.path.clone(),
                surplus,
            }
        } else {
            SidecarOutcome::Matched {
                media: media[chosen].entry.path.clone(),
            }
        };
        report.record_sidecar(&sidecar.entry.path, outcome);
    }

    // Media a malformed sidecar was written for stay orphans rather than
    // borrowing a neighbour's metadata.
    let blocked: Vec<bool> = media
        .iter()
        .enumerate()
        .map(|(mi, m)| {
            roles[mi] == Role::Unresolved
                && broken.iter().any(|s| match_kind(&m.name, s, limit).is_some())
        })
        .collect();

    // Companions: unclaimed containers sharing a primary's stem.
    for mi in 0..media.len() {
        let m = &media[mi];
        if roles[mi] != Role::Unresolved || !m.companion {
            continue;
        }
        let primary = (0..media.len())
            .filter(|&p| {
                let pm = &media[p];
                p != mi
                    && !pm.companion
                    && pm.name.index == m.name.index
                    && (pm.name.key_stem == m.name.key_stem || pm.name.key_stem == m.name.key)
            })
            .min_by_key(|&p| (!matches!(roles[p], Role::Direct(_)), &media[p].entry.path));
        if let Some(p) = primary {
            roles[mi] = Role::Companion(p);
            report.count(Outcome::Companion);
        }
    }

    // Edited variants and forgotten duplicates borrow a direct match's sidecar.
    for mi in 0..media.len() {
        if roles[mi] != Role::Unresolved || blocked[mi] {
            continue;
        }
        let m = &media[mi];
        let direct = |p: usize| match roles[p] {
            Role::Direct(si) => Some(si),
            _ => None,
        };
        let edited_source = m.edited_of.as_ref().and_then(|original| {
            (0..media.len())
                .filter(|&p| media[p].name.index == m.name.index && media[p].name.key_stem == *original)
                .filter_map(|p| direct(p).map(|si| (p, si)))
                .min_by_key(|(p, _)| {
                    (
                        !media[*p].name.extension.eq_ignore_ascii_case(&m.name.extension),
                        &media[*p].entry.path,
                    )
                })
                .map(|(_, si)| si)
        });
        let duplicate_source = || {
            (m.name.index > 0)
                .then(|| {
                    (0..media.len())
                        .filter(|&p| media[p].name.index == 0 && media[p].name.key == m.name.key)
                        .find_map(direct)
                })
                .flatten()
        };
        if let Some(si) = edited_source.or_else(duplicate_source) {
            roles[mi] = Role::Inherited(si);
            report.count(Outcome::Inherited);
        }
    }

    for role in roles.iter_mut() {
        if *role == Role::Unresolved {
            *role = Role::Orphan;
        }
    }

    // XMP sidecars name the media in full or by stem.
    let mut xmp: Vec<Vec<String>> = vec![Vec::new(); media.len()];
    for entry in &listing.files {
        if classifier.classify(&entry.base_name) != EntryKind::Sidecar(SidecarKind::Xmp) {
            continue;
        }
        let (target, _) = naming::split_extension(&entry.base_name);
        let owner = media
            .iter()
            .position(|m| m.entry.base_name == target)
            .or_else(|| media.iter().position(|m| m.name.stem == target));
        match owner {
            Some(mi) => {
                let mi = match roles[mi] {
                    Role::Companion(p) => p,
                    _ => mi,
                };
                xmp[mi].push(entry.path.clone());
            }
            None => debug!("{}: no media for XMP sidecar", entry.path),
        }
    }

    let mut assets = Vec::new();
    for (mi, m) in media.iter().enumerate() {
        let (outcome, slot) = match roles[mi] {
            Role::Companion(_) => continue,
            Role::Direct(si) => (MatchOutcome::Matched, Some(&sidecars[si])),
            Role::Inherited(si) => (MatchOutcome::Inherited, Some(&sidecars[si])),
            Role::Orphan | Role::Unresolved => (MatchOutcome::Orphan, None),
        };

        let companion_slots: Vec<usize> = (0..media.len())
            .filter(|&c| roles[c] == Role::Companion(mi))
            .collect();
        let mut issues = surplus_issues[mi].clone();
        for &c in &companion_slots {
            issues.extend(surplus_issues[c].iter().cloned());
        }
        if outcome == MatchOutcome::Orphan {
            let issue = Issue::new(m.entry.path.as_str(), IssueKind::UnmatchedMedia);
            report.record_issue(issue.clone());
            issues.push(issue);
        }

        let title = match (outcome, slot) {
            (MatchOutcome::Matched, Some(s)) if !s.meta.title.trim().is_empty() => {
                s.meta.title.clone()
            }
            _ => m.entry.base_name.clone(),
        };

        assets.push(MatchedAsset {
            entry: m.entry.clone(),
            outcome,
            title,
            sidecar: slot.map(|s| s.meta.clone()),
            sidecar_path: slot.map(|s| s.entry.path.clone()),
            companions: companion_slots
                .iter()
                .map(|&c| media[c].entry.path.clone())
                .collect(),
            xmp: std::mem::take(&mut xmp[mi]),
            issues,
        });
    }

    debug!(
        "{:?}: {} media, {} sidecars, {} assets",
        listing.path,
        media.len(),
        sidecars.len(),
        assets.len()
    );

    DirectoryMatch {
        directory: listing.path.clone(),
        assets,
    }
}
