//! CLI output formatting for reconciliation results.
//!
//! # Information-First Display
//!
//! Output is **asset-centric, not file-centric**. Each record leads with its
//! positional index and reconstructed title. The files behind it (every copy,
//! companion, and the sidecar it was matched to) are secondary context on
//! indented lines. The listing reads as an inventory of the library while
//! still letting users trace every asset back to the archive.
//!
//! # Output Format
//!
//! ## Records
//!
//! ```text
//! 001 Sunset at the pier
//!     Source: Trip/IMG_1.jpg
//!     Also: Photos from 2023/IMG_1.jpg
//!     Companion: Trip/IMG_1.MP4
//!     Sidecar: Trip/IMG_1.jpg.json (matched)
//!     Albums: Trip
//!     Taken: 2023-07-22 14:13:20 UTC (sidecar)
//! 002 (PXL_20230722_141320000.jpg)
//!     Source: Photos from 2023/PXL_20230722_141320000.jpg
//!     Sidecar: none
//!     Taken: 2023-07-22 14:13:20 UTC (filename)
//! ```
//!
//! ## Summary
//!
//! ```text
//! Sidecars
//!     matched: 412
//!     unmatched: 3
//! Assets
//!     merged duplicates: 120
//! Albums
//!     Photos from 2023 (402 assets, year)
//!     Trip (14 assets)
//! Issues (3)
//!     Trip/IMG_9(1).json: sidecar matches no media
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::date::DateSource;
use crate::report::{Outcome, Report};
use crate::types::{AssetRecord, MatchOutcome};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Record header: titled records show the title, records whose title is
/// just the file name show it in parens.
///
/// ```text
/// 001 Sunset at the pier
/// 002 (IMG_2.jpg)
/// ```
fn record_header(index: usize, record: &AssetRecord) -> String {
    let file_name = crate::naming::base_name(&record.path);
    if record.title.is_empty() || record.title == file_name {
        format!("{} ({})", format_index(index), file_name)
    } else {
        format!("{} {}", format_index(index), record.title)
    }
}

fn outcome_label(outcome: MatchOutcome) -> &'static str {
    match outcome {
        MatchOutcome::Matched => "matched",
        MatchOutcome::Inherited => "inherited",
        MatchOutcome::Orphan => "orphan",
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((pos, _)) => format!("{}...", &text[..pos]),
        None => text.to_string(),
    }
}

// ============================================================================
// Records
// ============================================================================

/// Context lines for one record.
pub fn format_record(index: usize, record: &AssetRecord) -> Vec<String> {
    let pad = indent(1);
    let mut lines = vec![record_header(index, record)];
    lines.push(format!("{pad}Source: {}", record.path));
    for other in record.source_paths.iter().filter(|p| **p != record.path) {
        lines.push(format!("{pad}Also: {other}"));
    }
    for companion in &record.companions {
        lines.push(format!("{pad}Companion: {companion}"));
    }
    for xmp in &record.xmp_sidecars {
        lines.push(format!("{pad}XMP: {xmp}"));
    }
    match &record.sidecar_path {
        Some(sidecar) => lines.push(format!(
            "{pad}Sidecar: {sidecar} ({})",
            outcome_label(record.match_outcome)
        )),
        None => lines.push(format!("{pad}Sidecar: none")),
    }
    let albums = record.album_names();
    if !albums.is_empty() {
        lines.push(format!("{pad}Albums: {}", albums.join(", ")));
    }
    if let (Some(at), Some(source)) = (record.captured_at, record.date_source) {
        let source = match source {
            DateSource::Sidecar => "sidecar",
            DateSource::Filename => "filename",
            DateSource::Exif => "exif",
        };
        lines.push(format!("{pad}Taken: {} ({source})", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if let Some(description) = &record.description {
        lines.push(format!("{pad}Description: {}", truncate_desc(description, 40)));
    }
    let flags: Vec<&str> = [
        (record.favorited, "favorite"),
        (record.archived, "archived"),
        (record.trashed, "trashed"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();
    if !flags.is_empty() {
        lines.push(format!("{pad}Flags: {}", flags.join(", ")));
    }
    lines
}

/// Every record, numbered in emission order.
pub fn format_records(records: &[AssetRecord]) -> Vec<String> {
    records
        .iter()
        .enumerate()
        .flat_map(|(i, record)| format_record(i + 1, record))
        .collect()
}

pub fn print_records(records: &[AssetRecord]) {
    for line in format_records(records) {
        println!("{}", line);
    }
}

// ============================================================================
// Summary
// ============================================================================

const SIDECAR_OUTCOMES: [Outcome; 3] = [Outcome::Matched, Outcome::Unmatched, Outcome::Ambiguous];

/// Counters, album tallies, and issues.
///
/// Counters that stayed at zero are left out, except the sidecar outcomes.
/// At most `max_issues` issues are listed.
pub fn format_summary(report: &Report, max_issues: usize) -> Vec<String> {
    let pad = indent(1);
    let mut lines = vec!["Sidecars".to_string()];
    for outcome in SIDECAR_OUTCOMES {
        lines.push(format!("{pad}{}: {}", outcome.label(), report.get(outcome)));
    }

    let rest: Vec<(Outcome, u64)> = report
        .counts()
        .into_iter()
        .filter(|(o, n)| !SIDECAR_OUTCOMES.contains(o) && *n > 0)
        .collect();
    if !rest.is_empty() {
        lines.push("Assets".to_string());
        for (outcome, n) in rest {
            lines.push(format!("{pad}{}: {n}", outcome.label()));
        }
    }

    let albums = report.album_members();
    if !albums.is_empty() {
        lines.push("Albums".to_string());
        for (album, n) in &albums {
            let kind = if album.is_year_bucket { ", year" } else { "" };
            lines.push(format!("{pad}{} ({n} assets{kind})", album.album_name));
        }
    }

    let issues = report.issues();
    if !issues.is_empty() {
        lines.push(format!("Issues ({})", issues.len()));
        for issue in issues.iter().take(max_issues) {
            lines.push(format!("{pad}{issue}"));
        }
        if issues.len() > max_issues {
            lines.push(format!("{pad}... {} more", issues.len() - max_issues));
        }
    }
    lines
}

pub fn print_summary(report: &Report, max_issues: usize) {
    for line in format_summary(report, max_issues) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Issue, IssueKind, SidecarOutcome};
    use crate::types::AlbumDescriptor;
    use chrono::DateTime;
    use std::collections::{BTreeMap, BTreeSet};

    fn album(name: &str, year: bool) -> AlbumDescriptor {
        AlbumDescriptor {
            directory_path: name.into(),
            album_name: name.into(),
            is_year_bucket: year,
        }
    }

    fn record() -> AssetRecord {
        AssetRecord {
            path: "Trip/IMG_1.jpg".into(),
            title: "Sunset at the pier".into(),
            source_paths: BTreeSet::from([
                "Trip/IMG_1.jpg".to_string(),
                "Photos from 2023/IMG_1.jpg".to_string(),
            ]),
            companions: BTreeSet::from(["Trip/IMG_1.MP4".to_string()]),
            xmp_sidecars: BTreeSet::new(),
            captured_at: DateTime::from_timestamp(1_690_035_200, 0),
            date_source: Some(DateSource::Sidecar),
            albums: BTreeSet::from([album("Trip", false), album("Photos from 2023", true)]),
            sidecar_present: true,
            sidecar_path: Some("Trip/IMG_1.jpg.json".into()),
            match_outcome: MatchOutcome::Matched,
            favorited: true,
            archived: false,
            trashed: false,
            geo: None,
            description: None,
            issues: Vec::new(),
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn truncate_desc_counts_chars() {
        assert_eq!(truncate_desc("Short text", 40), "Short text");
        assert_eq!(truncate_desc(&"é".repeat(50), 40), format!("{}...", "é".repeat(40)));
        assert_eq!(truncate_desc("", 40), "");
    }

    #[test]
    fn header_uses_parens_for_file_name_titles() {
        let mut r = record();
        assert_eq!(record_header(1, &r), "001 Sunset at the pier");
        r.title = "IMG_1.jpg".into();
        assert_eq!(record_header(2, &r), "002 (IMG_1.jpg)");
    }

    // =========================================================================
    // Records
    // =========================================================================

    #[test]
    fn record_lines() {
        let lines = format_record(1, &record());
        assert_eq!(
            lines,
            vec![
                "001 Sunset at the pier",
                "    Source: Trip/IMG_1.jpg",
                "    Also: Photos from 2023/IMG_1.jpg",
                "    Companion: Trip/IMG_1.MP4",
                "    Sidecar: Trip/IMG_1.jpg.json (matched)",
                "    Albums: Trip",
                "    Taken: 2023-07-22 14:13:20 UTC (sidecar)",
                "    Flags: favorite",
            ]
        );
    }

    #[test]
    fn orphan_record_lines() {
        let mut r = record();
        r.sidecar_path = None;
        r.match_outcome = MatchOutcome::Orphan;
        r.captured_at = None;
        r.date_source = None;
        r.favorited = false;
        let lines = format_record(3, &r);
        assert!(lines.contains(&"    Sidecar: none".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Taken")));
        assert!(!lines.iter().any(|l| l.contains("Flags")));
    }

    #[test]
    fn records_numbered_in_order() {
        let mut second = record();
        second.path = "Trip/IMG_2.jpg".into();
        second.title = "Dusk".into();
        let lines = format_records(&[record(), second]);
        let headers: Vec<&String> = lines.iter().filter(|l| !l.starts_with(' ')).collect();
        assert_eq!(headers, vec!["001 Sunset at the pier", "002 Dusk"]);
    }

    // =========================================================================
    // Summary
    // =========================================================================

    #[test]
    fn summary_lists_counts_albums_issues() {
        let report = Report::new();
        report.record_sidecar("a.json", SidecarOutcome::Matched { media: "a.jpg".into() });
        report.count(Outcome::MergedDuplicate);
        report.set_album_members(BTreeMap::from([
            (album("Trip", false), 1),
            (album("Photos from 2023", true), 1),
        ]));
        report.record_issue(Issue::new("b.jpg", IssueKind::UnmatchedMedia));
        report.record_issue(Issue::new("c.jpg", IssueKind::UnmatchedMedia));

        let lines = format_summary(&report, 1);
        assert_eq!(
            lines,
            vec![
                "Sidecars",
                "    matched: 1",
                "    unmatched: 0",
                "    ambiguous: 0",
                "Assets",
                "    merged duplicates: 1",
                "Albums",
                "    Photos from 2023 (1 assets, year)",
                "    Trip (1 assets)",
                "Issues (2)",
                "    b.jpg: no sidecar for media",
                "    ... 1 more",
            ]
        );
    }

    #[test]
    fn empty_summary_has_only_sidecar_section() {
        let lines = format_summary(&Report::new(), 10);
        assert_eq!(lines.len(), 4);
    }
}
