//! Filename parsing for takeout archives.
//!
//! The export mangles names in a handful of systematic ways. This module holds
//! the pure string functions the matcher builds on; none of them touch the
//! archive.
//!
//! ## Duplicate indexes
//!
//! When two files would share a name, the export appends a parenthesized index.
//! The index lands in a different place for media and sidecars:
//!
//! ```text
//! media                 sidecar
//! IMG_3479.JPG          IMG_3479.JPG.json
//! IMG_3479(1).JPG       IMG_3479.JPG(1).json
//! IMG_3479(2).JPG       IMG_3479.JPG(2).json
//! ```
//!
//! Both parsers strip the index and return it separately, so the remaining
//! *key* (`IMG_3479.JPG`) is comparable across the two kinds.
//!
//! ## Truncation
//!
//! Names are cut to a fixed number of UTF-16 code units before the index is
//! appended. Sidecar names keep `.json`, media names keep their extension, so
//! the two truncations land in different places. Comparing keys after
//! [`truncate_utf16`] to the same limit makes them agree again.

use std::collections::HashSet;

/// What an archive entry is, judged from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Media(MediaKind),
    Sidecar(SidecarKind),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarKind {
    Json,
    Xmp,
}

/// Extension-based classifier built from the configured extension lists.
#[derive(Debug, Clone)]
pub struct Classifier {
    images: HashSet<String>,
    videos: HashSet<String>,
}

impl Classifier {
    pub fn new<S: AsRef<str>>(images: &[S], videos: &[S]) -> Self {
        let lower = |list: &[S]| {
            list.iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect::<HashSet<_>>()
        };
        Self {
            images: lower(images),
            videos: lower(videos),
        }
    }

    pub fn classify(&self, name: &str) -> EntryKind {
        let Some(ext) = split_extension(name).1 else {
            return EntryKind::Ignored;
        };
        let ext = ext.to_lowercase();
        if self.images.contains(&ext) {
            EntryKind::Media(MediaKind::Image)
        } else if self.videos.contains(&ext) {
            EntryKind::Media(MediaKind::Video)
        } else if ext == "json" {
            EntryKind::Sidecar(SidecarKind::Json)
        } else if ext == "xmp" {
            EntryKind::Sidecar(SidecarKind::Xmp)
        } else {
            EntryKind::Ignored
        }
    }

    /// True when `name` ends in an image or video extension.
    pub fn has_media_extension(&self, name: &str) -> bool {
        matches!(self.classify(name), EntryKind::Media(_))
    }
}

/// Split `name` into stem and extension at the last dot.
///
/// A leading dot (`.DS_Store`) or a trailing dot (`COVER.`) yields no extension.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => (&name[..pos], Some(&name[pos + 1..])),
        _ => (name, None),
    }
}

/// Strip a trailing `(N)` duplicate index, returning the remainder and `N`.
///
/// - `"IMG_3479(2)"` → `("IMG_3479", 2)`
/// - `"IMG_3479"` → `("IMG_3479", 0)`
/// - `"IMG_3479()"` → `("IMG_3479()", 0)`
pub fn strip_duplicate_index(s: &str) -> (&str, u32) {
    let Some(body) = s.strip_suffix(')') else {
        return (s, 0);
    };
    let Some(open) = body.rfind('(') else {
        return (s, 0);
    };
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return (s, 0);
    }
    match digits.parse::<u32>() {
        Ok(n) => (&s[..open], n),
        Err(_) => (s, 0),
    }
}

/// Number of UTF-16 code units in `s`, the unit the export truncates by.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Longest prefix of `s` that fits in `limit` UTF-16 code units without
/// splitting a character.
pub fn truncate_utf16(s: &str, limit: usize) -> &str {
    let mut units = 0;
    for (pos, c) in s.char_indices() {
        units += c.len_utf16();
        if units > limit {
            return &s[..pos];
        }
    }
    s
}

/// A media file name broken into the parts the matcher compares.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaName {
    /// Full base name as listed (`IMG_3479(1).JPG`).
    pub name: String,
    /// Base name without extension (`IMG_3479(1)`).
    pub stem: String,
    /// Extension without the dot, original case. Empty when absent.
    pub extension: String,
    /// Duplicate index, 0 when absent.
    pub index: u32,
    /// Name with the index removed (`IMG_3479.JPG`).
    pub key: String,
    /// Stem with the index removed (`IMG_3479`).
    pub key_stem: String,
}

/// Parse a media base name. The duplicate index sits just before the extension.
pub fn parse_media_name(name: &str) -> MediaName {
    let (stem, ext) = split_extension(name);
    let (key_stem, index) = strip_duplicate_index(stem);
    let key = match ext {
        Some(ext) => format!("{key_stem}.{ext}"),
        None => key_stem.to_string(),
    };
    MediaName {
        name: name.to_string(),
        stem: stem.to_string(),
        extension: ext.unwrap_or_default().to_string(),
        index,
        key,
        key_stem: key_stem.to_string(),
    }
}

/// A JSON sidecar file name broken into its match key and duplicate index.
#[derive(Debug, Clone, PartialEq)]
pub struct SidecarName {
    pub name: String,
    /// What the sidecar describes, as it survived truncation (`IMG_3479.JPG`).
    pub key: String,
    pub index: u32,
}

const SUPPLEMENTAL_MARKER: &str = "supplemental-metadata";

/// Parse a `.json` sidecar base name. Returns `None` for other extensions.
///
/// Newer exports insert `.supplemental-metadata` (itself subject to
/// truncation) between the media name and `.json`; it is dropped when what
/// precedes it carries a media extension.
pub fn parse_sidecar_name(name: &str, classifier: &Classifier) -> Option<SidecarName> {
    let (body, ext) = split_extension(name);
    if !ext?.eq_ignore_ascii_case("json") {
        return None;
    }
    let (mut key, index) = strip_duplicate_index(body);
    if let (rest, Some(marker)) = split_extension(key) {
        let marker = marker.to_lowercase();
        if SUPPLEMENTAL_MARKER.starts_with(&marker) && classifier.has_media_extension(rest) {
            key = rest;
        }
    }
    Some(SidecarName {
        name: name.to_string(),
        key: key.to_string(),
        index,
    })
}

/// If `stem` ends with one of the edited-variant `suffixes`, return the
/// original stem. Suffixes compare ASCII-case-insensitively.
pub fn strip_edited_suffix<'a, S: AsRef<str>>(stem: &'a str, suffixes: &[S]) -> Option<&'a str> {
    suffixes.iter().find_map(|suffix| {
        let suffix = suffix.as_ref();
        let cut = stem.len().checked_sub(suffix.len())?;
        let tail = stem.get(cut..)?;
        (cut > 0 && tail.eq_ignore_ascii_case(suffix)).then(|| &stem[..cut])
    })
}

/// Join an archive-relative directory and a base name with `/`.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Directory part of an archive-relative path (`""` for top-level entries).
pub fn parent(path: &str) -> &str {
    path.rfind('/').map(|pos| &path[..pos]).unwrap_or("")
}

/// Last component of an archive-relative path.
pub fn base_name(path: &str) -> &str {
    path.rfind('/').map(|pos| &path[pos + 1..]).unwrap_or(path)
}
