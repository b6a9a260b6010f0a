//! Resolver configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user file passed with `--config` overrides any subset of
//! keys.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [matching]
//! max_name_length = 46          # UTF-16 units the export keeps of a sidecar name
//! edited_suffixes = ["-edited", "-bearbeitet", "-modifié", ...]
//! companion_extensions = ["mp", "mp4", "mov"]
//! image_extensions = ["jpg", "jpeg", "heic", ...]
//! video_extensions = ["mp4", "mov", "mp", ...]
//!
//! [albums]
//! year_bucket_patterns = ['^Photos from \d{4}$']
//! folder_albums = false         # plain directories with media become albums
//!
//! [dates]
//! method = "NAME-EXIF"          # NONE | NAME | EXIF | NAME-EXIF | EXIF-NAME
//! filename_timezone = "Local"   # Local | UTC | IANA name
//! prefer_sidecar = true
//!
//! [dedup]
//! fingerprint = "size"          # size | sha256
//!
//! [walk]
//! ignore_files = [".DS_Store", "SYNOFILE_THUMB_*", ...]
//! ignore_directories = ["@eaDir", ".@__thumb"]
//! include = []                  # empty = everything not ignored
//! always_include = ["json", "xmp"]
//!
//! [upload]
//! force_without_sidecar = false
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::archive::WalkFilter;
use crate::date::{DateMethod, FilenameTimezone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Resolver configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Sidecar-to-media matching rules.
    pub matching: MatchingConfig,
    /// Year-bucket and album classification.
    pub albums: AlbumsConfig,
    /// Capture-date precedence.
    pub dates: DatesConfig,
    /// Cross-directory duplicate detection.
    pub dedup: DedupConfig,
    /// Which archive entries are looked at.
    pub walk: WalkConfig,
    /// Policy for what the caller receives.
    pub upload: UploadConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ResolverConfig {
    /// Validate values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matching.max_name_length == 0 {
            return Err(ConfigError::Validation(
                "matching.max_name_length must be positive".into(),
            ));
        }
        if self.matching.image_extensions.is_empty() && self.matching.video_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "matching needs at least one image or video extension".into(),
            ));
        }
        if let Some(suffix) = self.matching.edited_suffixes.iter().find(|s| s.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "matching.edited_suffixes contains an empty entry: {suffix:?}"
            )));
        }
        self.albums.year_bucket_regexes()?;
        WalkFilter::from_config(&self.walk)?;
        Ok(())
    }
}

/// Sidecar-to-media matching rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// UTF-16 code units the export keeps of a name before `(N)` and `.json`
    /// are appended.
    pub max_name_length: usize,
    /// Stem suffixes of edited copies (`IMG_1-edited.jpg`). Compared
    /// ASCII-case-insensitively.
    pub edited_suffixes: Vec<String>,
    /// Container extensions that ride along with a primary of the same stem
    /// (motion photos, live photos).
    pub companion_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_name_length: 46,
            edited_suffixes: strings(&[
                "-edited",
                "-bearbeitet",
                "-modifié",
                "-modificato",
                "-editado",
                "-bewerkt",
                "-編集済み",
                "-편집됨",
            ]),
            companion_extensions: strings(&["mp", "mp4", "mov"]),
            image_extensions: strings(&[
                "jpg", "jpeg", "heic", "heif", "png", "gif", "webp", "avif", "bmp", "tif", "tiff",
                "dng", "cr2", "cr3", "nef", "arw", "orf", "rw2", "raf",
            ]),
            video_extensions: strings(&[
                "mp4", "mov", "mp", "m4v", "3gp", "avi", "mkv", "webm", "mts", "m2ts", "mpg",
                "wmv",
            ]),
        }
    }
}

impl MatchingConfig {
    pub fn is_companion_extension(&self, ext: &str) -> bool {
        self.companion_extensions
            .iter()
            .any(|c| c.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Year-bucket and album classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlbumsConfig {
    /// Regexes matched against a directory's name. A match makes the
    /// directory a year bucket.
    pub year_bucket_patterns: Vec<String>,
    /// Treat plain directories that hold media as albums named after the
    /// directory. Older exports have no album sidecars.
    pub folder_albums: bool,
}

impl Default for AlbumsConfig {
    fn default() -> Self {
        Self {
            year_bucket_patterns: strings(&[r"^Photos from \d{4}$"]),
            folder_albums: false,
        }
    }
}

impl AlbumsConfig {
    pub fn year_bucket_regexes(&self) -> Result<Vec<Regex>, ConfigError> {
        self.year_bucket_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    ConfigError::Validation(format!("albums.year_bucket_patterns: {e}"))
                })
            })
            .collect()
    }
}

/// Capture-date precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatesConfig {
    /// Sources tried when the sidecar has no timestamp (or is not preferred).
    pub method: DateMethod,
    /// Zone file-name stamps are read in.
    pub filename_timezone: FilenameTimezone,
    /// A sidecar timestamp wins over every other source.
    pub prefer_sidecar: bool,
}

impl Default for DatesConfig {
    fn default() -> Self {
        Self {
            method: DateMethod::default(),
            filename_timezone: FilenameTimezone::default(),
            prefer_sidecar: true,
        }
    }
}

/// How duplicate candidates are fingerprinted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintKind {
    #[default]
    Size,
    /// SHA-256 of the content. Reads every media file.
    Sha256,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupConfig {
    pub fingerprint: FingerprintKind,
}

/// Which archive entries are looked at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalkConfig {
    /// File-name globs that are skipped.
    pub ignore_files: Vec<String>,
    /// Directory-name globs that are not descended into.
    pub ignore_directories: Vec<String>,
    /// When non-empty, only files matching one of these globs are kept.
    pub include: Vec<String>,
    /// Extensions that bypass `include` (sidecars must survive a media filter).
    pub always_include: Vec<String>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            ignore_files: strings(&[
                ".DS_Store",
                "._*",
                "SYNOFILE_THUMB_*",
                "Thumbs.db",
                "print-subscriptions.json",
                "shared_album_comments.json",
                "user-generated-memory-titles.json",
            ]),
            ignore_directories: strings(&["@eaDir", ".@__thumb"]),
            include: Vec::new(),
            always_include: strings(&["json", "xmp"]),
        }
    }
}

/// Policy for what the caller receives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Emit media without any sidecar, with empty metadata.
    pub force_without_sidecar: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel matching workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Worker count for directory matching: `max_processes` capped at the
/// machine's cores, or every core when unset.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    match config.max_processes {
        Some(n) => n.min(cores),
        None => cores,
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// The built-in [`ResolverConfig`] as a TOML table. User files are layered
/// over it, so a file only needs the keys it changes.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ResolverConfig::default())?)
}

/// Layer `overlay` over `base`.
///
/// Sections merge key by key, so `[matching] max_name_length = 40` leaves the
/// other matching keys at their defaults. Lists such as `edited_suffixes`
/// are replaced whole, never appended to.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut table), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                let merged = match table.remove(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => value,
                };
                table.insert(key, merged);
            }
            toml::Value::Table(table)
        }
        (_, replacement) => replacement,
    }
}

/// Read a user config file without applying defaults.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    Ok(toml::from_str(&fs::read_to_string(path)?)?)
}

/// Layer the user's table (if any) over `base`, deserialize, and validate.
///
/// Unknown keys fail here, as do values `validate` rejects (a zero
/// `max_name_length`, a year pattern that is not a regex, a bad walk glob).
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ResolverConfig, ConfigError> {
    let merged = overlay.into_iter().fold(base, merge_toml);
    let config: ResolverConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Config for a run: the `--config` file over stock defaults, or the stock
/// defaults alone.
pub fn load_config(path: Option<&Path>) -> Result<ResolverConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# takeout-reconcile configuration
# ===============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass the file with `takeout-reconcile --config config.toml scan ROOT`.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Sidecar matching
# ---------------------------------------------------------------------------
[matching]
# UTF-16 code units the export keeps of a sidecar name before appending
# "(N)" and ".json". Names longer than this are compared after truncation.
max_name_length = 46

# Stem suffixes of edited copies. An edited copy without its own sidecar
# inherits the sidecar of the original.
edited_suffixes = ["-edited", "-bearbeitet", "-modifié", "-modificato", "-editado", "-bewerkt", "-編集済み", "-편집됨"]

# Containers attached to the primary of the same stem (motion photos,
# live photos) instead of becoming records of their own.
companion_extensions = ["mp", "mp4", "mov"]

image_extensions = ["jpg", "jpeg", "heic", "heif", "png", "gif", "webp", "avif", "bmp", "tif", "tiff", "dng", "cr2", "cr3", "nef", "arw", "orf", "rw2", "raf"]
video_extensions = ["mp4", "mov", "mp", "m4v", "3gp", "avi", "mkv", "webm", "mts", "m2ts", "mpg", "wmv"]

# ---------------------------------------------------------------------------
# Albums
# ---------------------------------------------------------------------------
[albums]
# Directory names matching one of these regexes are year buckets, not albums.
year_bucket_patterns = ['^Photos from \d{4}$']

# Treat plain directories holding media as albums named after the directory.
# Useful for old exports without album sidecars.
folder_albums = false

# ---------------------------------------------------------------------------
# Capture dates
# ---------------------------------------------------------------------------
[dates]
# Sources tried when the sidecar has no timestamp:
# NONE, NAME, EXIF, NAME-EXIF, EXIF-NAME
method = "NAME-EXIF"

# Zone for stamps read from file names: Local, UTC, or an IANA name such as
# "Europe/Paris".
filename_timezone = "Local"

# A sidecar timestamp wins over every other source. Set to false to try
# `method` first and use the sidecar only as a fallback.
prefer_sidecar = true

# ---------------------------------------------------------------------------
# Duplicate detection
# ---------------------------------------------------------------------------
[dedup]
# "size" compares file sizes; "sha256" hashes every media file.
fingerprint = "size"

# ---------------------------------------------------------------------------
# Archive walk
# ---------------------------------------------------------------------------
[walk]
ignore_files = [".DS_Store", "._*", "SYNOFILE_THUMB_*", "Thumbs.db", "print-subscriptions.json", "shared_album_comments.json", "user-generated-memory-titles.json"]
ignore_directories = ["@eaDir", ".@__thumb"]

# When non-empty, only files matching one of these globs are considered.
include = []

# Extensions that are always considered, even when `include` is set.
always_include = ["json", "xmp"]

# ---------------------------------------------------------------------------
# Upload policy
# ---------------------------------------------------------------------------
[upload]
# Emit media without any sidecar, with empty metadata.
force_without_sidecar = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel matching workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
