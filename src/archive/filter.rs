//! Glob-based walk filter.
//!
//! Globs are matched case-insensitively against base names. Directory globs
//! are also tried against the full archive-relative path so `Takeout/@eaDir`
//! style patterns work.

use crate::config::{ConfigError, WalkConfig};
use crate::naming::split_extension;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct WalkFilter {
    ignore_files: GlobSet,
    ignore_directories: GlobSet,
    /// `None` accepts every file not ignored.
    include: Option<GlobSet>,
    always_include: HashSet<String>,
}

fn build_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern.as_ref())
                .case_insensitive(true)
                .build()?,
        );
    }
    builder.build()
}

impl WalkFilter {
    pub fn new<S: AsRef<str>>(
        ignore_files: &[S],
        ignore_directories: &[S],
        include: &[S],
        always_include: &[S],
    ) -> Result<Self, globset::Error> {
        Ok(Self {
            ignore_files: build_set(ignore_files)?,
            ignore_directories: build_set(ignore_directories)?,
            include: if include.is_empty() {
                None
            } else {
                Some(build_set(include)?)
            },
            always_include: always_include
                .iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        })
    }

    pub fn from_config(config: &WalkConfig) -> Result<Self, ConfigError> {
        Self::new(
            &config.ignore_files,
            &config.ignore_directories,
            &config.include,
            &config.always_include,
        )
        .map_err(|e| ConfigError::Validation(format!("walk: {e}")))
    }

    /// True when the directory at `path` (named `name`) must not be descended into.
    pub fn skip_directory(&self, path: &str, name: &str) -> bool {
        self.ignore_directories.is_match(name) || self.ignore_directories.is_match(path)
    }

    pub fn accept_file(&self, name: &str) -> bool {
        if self.ignore_files.is_match(name) {
            return false;
        }
        let always = split_extension(name)
            .1
            .is_some_and(|ext| self.always_include.contains(&ext.to_lowercase()));
        match &self.include {
            Some(include) if !always => include.is_match(name),
            _ => true,
        }
    }
}
