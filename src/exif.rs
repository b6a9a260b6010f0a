//! Embedded capture-time lookup.
//!
//! The resolver never decodes media itself. When the date method reaches
//! EXIF it asks an [`ExifSource`] for the capture time of an archive path.
//! [`NoExif`] is the default: it knows nothing, so EXIF steps fall through.

use chrono::{DateTime, Utc};

/// Source of embedded capture times.
///
/// `Sync` so lookups can run from the rayon pool.
pub trait ExifSource: Sync {
    /// Capture time embedded in the file at the archive-relative `path`.
    fn capture_time(&self, path: &str) -> Option<DateTime<Utc>>;
}

/// Source that never finds a date.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExif;

impl ExifSource for NoExif {
    fn capture_time(&self, _path: &str) -> Option<DateTime<Utc>> {
        None
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned capture times keyed by path, recording every lookup.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockExif {
        pub times: HashMap<String, DateTime<Utc>>,
        pub lookups: Mutex<Vec<String>>,
    }

    impl MockExif {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_time(mut self, path: &str, at: DateTime<Utc>) -> Self {
            self.times.insert(path.to_string(), at);
            self
        }

        pub fn get_lookups(&self) -> Vec<String> {
            let mut lookups = self.lookups.lock().unwrap().clone();
            lookups.sort();
            lookups
        }
    }

    impl ExifSource for MockExif {
        fn capture_time(&self, path: &str) -> Option<DateTime<Utc>> {
            self.lookups.lock().unwrap().push(path.to_string());
            self.times.get(path).copied()
        }
    }

    #[test]
    fn no_exif_knows_nothing() {
        assert!(NoExif.capture_time("a.jpg").is_none());
    }

    #[test]
    fn mock_records_lookups() {
        let at = DateTime::from_timestamp(1_000_000_000, 0).unwrap();
        let exif = MockExif::new().with_time("Album/a.jpg", at);

        assert_eq!(exif.capture_time("Album/a.jpg"), Some(at));
        assert_eq!(exif.capture_time("Album/b.jpg"), None);
        assert_eq!(exif.get_lookups(), vec!["Album/a.jpg", "Album/b.jpg"]);
    }
}
