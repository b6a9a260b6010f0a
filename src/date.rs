//! Capture-date resolution.
//!
//! A sidecar timestamp is authoritative. Without one, the configured
//! [`DateMethod`] decides whether the file name, EXIF, or both (in either
//! order) are consulted. Nothing here ever falls back to the current time: an
//! asset with no recoverable date keeps `captured_at = None`.
//!
//! File names carry local wall-clock time, so the stamp is interpreted in the
//! configured [`FilenameTimezone`] before conversion to UTC.

use crate::config::DatesConfig;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Order in which non-sidecar date sources are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateMethod {
    None,
    Name,
    Exif,
    #[default]
    NameThenExif,
    ExifThenName,
}

impl DateMethod {
    fn sources(self) -> &'static [DateSource] {
        match self {
            DateMethod::None => &[],
            DateMethod::Name => &[DateSource::Filename],
            DateMethod::Exif => &[DateSource::Exif],
            DateMethod::NameThenExif => &[DateSource::Filename, DateSource::Exif],
            DateMethod::ExifThenName => &[DateSource::Exif, DateSource::Filename],
        }
    }
}

impl FromStr for DateMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "NONE" => Ok(DateMethod::None),
            "NAME" | "FILENAME" => Ok(DateMethod::Name),
            "EXIF" => Ok(DateMethod::Exif),
            "NAME-EXIF" | "FILENAME-EXIF" => Ok(DateMethod::NameThenExif),
            "EXIF-NAME" | "EXIF-FILENAME" => Ok(DateMethod::ExifThenName),
            other => Err(format!(
                "invalid date method {other:?}, expecting NONE|NAME|EXIF|NAME-EXIF|EXIF-NAME"
            )),
        }
    }
}

impl fmt::Display for DateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DateMethod::None => "NONE",
            DateMethod::Name => "NAME",
            DateMethod::Exif => "EXIF",
            DateMethod::NameThenExif => "NAME-EXIF",
            DateMethod::ExifThenName => "EXIF-NAME",
        })
    }
}

impl TryFrom<String> for DateMethod {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DateMethod> for String {
    fn from(method: DateMethod) -> Self {
        method.to_string()
    }
}

/// Zone in which file-name stamps are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilenameTimezone {
    #[default]
    Local,
    Utc,
    Named(chrono_tz::Tz),
}

impl FilenameTimezone {
    /// Interpret `naive` as wall-clock time in this zone. During a DST fold
    /// the earlier instant wins; times inside a DST gap yield `None`.
    pub fn to_utc(self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            FilenameTimezone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|d| d.with_timezone(&Utc)),
            FilenameTimezone::Utc => Some(Utc.from_utc_datetime(&naive)),
            FilenameTimezone::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|d| d.with_timezone(&Utc)),
        }
    }
}

impl FromStr for FilenameTimezone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("local") {
            Ok(FilenameTimezone::Local)
        } else if s.eq_ignore_ascii_case("utc") {
            Ok(FilenameTimezone::Utc)
        } else {
            s.parse::<chrono_tz::Tz>()
                .map(FilenameTimezone::Named)
                .map_err(|_| format!("unknown time zone {s:?}"))
        }
    }
}

impl fmt::Display for FilenameTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilenameTimezone::Local => f.write_str("Local"),
            FilenameTimezone::Utc => f.write_str("UTC"),
            FilenameTimezone::Named(tz) => f.write_str(tz.name()),
        }
    }
}

impl TryFrom<String> for FilenameTimezone {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FilenameTimezone> for String {
    fn from(tz: FilenameTimezone) -> Self {
        tz.to_string()
    }
}

/// Where a record's capture time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    Sidecar,
    Filename,
    Exif,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub at: DateTime<Utc>,
    pub source: DateSource,
}

// PXL_20221228_185930354, IMG-20190405-WA0001, 2023-09-22 14.30.05,
// Screenshot_2023-09-22-14-30-05, VID_20200101_000000
static NAME_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[^0-9])(?P<y>(?:19|20)\d{2})[-_.]?(?P<mo>0[1-9]|1[0-2])[-_.]?(?P<d>0[1-9]|[12]\d|3[01])(?:[-_. T]?(?P<h>[01]\d|2[0-3])[-_.:]?(?P<mi>[0-5]\d)[-_.:]?(?P<s>[0-5]\d))?",
    )
    .expect("date stamp pattern must compile")
});

/// Wall-clock stamp embedded in a file name, if any. Date-only stamps read as
/// midnight.
pub fn naive_from_name(name: &str) -> Option<NaiveDateTime> {
    let caps = NAME_STAMP.captures(name)?;
    let num = |key: &str| caps.name(key).and_then(|m| m.as_str().parse::<u32>().ok());
    let date = NaiveDate::from_ymd_opt(num("y")? as i32, num("mo")?, num("d")?)?;
    let time = match (num("h"), num("mi"), num("s")) {
        (Some(h), Some(mi), Some(s)) => NaiveTime::from_hms_opt(h, mi, s)?,
        _ => NaiveTime::from_hms_opt(0, 0, 0)?,
    };
    Some(date.and_time(time))
}

pub fn date_from_name(name: &str, tz: FilenameTimezone) -> Option<DateTime<Utc>> {
    naive_from_name(name).and_then(|naive| tz.to_utc(naive))
}

/// Pick the capture time for one asset.
///
/// `exif` is only called when the method reaches it, so callers can hand in a
/// lookup that does I/O.
pub fn resolve_date(
    sidecar: Option<DateTime<Utc>>,
    file_name: &str,
    exif: impl FnOnce() -> Option<DateTime<Utc>>,
    config: &DatesConfig,
) -> Option<ResolvedDate> {
    let from_sidecar = sidecar.map(|at| ResolvedDate {
        at,
        source: DateSource::Sidecar,
    });
    if config.prefer_sidecar && from_sidecar.is_some() {
        return from_sidecar;
    }

    let mut exif = Some(exif);
    for source in config.method.sources() {
        let at = match source {
            DateSource::Filename => date_from_name(file_name, config.filename_timezone),
            DateSource::Exif => exif.take().and_then(|lookup| lookup()),
            DateSource::Sidecar => None,
        };
        if let Some(at) = at {
            return Some(ResolvedDate {
                at,
                source: *source,
            });
        }
    }
    from_sidecar
}
