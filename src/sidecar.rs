//! JSON sidecar reader.
//!
//! Two document shapes live side by side in a takeout:
//!
//! ```text
//! media sidecar (IMG_1.jpg.json)       album sidecar (metadata.json)
//! {                                    {
//!   "title": "IMG_1.jpg",                "title": "Trip",
//!   "photoTakenTime": {                  "description": "",
//!     "timestamp": "1695395000"          "date": { "timestamp": "1695395000" },
//!   },                                   "geoData": { ... }
//!   "geoData": { ... },                }
//!   "favorited": true
//! }
//! ```
//!
//! A document with `photoTakenTime` is a media sidecar; one with only `date`
//! describes the album of its directory. Unknown keys are ignored, the export
//! adds new ones every few years.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid timestamp: {0:?}")]
    Timestamp(String),
    #[error("unexpected sidecar shape: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Metadata from one media sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct SidecarMetadata {
    /// Original title, which may contain characters the export replaced in
    /// the file name. Display only; never a match key.
    pub title: String,
    /// Capture time, epoch seconds.
    pub taken_at: i64,
    pub url_present: bool,
    pub geo: Option<GeoPoint>,
    pub description: Option<String>,
    pub favorited: bool,
    pub archived: bool,
    pub trashed: bool,
}

impl SidecarMetadata {
    pub fn taken_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.taken_at, 0)
    }
}

/// Metadata from an album-definition sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumMetadata {
    pub title: String,
    pub description: Option<String>,
    pub created_at: Option<i64>,
    pub geo: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SidecarDocument {
    Media(SidecarMetadata),
    Album(AlbumMetadata),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSidecar {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    photo_taken_time: Option<RawTime>,
    date: Option<RawTime>,
    geo_data: Option<RawGeo>,
    geo_data_exif: Option<RawGeo>,
    #[serde(default)]
    favorited: bool,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    trashed: bool,
}

#[derive(Deserialize)]
struct RawTime {
    timestamp: Option<RawTimestamp>,
}

/// The export writes timestamps as decimal strings; accept bare integers too.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
struct RawGeo {
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    #[serde(default)]
    altitude: f64,
}

impl RawGeo {
    /// `0,0` is what the export writes when it has no location.
    fn into_point(self) -> Option<GeoPoint> {
        (self.latitude != 0.0 || self.longitude != 0.0).then_some(GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
        })
    }
}

fn timestamp(time: RawTime, field: &str) -> Result<i64, SidecarError> {
    match time.timestamp {
        Some(RawTimestamp::Number(n)) => Ok(n),
        Some(RawTimestamp::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| SidecarError::Timestamp(s)),
        None => Err(SidecarError::Shape(format!("{field}.timestamp missing"))),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Parse any sidecar document, deciding media vs album from its keys.
pub fn parse_document(bytes: &[u8]) -> Result<SidecarDocument, SidecarError> {
    let raw: RawSidecar = serde_json::from_slice(bytes)?;

    if let Some(taken) = raw.photo_taken_time {
        let title = raw
            .title
            .ok_or_else(|| SidecarError::Shape("title missing".into()))?;
        let geo = raw
            .geo_data
            .and_then(RawGeo::into_point)
            .or_else(|| raw.geo_data_exif.and_then(RawGeo::into_point));
        return Ok(SidecarDocument::Media(SidecarMetadata {
            title,
            taken_at: timestamp(taken, "photoTakenTime")?,
            url_present: raw.url.is_some_and(|u| !u.is_empty()),
            geo,
            description: non_empty(raw.description),
            favorited: raw.favorited,
            archived: raw.archived,
            trashed: raw.trashed,
        }));
    }

    if let Some(date) = raw.date {
        return Ok(SidecarDocument::Album(AlbumMetadata {
            title: raw.title.unwrap_or_default(),
            description: non_empty(raw.description),
            created_at: timestamp(date, "date").ok(),
            geo: raw.geo_data.and_then(RawGeo::into_point),
        }));
    }

    Err(SidecarError::Shape(
        "neither photoTakenTime nor date present".into(),
    ))
}

/// Parse a media sidecar. Album documents are a shape error.
pub fn parse(bytes: &[u8]) -> Result<SidecarMetadata, SidecarError> {
    match parse_document(bytes)? {
        SidecarDocument::Media(meta) => Ok(meta),
        SidecarDocument::Album(_) => Err(SidecarError::Shape(
            "album sidecar where media sidecar expected".into(),
        )),
    }
}
