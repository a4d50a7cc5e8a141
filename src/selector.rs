//! Latest-upload selection over an unordered storage listing.

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

/// One object in a user's storage folder, as reported by the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        serialize_with = "time::serde::rfc3339::option::serialize"
    )]
    pub created_at: Option<OffsetDateTime>,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, created_at: Option<OffsetDateTime>) -> Self {
        Self {
            name: Some(name.into()),
            created_at,
        }
    }
}

/// Parse a listing timestamp.
///
/// Accepts RFC 3339 and bare `YYYY-MM-DD` dates (taken as midnight UTC).
/// Anything else yields `None` and the record sorts as undated.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    match Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        Ok(date) => Some(date.midnight().assume_utc()),
        Err(_) => {
            log::debug!("Ignoring unparseable created_at value {:?}", raw);
            None
        }
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Newest first; undated records after every dated one.
fn newest_first(a: &FileRecord, b: &FileRecord) -> Ordering {
    match (&a.created_at, &b.created_at) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Order a listing newest first. The sort is stable, so records with equal
/// (or equally missing) timestamps keep their listing order.
pub fn sort_newest_first(files: &mut [FileRecord]) {
    files.sort_by(newest_first);
}

/// Pick the most recently created record, or `None` for an empty listing.
pub fn select_latest(mut files: Vec<FileRecord>) -> Option<FileRecord> {
    sort_newest_first(&mut files);
    files.into_iter().next()
}
