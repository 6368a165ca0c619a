//! Listen events and timestamp normalization.
//!
//! Scrobbles arrive either as Unix epoch integers or as text (RFC 3339,
//! `YYYY-MM-DD HH:MM:SS`, or a bare date). Everything is normalized to a single
//! `DateTime<Utc>` instant before it reaches the store.

use crate::error::ConfigError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A track as identified by the tracking service. An empty `album` means
/// "no album".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Track {
    pub artist: String,
    #[serde(default)]
    pub album: String,
    pub name: String,
}

/// One recorded play. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listen {
    pub user: String,
    pub track: Track,
    pub listened_at: DateTime<Utc>,
}

/// Timestamp as it appears in import files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(i64),
    Text(String),
}

impl RawTimestamp {
    pub fn normalize(&self) -> Result<DateTime<Utc>, ConfigError> {
        match self {
            Self::Epoch(secs) => from_epoch(*secs),
            Self::Text(text) => parse_timestamp(text),
        }
    }
}

/// Import record for a single listen, one JSON object per line.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenRecord {
    pub artist: String,
    #[serde(default)]
    pub album: String,
    pub track: String,
    pub timestamp: RawTimestamp,
}

impl ListenRecord {
    pub fn into_listen(self, user: &str) -> Result<Listen, ConfigError> {
        let listened_at = self.timestamp.normalize()?;
        Ok(Listen {
            user: user.to_string(),
            track: Track {
                artist: self.artist,
                album: self.album,
                name: self.track,
            },
            listened_at,
        })
    }
}

pub fn from_epoch(secs: i64) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| ConfigError::InvalidTimestamp(secs.to_string()))
}

/// Parse a textual timestamp into a UTC instant.
///
/// Accepted forms, tried in order:
/// - an integer (Unix epoch seconds)
/// - RFC 3339 / ISO-8601 with offset (`2024-03-15T20:00:00+01:00`, `...Z`)
/// - `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`, taken as UTC
/// - `YYYY-MM-DD`, taken as midnight UTC
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ConfigError> {
    let text = text.trim();

    if let Ok(secs) = text.parse::<i64>() {
        return from_epoch(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(ConfigError::InvalidTimestamp(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_epoch_and_iso_normalize_to_same_instant() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 20, 0, 0).unwrap();

        assert_eq!(parse_timestamp("1710532800").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-15T20:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-15T21:00:00+01:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-15 20:00:00").unwrap(), expected);
        assert_eq!(RawTimestamp::Epoch(1_710_532_800).normalize().unwrap(), expected);
    }

    #[test]
    fn test_bare_date_is_midnight_utc() {
        let parsed = parse_timestamp("2024-03-15").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_garbage_timestamp_is_rejected() {
        assert!(matches!(
            parse_timestamp("last tuesday"),
            Err(ConfigError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_listen_record_accepts_both_timestamp_shapes() {
        let epoch: ListenRecord = serde_json::from_str(
            r#"{"artist":"Low","album":"Things We Lost in the Fire","track":"Sunflower","timestamp":1710532800}"#,
        )
        .unwrap();
        let text: ListenRecord = serde_json::from_str(
            r#"{"artist":"Low","track":"Sunflower","timestamp":"2024-03-15T20:00:00Z"}"#,
        )
        .unwrap();

        let a = epoch.into_listen("me").unwrap();
        let b = text.into_listen("me").unwrap();
        assert_eq!(a.listened_at, b.listened_at);
        assert_eq!(a.track.album, "Things We Lost in the Fire");
        assert!(b.track.album.is_empty(), "Missing album means no album");
    }
}
