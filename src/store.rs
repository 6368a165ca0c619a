//! # Store Contract
//!
//! The read-only query surface the analytics engine consumes. The engine never
//! issues SQL itself; it asks a [`Store`] for pre-aggregated slices and works on
//! those. [`SqliteStore`](crate::db::SqliteStore) is the production
//! implementation.
//!
//! Every method fails with a [`QueryError`] naming the query. There are no
//! retries at this layer.

use crate::error::{ConfigError, QueryError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidWindow(format!(
                "start {start} lies after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` long window ending `offset_days` before `now`.
    #[must_use]
    pub fn trailing(now: DateTime<Utc>, days: u32, offset_days: u32) -> Self {
        let end = now - Duration::days(i64::from(offset_days));
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Whether an aggregate is keyed by artist or by artist+album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    #[default]
    Artist,
    Album,
}

impl FromStr for Subject {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "artist" | "artists" => Ok(Self::Artist),
            "album" | "albums" => Ok(Self::Album),
            other => Err(ConfigError::UnknownSubject(other.to_string())),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artist => f.write_str("artist"),
            Self::Album => f.write_str("album"),
        }
    }
}

/// Artist, or artist+album. Orders by artist, then album.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubjectKey {
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
}

impl SubjectKey {
    #[must_use]
    pub fn artist(artist: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            album: None,
        }
    }

    #[must_use]
    pub fn album(artist: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            album: Some(album.into()),
        }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.album {
            Some(album) => write!(f, "{} - {}", self.artist, album),
            None => f.write_str(&self.artist),
        }
    }
}

/// Raw (tag, count) association for one subject, as delivered by the tagging
/// source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAssociation {
    pub subject: SubjectKey,
    pub tag: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistCount {
    pub artist: String,
    pub scrobbles: u64,
}

/// Scrobbles for one (artist, album) pair. `album` may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumCount {
    pub artist: String,
    pub album: String,
    pub scrobbles: u64,
}

/// Distinct albums and listens for one artist within a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistBreadth {
    pub artist: String,
    pub albums: u32,
    pub listens: u64,
}

/// Per-subject lifetime aggregate used by the forgotten bander.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgottenCandidate {
    pub key: SubjectKey,
    pub total_scrobbles: u64,
    pub first_listen: DateTime<Utc>,
    pub last_listen: DateTime<Utc>,
}

/// Inclusive bounds on an instant; `None` leaves that side open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InstantRange {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl InstantRange {
    pub fn new(
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Self, ConfigError> {
        if let (Some(a), Some(b)) = (after, before) {
            if a > b {
                return Err(ConfigError::InvalidWindow(format!(
                    "lower bound {a} lies after upper bound {b}"
                )));
            }
        }
        Ok(Self { after, before })
    }
}

/// `HAVING` filter applied by the store before candidates reach the bander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CandidateFilter {
    pub min_scrobbles: u64,
    pub first_listen: InstantRange,
    pub last_listen: InstantRange,
}

/// Distinct track and album counts for a window (albums with a name only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackAlbumCounts {
    pub tracks: u64,
    pub albums: u64,
}

/// Read-only query contract.
///
/// Implementations return rows in a deterministic order (documented per
/// method); callers still sort explicitly before producing ordered output.
pub trait Store {
    /// Scrobbles for `user`, all-time when `window` is `None`.
    fn total_scrobbles(&self, user: &str, window: Option<&Window>) -> Result<u64, QueryError>;

    /// Distinct artists for `user`, all-time when `window` is `None`.
    fn total_artists(&self, user: &str, window: Option<&Window>) -> Result<u64, QueryError>;

    /// First and last listen instant, `None` for an empty history.
    fn listen_span(
        &self,
        user: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, QueryError>;

    /// Top artists by scrobbles, ties by name.
    fn top_artists(
        &self,
        user: &str,
        window: &Window,
        limit: usize,
    ) -> Result<Vec<ArtistCount>, QueryError>;

    /// Top named albums by scrobbles, ties by artist then album.
    fn top_albums(
        &self,
        user: &str,
        window: &Window,
        limit: usize,
    ) -> Result<Vec<AlbumCount>, QueryError>;

    /// Top named albums of one artist.
    fn top_albums_for_artist(
        &self,
        user: &str,
        artist: &str,
        window: &Window,
        limit: usize,
    ) -> Result<Vec<AlbumCount>, QueryError>;

    /// All (artist, tag, count) rows, descending count within each artist.
    fn artist_tags(&self) -> Result<Vec<TagAssociation>, QueryError>;

    /// All (artist, album, tag, count) rows, descending count within each album.
    fn album_tags(&self) -> Result<Vec<TagAssociation>, QueryError>;

    /// Scrobbles per (artist, album) in the window, including empty albums.
    fn album_listen_counts(
        &self,
        user: &str,
        window: &Window,
    ) -> Result<Vec<AlbumCount>, QueryError>;

    /// Distinct albums and listens per artist, descending by listens.
    fn artist_breadth(&self, user: &str, window: &Window)
        -> Result<Vec<ArtistBreadth>, QueryError>;

    /// Earliest all-time listen of every artist.
    fn artist_first_listens(&self, user: &str) -> Result<Vec<DateTime<Utc>>, QueryError>;

    fn track_album_counts(
        &self,
        user: &str,
        window: &Window,
    ) -> Result<TrackAlbumCounts, QueryError>;

    /// Raw listen instants in the window, ascending.
    fn listen_times(&self, user: &str, window: &Window)
        -> Result<Vec<DateTime<Utc>>, QueryError>;

    /// Lifetime aggregates per artist or album that pass `filter`.
    fn forgotten_candidates(
        &self,
        user: &str,
        subject: Subject,
        filter: &CandidateFilter,
    ) -> Result<Vec<ForgottenCandidate>, QueryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trailing_window_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let window = Window::trailing(now, 30, 7);

        assert_eq!(window.end, now - Duration::days(7), "Offset shifts the end back");
        assert_eq!(window.start, window.end - Duration::days(30));
        assert!(!window.is_empty());
        assert!(Window::trailing(now, 0, 0).is_empty(), "Zero days hold nothing");
    }

    #[test]
    fn test_window_rejects_reversed_bounds() {
        let a = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert!(Window::new(a, b).is_err());
        assert!(InstantRange::new(Some(a), Some(b)).is_err());
    }

    #[test]
    fn test_instant_range_allows_single_instant() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let range = InstantRange::new(Some(a), Some(a)).expect("Equal bounds are a valid range");

        assert_eq!(range.after, Some(a));
        assert_eq!(range.before, Some(a));
        assert_eq!(InstantRange::default().after, None, "Default range is open");
    }

    #[test]
    fn test_subject_parsing() {
        assert_eq!("Album".parse::<Subject>().unwrap(), Subject::Album);
        assert_eq!("artists".parse::<Subject>().unwrap(), Subject::Artist);
        assert!("track".parse::<Subject>().is_err());
    }
}
