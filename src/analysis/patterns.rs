//! Listening-pattern statistics: album breadth per artist, new artists,
//! repeat listening, and album vs. track orientation.

use crate::analysis::tags::round2;
use crate::store::ArtistBreadth;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Size of the "core" artist set compared against all artists.
pub const CORE_ARTISTS: usize = 100;
/// Artists with at least this many distinct albums count as explored in depth.
pub const DEEP_ARTIST_ALBUMS: u32 = 3;
/// Average tracks per album at or above which listening is album-oriented.
pub const ALBUM_ORIENTED_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListeningStyle {
    AlbumOriented,
    TrackOriented,
}

impl ListeningStyle {
    #[must_use]
    pub fn from_tracks_per_album(average: f64) -> Self {
        if average >= ALBUM_ORIENTED_THRESHOLD {
            Self::AlbumOriented
        } else {
            Self::TrackOriented
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ListeningPatterns {
    pub median_albums_per_artist: f64,
    pub average_albums_per_artist: f64,
    pub core_median_albums_per_artist: f64,
    pub core_average_albums_per_artist: f64,
    pub artists_with_three_plus_albums: usize,
    pub new_artists: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_tracks_per_album: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ListeningStyle>,
}

/// Everything the calculator needs, already fetched.
#[derive(Debug, Clone, Copy)]
pub struct PatternInputs<'a> {
    /// Per-artist breadth in the period, descending by listens.
    pub breadth: &'a [ArtistBreadth],
    pub total_scrobbles: u64,
    pub total_artists: u64,
    /// Earliest all-time listen of every artist.
    pub first_listens: &'a [DateTime<Utc>],
    /// Artists first heard at or after this instant are new.
    pub new_since: DateTime<Utc>,
}

/// Median of the values; mean of the two middle values for even lengths,
/// 0 for an empty slice.
#[must_use]
pub fn median(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0
    } else {
        f64::from(sorted[mid])
    }
}

#[must_use]
pub fn average(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = values.len() as f64;
    values.iter().map(|&v| f64::from(v)).sum::<f64>() / len
}

/// `(scrobbles - artists) / scrobbles`, rounded; `None` without scrobbles.
#[must_use]
pub fn repeat_ratio(total_scrobbles: u64, total_artists: u64) -> Option<f64> {
    if total_scrobbles == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = total_scrobbles.saturating_sub(total_artists) as f64 / total_scrobbles as f64;
    Some(round2(ratio))
}

#[must_use]
pub fn calculate_patterns(inputs: &PatternInputs<'_>) -> ListeningPatterns {
    let mut ranked: Vec<&ArtistBreadth> = inputs.breadth.iter().collect();
    ranked.sort_by(|a, b| b.listens.cmp(&a.listens).then_with(|| a.artist.cmp(&b.artist)));

    let all: Vec<u32> = ranked.iter().map(|a| a.albums).collect();
    let core: Vec<u32> = ranked.iter().take(CORE_ARTISTS).map(|a| a.albums).collect();

    ListeningPatterns {
        median_albums_per_artist: round2(median(&all)),
        average_albums_per_artist: round2(average(&all)),
        core_median_albums_per_artist: round2(median(&core)),
        core_average_albums_per_artist: round2(average(&core)),
        artists_with_three_plus_albums: all.iter().filter(|&&n| n >= DEEP_ARTIST_ALBUMS).count(),
        new_artists: inputs
            .first_listens
            .iter()
            .filter(|&&first| first >= inputs.new_since)
            .count(),
        repeat_ratio: repeat_ratio(inputs.total_scrobbles, inputs.total_artists),
        average_tracks_per_album: None,
        style: None,
    }
}
