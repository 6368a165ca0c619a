//! Report assembly: taste profile, drift, listening patterns and highlights
//! for one analysis period.

use crate::analysis::drift::{calculate_drift, TasteDrift};
use crate::analysis::patterns::{calculate_patterns, ListeningPatterns, ListeningStyle, PatternInputs};
use crate::analysis::tags::{round2, weigh_tags, TagIndex, TagStat};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::store::{AlbumCount, Store, Window};
use chrono::{DateTime, Duration, Months, Utc};
use log::{debug, info, warn};
use serde::Serialize;

/// Albums listed under each highlighted artist.
const ALBUMS_PER_ARTIST: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TasteProfile {
    pub current: Vec<TagStat>,
    pub historical: Vec<TagStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistHighlight {
    pub artist: String,
    pub scrobbles: u64,
    pub top_albums: Vec<AlbumCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Highlights {
    pub top_artists: Vec<ArtistHighlight>,
    pub top_albums: Vec<AlbumCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub user: String,
    pub generated_at: DateTime<Utc>,
    pub timezone: String,
    pub current_period: Window,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_period: Option<Window>,
    pub current_scrobbles: u64,
    pub historical_scrobbles: u64,
    pub total_scrobbles: u64,
    pub total_artists: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub metadata: Metadata,
    pub taste: TasteProfile,
    pub drift: TasteDrift,
    pub patterns: ListeningPatterns,
    pub highlights: Highlights,
}

/// Current period per the report configuration.
#[must_use]
pub fn current_window(config: &AnalysisConfig, now: DateTime<Utc>) -> Window {
    Window::trailing(now, config.report.window_days, config.report.offset_days)
}

/// Everything before the current period, starting at the first listen.
fn historical_window(
    store: &dyn Store,
    user: &str,
    current: &Window,
) -> Result<Option<Window>, AnalysisError> {
    let window = store
        .listen_span(user)?
        .map(|(first, _)| Window {
            start: first,
            end: current.start,
        })
        .filter(|window| !window.is_empty());
    Ok(window)
}

/// Every qualifying tag for `window`, heaviest first.
fn tag_ranking(
    store: &dyn Store,
    user: &str,
    window: &Window,
    index: &TagIndex,
) -> Result<(Vec<TagStat>, u64), AnalysisError> {
    let total = store.total_scrobbles(user, Some(window))?;
    let counts = store.album_listen_counts(user, window)?;
    Ok((weigh_tags(&counts, index, total, usize::MAX), total))
}

/// Pattern statistics for `window`, classification included.
pub fn listening_patterns(
    store: &dyn Store,
    config: &AnalysisConfig,
    window: &Window,
    now: DateTime<Utc>,
) -> Result<ListeningPatterns, AnalysisError> {
    let user = config.user.as_str();
    let breadth = store.artist_breadth(user, window)?;
    let first_listens = store.artist_first_listens(user)?;
    let new_since = now
        .checked_sub_months(Months::new(12))
        .unwrap_or_else(|| now - Duration::days(365));

    let mut patterns = calculate_patterns(&PatternInputs {
        breadth: &breadth,
        total_scrobbles: store.total_scrobbles(user, None)?,
        total_artists: store.total_artists(user, None)?,
        first_listens: &first_listens,
        new_since,
    });

    let counts = store.track_album_counts(user, window)?;
    if counts.albums > 0 {
        #[allow(clippy::cast_precision_loss)]
        let average = round2(counts.tracks as f64 / counts.albums as f64);
        patterns.average_tracks_per_album = Some(average);
        patterns.style = Some(ListeningStyle::from_tracks_per_album(average));
    }

    Ok(patterns)
}

fn highlights(
    store: &dyn Store,
    user: &str,
    window: &Window,
    top_n: usize,
) -> Result<Highlights, AnalysisError> {
    let top_artists = store
        .top_artists(user, window, top_n)?
        .into_iter()
        .map(|artist| {
            let top_albums =
                store.top_albums_for_artist(user, &artist.artist, window, ALBUMS_PER_ARTIST)?;
            Ok(ArtistHighlight {
                artist: artist.artist,
                scrobbles: artist.scrobbles,
                top_albums,
            })
        })
        .collect::<Result<Vec<_>, AnalysisError>>()?;

    Ok(Highlights {
        top_artists,
        top_albums: store.top_albums(user, window, top_n)?,
    })
}

/// Build the full report for the configured period ending at `now`.
///
/// # Errors
///
/// Any store failure, wrapped with the failing query's name.
pub fn assemble_report(
    store: &dyn Store,
    config: &AnalysisConfig,
    now: DateTime<Utc>,
) -> Result<Report, AnalysisError> {
    let user = config.user.as_str();
    let current = current_window(config, now);
    let historical = historical_window(store, user, &current)?;
    info!(
        "Assembling report for `{user}`: current {} .. {}",
        current.start, current.end
    );

    let index = TagIndex::build(&store.artist_tags()?, &store.album_tags()?);
    if index.is_empty() {
        warn!("No subject has enough qualifying tags; taste profile will be empty");
    }

    let (mut current_tags, current_scrobbles) = tag_ranking(store, user, &current, &index)?;
    let (mut historical_tags, historical_scrobbles) = match &historical {
        Some(window) => tag_ranking(store, user, window, &index)?,
        None => (Vec::new(), 0),
    };

    // Membership checks need the full rankings; only the profile is capped.
    let drift = calculate_drift(&historical_tags, &current_tags);
    current_tags.truncate(config.report.tag_limit);
    historical_tags.truncate(config.report.tag_limit);
    debug!(
        "Drift: {} declined, {} emerged",
        drift.declined.len(),
        drift.emerged.len()
    );

    let patterns = listening_patterns(store, config, &current, now)?;
    let highlights = highlights(store, user, &current, config.report.top_n)?;

    Ok(Report {
        metadata: Metadata {
            user: user.to_string(),
            generated_at: now,
            timezone: config.timezone.name().to_string(),
            current_period: current,
            historical_period: historical,
            current_scrobbles,
            historical_scrobbles,
            total_scrobbles: store.total_scrobbles(user, None)?,
            total_artists: store.total_artists(user, None)?,
        },
        taste: TasteProfile {
            current: current_tags,
            historical: historical_tags,
        },
        drift,
        patterns,
        highlights,
    })
}
