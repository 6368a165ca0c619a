//! Tag normalization and period-scoped tag weighting.
//!
//! Raw tag associations are noisy: low-count tags, year tags, two-letter
//! junk. [`normalize_tags`] cleans one subject's list, [`TagIndex`] holds the
//! surviving tags for every artist and album, and [`weigh_tags`] turns a
//! window's album scrobble counts into a ranked [`TagStat`] list.

use crate::store::{AlbumCount, TagAssociation};
use log::{debug, trace};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Raw counts below this are ignored.
pub const MIN_TAG_COUNT: u32 = 25;
/// Normalized tags shorter than this (in characters) are ignored.
pub const MIN_TAG_LEN: usize = 3;
/// Subjects with fewer surviving tags do not take part in weighting.
pub const MIN_TAGS_PER_SUBJECT: usize = 2;

/// A tag and its share of the period's scrobbles, rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagStat {
    pub tag: String,
    pub weight: f64,
}

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Lower-case, turn `-` and `_` into spaces, trim.
#[must_use]
pub fn normalize_tag(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_bare_year(tag: &str) -> bool {
    tag.len() == 4 && tag.bytes().all(|b| b.is_ascii_digit())
}

/// Filter and normalize one subject's `(tag, count)` pairs, keeping input
/// order. Duplicates produced by normalization keep their first position.
#[must_use]
pub fn normalize_tags<S: AsRef<str>>(pairs: &[(S, u32)]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    pairs
        .iter()
        .filter(|(_, count)| *count >= MIN_TAG_COUNT)
        .map(|(tag, _)| normalize_tag(tag.as_ref()))
        .filter(|tag| !is_bare_year(tag) && tag.chars().count() >= MIN_TAG_LEN)
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Like [`normalize_tags`], but `None` when fewer than
/// [`MIN_TAGS_PER_SUBJECT`] tags survive. Spellings that normalize to the
/// same tag count once, so `hip-hop` and `hip hop` alone do not qualify.
#[must_use]
pub fn qualifying_tags<S: AsRef<str>>(pairs: &[(S, u32)]) -> Option<Vec<String>> {
    let tags = normalize_tags(pairs);
    (tags.len() >= MIN_TAGS_PER_SUBJECT).then_some(tags)
}

/// Group associations by subject, keeping per-subject order.
fn group_pairs<K: Ord + Clone>(
    rows: &[TagAssociation],
    key: impl Fn(&TagAssociation) -> Option<K>,
) -> BTreeMap<K, Vec<(&str, u32)>> {
    let mut grouped: BTreeMap<K, Vec<(&str, u32)>> = BTreeMap::new();
    for row in rows {
        if let Some(k) = key(row) {
            grouped.entry(k).or_default().push((row.tag.as_str(), row.count));
        }
    }
    grouped
}

/// Normalize every group in parallel; results land in a `BTreeMap` so the
/// outcome never depends on completion order.
fn normalize_groups<K: Ord + Clone + Send + Sync>(
    grouped: BTreeMap<K, Vec<(&str, u32)>>,
) -> (BTreeMap<K, Vec<String>>, usize) {
    let total = grouped.len();
    let kept: BTreeMap<K, Vec<String>> = grouped
        .into_par_iter()
        .filter_map(|(key, pairs)| qualifying_tags(&pairs).map(|tags| (key, tags)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();
    let excluded = total - kept.len();
    (kept, excluded)
}

/// Qualifying normalized tags for every artist and every (artist, album).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagIndex {
    artists: BTreeMap<String, Vec<String>>,
    albums: BTreeMap<(String, String), Vec<String>>,
}

impl TagIndex {
    /// Build from raw associations. Rows must be sorted by descending count
    /// within each subject, as the store delivers them.
    #[must_use]
    pub fn build(artist_rows: &[TagAssociation], album_rows: &[TagAssociation]) -> Self {
        let (artists, artists_excluded) =
            normalize_groups(group_pairs(artist_rows, |row| Some(row.subject.artist.clone())));
        let (albums, albums_excluded) = normalize_groups(group_pairs(album_rows, |row| {
            row.subject
                .album
                .as_ref()
                .map(|album| (row.subject.artist.clone(), album.clone()))
        }));

        debug!(
            "Tag index: {} artists ({} excluded), {} albums ({} excluded)",
            artists.len(),
            artists_excluded,
            albums.len(),
            albums_excluded
        );

        Self { artists, albums }
    }

    #[must_use]
    pub fn artist(&self, artist: &str) -> Option<&[String]> {
        self.artists.get(artist).map(Vec::as_slice)
    }

    #[must_use]
    pub fn album(&self, artist: &str, album: &str) -> Option<&[String]> {
        self.albums
            .get(&(artist.to_string(), album.to_string()))
            .map(Vec::as_slice)
    }

    /// Union of artist-level and album-level tags, each tag once.
    #[must_use]
    pub fn tags_for(&self, artist: &str, album: &str) -> BTreeSet<&str> {
        let artist_tags = self.artist(artist).unwrap_or_default();
        let album_tags = if album.is_empty() {
            &[][..]
        } else {
            self.album(artist, album).unwrap_or_default()
        };
        artist_tags
            .iter()
            .chain(album_tags)
            .map(String::as_str)
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty() && self.albums.is_empty()
    }
}

/// Weight tags by the scrobbles of the albums carrying them.
///
/// Each album's window count is added once to every tag in its tag union.
/// Accumulators are divided by `total_scrobbles` (treated as 1 when zero),
/// rounded to 2 decimals, sorted by weight descending then tag ascending, and
/// truncated to `limit`.
#[must_use]
pub fn weigh_tags(
    album_counts: &[AlbumCount],
    index: &TagIndex,
    total_scrobbles: u64,
    limit: usize,
) -> Vec<TagStat> {
    let mut accumulator: HashMap<&str, u64> = HashMap::new();
    let mut total_weight: u64 = 0;

    for row in album_counts {
        for tag in index.tags_for(&row.artist, &row.album) {
            *accumulator.entry(tag).or_insert(0) += row.scrobbles;
            total_weight += row.scrobbles;
        }
    }
    trace!(
        "Weighted {} tags, tag-weight sum {total_weight}, period scrobbles {total_scrobbles}",
        accumulator.len()
    );

    #[allow(clippy::cast_precision_loss)]
    let divisor = total_scrobbles.max(1) as f64;

    #[allow(clippy::cast_precision_loss)]
    let mut stats: Vec<TagStat> = accumulator
        .into_iter()
        .map(|(tag, sum)| TagStat {
            tag: tag.to_string(),
            weight: round2((sum as f64 / divisor).min(1.0)),
        })
        .collect();

    sort_stats(&mut stats);
    stats.truncate(limit);
    stats
}

/// Weight descending, then tag name ascending.
pub fn sort_stats(stats: &mut [TagStat]) {
    stats.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.tag.cmp(&b.tag))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SubjectKey;

    fn artist_rows(artist: &str, tags: &[(&str, u32)]) -> Vec<TagAssociation> {
        tags.iter()
            .map(|(tag, count)| TagAssociation {
                subject: SubjectKey::artist(artist),
                tag: (*tag).to_string(),
                count: *count,
            })
            .collect()
    }

    fn album_rows(artist: &str, album: &str, tags: &[(&str, u32)]) -> Vec<TagAssociation> {
        tags.iter()
            .map(|(tag, count)| TagAssociation {
                subject: SubjectKey::album(artist, album),
                tag: (*tag).to_string(),
                count: *count,
            })
            .collect()
    }

    fn count(artist: &str, album: &str, scrobbles: u64) -> AlbumCount {
        AlbumCount {
            artist: artist.to_string(),
            album: album.to_string(),
            scrobbles,
        }
    }

    #[test]
    fn test_normalize_tag_text() {
        assert_eq!(normalize_tag("  Post-Rock "), "post rock");
        assert_eq!(normalize_tag("TRIP_HOP"), "trip hop");
        assert_eq!(normalize_tag("-ambient-"), "ambient");
    }

    #[test]
    fn test_normalizer_drops_low_counts_years_and_short_tags() {
        let pairs = [
            ("shoegaze", 100),
            ("1994", 90),
            ("uk", 80),
            ("dream-pop", 25),
            ("seen live", 24),
            ("a_b", 60),
        ];
        let tags = normalize_tags(&pairs);

        assert_eq!(tags, vec!["shoegaze", "dream pop", "a b"]);
        for tag in &tags {
            assert!(!is_bare_year(tag), "Year tag leaked: {tag}");
            assert!(tag.chars().count() >= MIN_TAG_LEN, "Short tag leaked: {tag}");
        }
    }

    #[test]
    fn test_normalizer_keeps_five_digit_numbers() {
        assert_eq!(normalize_tags(&[("10000", 50)]), vec!["10000"]);
    }

    #[test]
    fn test_normalized_duplicates_collapse() {
        let tags = normalize_tags(&[("hip-hop", 90), ("hip hop", 80), ("rap", 70)]);
        assert_eq!(tags, vec!["hip hop", "rap"]);
    }

    #[test]
    fn test_single_surviving_tag_disqualifies_subject() {
        assert!(qualifying_tags(&[("shoegaze", 100), ("1991", 100)]).is_none());
        assert!(qualifying_tags(&[("shoegaze", 100), ("noise pop", 30)]).is_some());
    }

    #[test]
    fn test_collapsed_duplicates_do_not_reach_two_tag_minimum() {
        assert!(
            qualifying_tags(&[("hip-hop", 90), ("hip hop", 80)]).is_none(),
            "Two spellings of one tag are a single tag"
        );
        let index = TagIndex::build(&artist_rows("Madvillain", &[("hip-hop", 90), ("Hip_Hop", 80)]), &[]);
        assert!(index.is_empty(), "Subject should not enter the index");
    }

    #[test]
    fn test_single_tag_subject_contributes_nothing() {
        let index = TagIndex::build(&artist_rows("Slowdive", &[("shoegaze", 100)]), &[]);
        let stats = weigh_tags(&[count("Slowdive", "Souvlaki", 40)], &index, 40, 10);
        assert!(stats.is_empty(), "Single-tag subject must not be weighted");
    }

    #[test]
    fn test_union_counts_each_tag_once_per_album() {
        let artists = artist_rows("Slowdive", &[("shoegaze", 100), ("dream pop", 60)]);
        let albums = album_rows("Slowdive", "Souvlaki", &[("shoegaze", 50), ("ambient", 30)]);
        let index = TagIndex::build(&artists, &albums);

        let stats = weigh_tags(&[count("Slowdive", "Souvlaki", 10)], &index, 20, 10);

        assert_eq!(
            stats,
            vec![
                TagStat { tag: "ambient".to_string(), weight: 0.5 },
                TagStat { tag: "dream pop".to_string(), weight: 0.5 },
                TagStat { tag: "shoegaze".to_string(), weight: 0.5 },
            ],
            "Equal weights sort by tag name, shared tag counted once"
        );
    }

    #[test]
    fn test_empty_album_uses_artist_tags_only() {
        let artists = artist_rows("Low", &[("slowcore", 100), ("indie", 60)]);
        let index = TagIndex::build(&artists, &[]);

        let stats = weigh_tags(&[count("Low", "", 3)], &index, 4, 10);
        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| (s.weight - 0.75).abs() < f64::EPSILON));
    }

    #[test]
    fn test_zero_total_scrobbles_does_not_divide_by_zero() {
        let index = TagIndex::build(&artist_rows("Low", &[("slowcore", 100), ("indie", 60)]), &[]);
        let stats = weigh_tags(&[count("Low", "", 0)], &index, 0, 10);
        assert!(stats.iter().all(|s| s.weight == 0.0));
    }

    #[test]
    fn test_weights_bounded_and_rounding_idempotent() {
        let artists: Vec<_> = (0..20)
            .flat_map(|i| artist_rows(&format!("Artist {i}"), &[("rock", 100), ("indie", 50 + i)]))
            .collect();
        let index = TagIndex::build(&artists, &[]);
        let counts: Vec<_> = (0..20u64).map(|i| count(&format!("Artist {i}"), "", i * 7 + 1)).collect();
        let total: u64 = counts.iter().map(|c| c.scrobbles).sum();

        let stats = weigh_tags(&counts, &index, total, 50);
        for stat in &stats {
            assert!((0.0..=1.0).contains(&stat.weight), "Weight out of range: {stat:?}");
            assert_eq!(round2(stat.weight), stat.weight, "Re-rounding must be a no-op");
        }
        assert_eq!(stats[0].tag, "indie", "Ties broken by name");
    }

    #[test]
    fn test_limit_truncates_ranking() {
        let artists = artist_rows("Low", &[("slowcore", 100), ("indie", 60), ("dream pop", 40)]);
        let index = TagIndex::build(&artists, &[]);
        let stats = weigh_tags(&[count("Low", "", 5)], &index, 5, 2);
        assert_eq!(stats.len(), 2);
    }
}
