//! Forgotten artists and albums.
//!
//! Subjects that were once played heavily are put into interest bands by
//! lifetime scrobbles, then ordered by dormancy or by listens and capped per
//! band. Window filtering on first/last listen happens in the store query.

use crate::config::ForgottenConfig;
use crate::error::ConfigError;
use crate::store::{ForgottenCandidate, Subject, SubjectKey};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Band {
    Obsession,
    Strong,
    Moderate,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Obsession, Band::Strong, Band::Moderate];
}

/// Minimum lifetime scrobbles per band. Always `obsession > strong > moderate > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandThresholds {
    obsession: u32,
    strong: u32,
    moderate: u32,
}

impl BandThresholds {
    pub const ARTIST: Self = Self {
        obsession: 120,
        strong: 50,
        moderate: 15,
    };
    pub const ALBUM: Self = Self {
        obsession: 60,
        strong: 30,
        moderate: 10,
    };

    pub fn new(obsession: u32, strong: u32, moderate: u32) -> Result<Self, ConfigError> {
        if moderate == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "moderate",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(obsession > strong && strong > moderate) {
            return Err(ConfigError::InvalidThreshold {
                name: "bands",
                reason: format!(
                    "need obsession > strong > moderate, got {obsession} / {strong} / {moderate}"
                ),
            });
        }
        Ok(Self {
            obsession,
            strong,
            moderate,
        })
    }

    #[must_use]
    pub const fn obsession(&self) -> u32 {
        self.obsession
    }

    #[must_use]
    pub const fn strong(&self) -> u32 {
        self.strong
    }

    #[must_use]
    pub const fn moderate(&self) -> u32 {
        self.moderate
    }

    /// Highest band whose floor `scrobbles` reaches.
    #[must_use]
    pub fn classify(&self, scrobbles: u64) -> Option<Band> {
        match scrobbles {
            n if n >= u64::from(self.obsession) => Some(Band::Obsession),
            n if n >= u64::from(self.strong) => Some(Band::Strong),
            n if n >= u64::from(self.moderate) => Some(Band::Moderate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Longest since last listen first.
    #[default]
    Dormancy,
    /// Most lifetime scrobbles first.
    Listens,
}

impl FromStr for SortMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dormancy" => Ok(Self::Dormancy),
            "listens" => Ok(Self::Listens),
            other => Err(ConfigError::UnknownSortMode(other.to_string())),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dormancy => f.write_str("dormancy"),
            Self::Listens => f.write_str("listens"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForgottenEntity {
    pub key: SubjectKey,
    pub total_scrobbles: u64,
    pub first_listen: DateTime<Utc>,
    pub last_listen: DateTime<Utc>,
    pub days_since_last: i64,
    pub band: Band,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandGroup {
    pub band: Band,
    pub entries: Vec<ForgottenEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForgottenReport {
    pub subject: Subject,
    pub sort: SortMode,
    pub bands: Vec<BandGroup>,
}

/// Whole days between `last` and `now`, floored; 0 if `last` is in the future.
#[must_use]
pub fn days_since(last: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last).num_hours().max(0) / 24
}

fn compare(a: &ForgottenEntity, b: &ForgottenEntity, sort: SortMode) -> Ordering {
    let dormancy = b.days_since_last.cmp(&a.days_since_last);
    let listens = b.total_scrobbles.cmp(&a.total_scrobbles);
    match sort {
        SortMode::Dormancy => dormancy.then(listens),
        SortMode::Listens => listens.then(dormancy),
    }
    .then_with(|| a.key.cmp(&b.key))
}

/// Band, sort and cap already-filtered candidates.
///
/// Empty bands are still listed so the report shape stays stable.
#[must_use]
pub fn band_forgotten(
    candidates: Vec<ForgottenCandidate>,
    now: DateTime<Utc>,
    config: &ForgottenConfig,
) -> ForgottenReport {
    let thresholds = config.bands();
    let mut groups: Vec<BandGroup> = Band::ALL
        .iter()
        .map(|&band| BandGroup {
            band,
            entries: Vec::new(),
        })
        .collect();

    let mut dropped = 0usize;
    for candidate in candidates {
        let Some(band) = thresholds.classify(candidate.total_scrobbles) else {
            dropped += 1;
            continue;
        };
        let entity = ForgottenEntity {
            days_since_last: days_since(candidate.last_listen, now),
            key: candidate.key,
            total_scrobbles: candidate.total_scrobbles,
            first_listen: candidate.first_listen,
            last_listen: candidate.last_listen,
            band,
        };
        if let Some(group) = groups.iter_mut().find(|g| g.band == band) {
            group.entries.push(entity);
        }
    }

    for group in &mut groups {
        group.entries.sort_by(|a, b| compare(a, b, config.sort));
        group.entries.truncate(config.per_band);
    }

    debug!(
        "Banded {} {}s ({dropped} below moderate)",
        groups.iter().map(|g| g.entries.len()).sum::<usize>(),
        config.subject
    );

    ForgottenReport {
        subject: config.subject,
        sort: config.sort,
        bands: groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn candidate(artist: &str, total: u64, days_ago: i64) -> ForgottenCandidate {
        ForgottenCandidate {
            key: SubjectKey::artist(artist),
            total_scrobbles: total,
            first_listen: now() - Duration::days(2000),
            last_listen: now() - Duration::days(days_ago),
        }
    }

    fn group(report: &ForgottenReport, band: Band) -> &[ForgottenEntity] {
        &report.bands.iter().find(|g| g.band == band).unwrap().entries
    }

    #[test]
    fn test_artist_thresholds() {
        let t = BandThresholds::ARTIST;
        assert_eq!(t.classify(120), Some(Band::Obsession));
        assert_eq!(t.classify(119), Some(Band::Strong));
        assert_eq!(t.classify(50), Some(Band::Strong));
        assert_eq!(t.classify(15), Some(Band::Moderate));
        assert_eq!(t.classify(14), None);
    }

    #[test]
    fn test_album_thresholds_are_independent() {
        let t = BandThresholds::ALBUM;
        assert_eq!(t.classify(60), Some(Band::Obsession));
        assert_eq!(t.classify(30), Some(Band::Strong));
        assert_eq!(t.classify(10), Some(Band::Moderate));
        assert_eq!(t.classify(9), None);
        assert_eq!(BandThresholds::ARTIST.classify(60), Some(Band::Strong));
    }

    #[test]
    fn test_thresholds_must_be_strictly_ordered() {
        assert!(BandThresholds::new(50, 50, 10).is_err());
        assert!(BandThresholds::new(100, 50, 0).is_err());
        assert!(BandThresholds::new(100, 50, 10).is_ok());
    }

    #[test]
    fn test_days_since_floors_hours() {
        let last = now() - Duration::hours(47);
        assert_eq!(days_since(last, now()), 1);
        assert_eq!(days_since(now() - Duration::hours(48), now()), 2);
        assert_eq!(days_since(now() + Duration::hours(5), now()), 0);
    }

    #[test]
    fn test_banding_sorts_by_dormancy_and_caps() {
        let mut config = AnalysisConfig::default().forgotten;
        config.per_band = 2;

        let report = band_forgotten(
            vec![
                candidate("Recent Obsession", 300, 100),
                candidate("Old Obsession", 200, 900),
                candidate("Older Obsession", 150, 1200),
                candidate("Strong One", 60, 400),
                candidate("Too Few", 5, 400),
            ],
            now(),
            &config,
        );

        let obsession = group(&report, Band::Obsession);
        assert_eq!(obsession.len(), 2, "Capped per band");
        assert_eq!(obsession[0].key.artist, "Older Obsession");
        assert_eq!(obsession[1].key.artist, "Old Obsession");
        assert_eq!(group(&report, Band::Strong).len(), 1);
        assert!(group(&report, Band::Moderate).is_empty());
    }

    #[test]
    fn test_banding_sorts_by_listens() {
        let mut config = AnalysisConfig::default().forgotten;
        config.sort = SortMode::Listens;

        let report = band_forgotten(
            vec![
                candidate("B", 130, 900),
                candidate("A", 130, 300),
                candidate("C", 500, 100),
            ],
            now(),
            &config,
        );

        let names: Vec<_> = group(&report, Band::Obsession)
            .iter()
            .map(|e| e.key.artist.as_str())
            .collect();
        assert_eq!(names, vec!["C", "B", "A"], "Ties on listens fall back to dormancy");
    }

    #[test]
    fn test_album_subject_uses_album_table() {
        let mut config = AnalysisConfig::default().forgotten;
        config.subject = Subject::Album;
        let album = ForgottenCandidate {
            key: SubjectKey::album("Low", "Secret Name"),
            ..candidate("Low", 60, 500)
        };

        let report = band_forgotten(vec![album], now(), &config);
        assert_eq!(group(&report, Band::Obsession).len(), 1);
    }

    #[test]
    fn test_sort_mode_parsing() {
        assert_eq!("Dormancy".parse::<SortMode>().unwrap(), SortMode::Dormancy);
        assert_eq!("listens".parse::<SortMode>().unwrap(), SortMode::Listens);
        assert!("random".parse::<SortMode>().is_err());
    }
}
