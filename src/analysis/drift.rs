//! Taste drift between a historical and a current tag ranking.

use crate::analysis::tags::TagStat;
use serde::Serialize;
use std::collections::HashSet;

/// How many leading tags of each ranking are inspected.
pub const DRIFT_TOP_N: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagShift {
    pub tag: String,
    pub historical_weight: f64,
    pub current_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TasteDrift {
    /// Historically prominent tags gone from the current ranking entirely.
    pub declined: Vec<TagShift>,
    /// Currently prominent tags absent from the whole historical ranking.
    pub emerged: Vec<TagShift>,
}

/// Compare two rankings, both sorted by weight descending.
///
/// A tag only declines (or emerges) if it is missing from the *full* other
/// ranking, not merely from its top [`DRIFT_TOP_N`].
#[must_use]
pub fn calculate_drift(historical: &[TagStat], current: &[TagStat]) -> TasteDrift {
    let historical_tags: HashSet<&str> = historical.iter().map(|s| s.tag.as_str()).collect();
    let current_tags: HashSet<&str> = current.iter().map(|s| s.tag.as_str()).collect();

    let declined = historical
        .iter()
        .take(DRIFT_TOP_N)
        .filter(|stat| !current_tags.contains(stat.tag.as_str()))
        .map(|stat| TagShift {
            tag: stat.tag.clone(),
            historical_weight: stat.weight,
            current_weight: 0.0,
        })
        .collect();

    let emerged = current
        .iter()
        .take(DRIFT_TOP_N)
        .filter(|stat| !historical_tags.contains(stat.tag.as_str()))
        .map(|stat| TagShift {
            tag: stat.tag.clone(),
            historical_weight: 0.0,
            current_weight: stat.weight,
        })
        .collect();

    TasteDrift { declined, emerged }
}
