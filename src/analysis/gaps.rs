//! Scrobble gap detection.
//!
//! A tracker outage looks like a run of silent days. Listens are bucketed by
//! local calendar day into work-hour (Mon-Fri 09:00-16:59) and other-hour
//! counts, then three streaks are measured backwards from the most recent day:
//!
//! - other: consecutive days with no other-hour listens
//! - work: consecutive weekdays with no work-hour listens, weekends skipped
//! - weekend: consecutive weekend days with no listens at all, weekdays skipped
//!
//! Work and other streaks trigger when they exceed their threshold, the
//! weekend streak when it reaches it.

use crate::error::ConfigError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use log::{debug, trace};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

const WORK_START_HOUR: u32 = 9;
const WORK_END_HOUR: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GapThresholds {
    pub work: u32,
    pub other: u32,
    pub weekend: u32,
}

impl Default for GapThresholds {
    fn default() -> Self {
        Self {
            work: 3,
            other: 3,
            weekend: 4,
        }
    }
}

impl GapThresholds {
    pub fn new(work: u32, other: u32, weekend: u32) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("work-threshold", work),
            ("other-threshold", other),
            ("weekend-threshold", weekend),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidThreshold {
                    name,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(Self {
            work,
            other,
            weekend,
        })
    }
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Mon-Fri, 09:00 to 16:59 local time.
#[must_use]
pub fn is_work_hour<T: TimeZone>(local: &DateTime<T>) -> bool {
    !is_weekend(local.weekday()) && (WORK_START_HOUR..WORK_END_HOUR).contains(&local.hour())
}

/// Listen counts for one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub work: u32,
    pub other: u32,
}

impl DayBucket {
    #[must_use]
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            work: 0,
            other: 0,
        }
    }

    #[must_use]
    pub fn is_weekend(&self) -> bool {
        is_weekend(self.date.weekday())
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.work + self.other
    }
}

/// One bucket per local day for the `days` days ending on `as_of`'s local
/// date, oldest first. Listens after `as_of` are ignored.
#[must_use]
pub fn bucket_listens(
    listens: &[DateTime<Utc>],
    tz: Tz,
    as_of: DateTime<Utc>,
    days: u32,
) -> Vec<DayBucket> {
    let days = days.max(1);
    let last_day = as_of.with_timezone(&tz).date_naive();
    let first_day = last_day - Duration::days(i64::from(days) - 1);

    let mut buckets: BTreeMap<NaiveDate, DayBucket> = first_day
        .iter_days()
        .take(days as usize)
        .map(|date| (date, DayBucket::empty(date)))
        .collect();

    for &listen in listens.iter().filter(|&&l| l <= as_of) {
        let local = listen.with_timezone(&tz);
        if let Some(bucket) = buckets.get_mut(&local.date_naive()) {
            if is_work_hour(&local) {
                bucket.work += 1;
            } else {
                bucket.other += 1;
            }
        }
    }

    buckets.into_values().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Streaks {
    pub work: u32,
    pub other: u32,
    pub weekend: u32,
}

/// Scan from the most recent bucket backwards. Each streak stops at the
/// first day that breaks it.
#[must_use]
pub fn compute_streaks(buckets: &[DayBucket]) -> Streaks {
    let mut streaks = Streaks::default();
    let (mut work_open, mut other_open, mut weekend_open) = (true, true, true);

    for day in buckets.iter().rev() {
        if other_open {
            if day.other == 0 {
                streaks.other += 1;
            } else {
                other_open = false;
            }
        }

        if day.is_weekend() {
            if weekend_open {
                if day.total() == 0 {
                    streaks.weekend += 1;
                } else {
                    weekend_open = false;
                }
            }
        } else if work_open {
            if day.work == 0 {
                streaks.work += 1;
            } else {
                work_open = false;
            }
        }

        if !(work_open || other_open || weekend_open) {
            break;
        }
    }

    streaks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakKind {
    Work,
    Other,
    Weekend,
}

impl fmt::Display for StreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Work => f.write_str("work-hour"),
            Self::Other => f.write_str("other-hour"),
            Self::Weekend => f.write_str("weekend"),
        }
    }
}

/// Streaks over their threshold: `>` for work and other, `>=` for weekend.
#[must_use]
pub fn triggered_streaks(streaks: &Streaks, thresholds: &GapThresholds) -> Vec<StreakKind> {
    let mut triggered = Vec::new();
    if streaks.work > thresholds.work {
        triggered.push(StreakKind::Work);
    }
    if streaks.other > thresholds.other {
        triggered.push(StreakKind::Other);
    }
    if streaks.weekend >= thresholds.weekend {
        triggered.push(StreakKind::Weekend);
    }
    triggered
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapReport {
    pub as_of: DateTime<Utc>,
    pub timezone: String,
    pub streaks: Streaks,
    pub thresholds: GapThresholds,
    pub triggered: Vec<StreakKind>,
    pub days: Vec<DayBucket>,
}

/// Result of one detector run. `NoIssue` is the expected, non-error outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum GapOutcome {
    NoIssue { streaks: Streaks },
    Gap(GapReport),
}

/// Run the detector for the `days` days ending at `as_of`.
#[must_use]
pub fn detect_gaps(
    listens: &[DateTime<Utc>],
    tz: Tz,
    as_of: DateTime<Utc>,
    days: u32,
    thresholds: &GapThresholds,
) -> GapOutcome {
    let buckets = bucket_listens(listens, tz, as_of, days);
    let streaks = compute_streaks(&buckets);
    let triggered = triggered_streaks(&streaks, thresholds);
    trace!("Gap check as of {as_of}: {streaks:?} -> {triggered:?}");

    if triggered.is_empty() {
        return GapOutcome::NoIssue { streaks };
    }

    GapOutcome::Gap(GapReport {
        as_of,
        timezone: tz.name().to_string(),
        streaks,
        thresholds: *thresholds,
        triggered,
        days: buckets,
    })
}

/// Re-run the detector once per day for the `window_days` days ending at
/// `end`, oldest first, and keep the days that would have triggered.
#[must_use]
pub fn simulate_gaps(
    listens: &[DateTime<Utc>],
    tz: Tz,
    end: DateTime<Utc>,
    days: u32,
    thresholds: &GapThresholds,
    window_days: u32,
) -> Vec<GapReport> {
    let reports: Vec<GapReport> = (0..i64::from(window_days))
        .rev()
        .map(|offset| end - Duration::days(offset))
        .filter_map(|as_of| match detect_gaps(listens, tz, as_of, days, thresholds) {
            GapOutcome::Gap(report) => Some(report),
            GapOutcome::NoIssue { .. } => None,
        })
        .collect();

    debug!(
        "Simulated {window_days} days up to {end}: {} would have triggered",
        reports.len()
    );
    reports
}

impl fmt::Display for GapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Possible scrobble gap as of {} ({})",
            self.as_of.format("%Y-%m-%d %H:%M UTC"),
            self.timezone
        )?;
        for kind in &self.triggered {
            let (streak, threshold, unit, cmp) = match kind {
                StreakKind::Work => (self.streaks.work, self.thresholds.work, "weekdays", ">"),
                StreakKind::Other => (self.streaks.other, self.thresholds.other, "days", ">"),
                StreakKind::Weekend => {
                    (self.streaks.weekend, self.thresholds.weekend, "weekend days", ">=")
                }
            };
            writeln!(
                f,
                "  {kind} silence: {streak} {unit} (triggers at {cmp} {threshold})"
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:<10}  {:<3}  {:>5}  {:>5}", "date", "day", "work", "other")?;
        for day in self.days.iter().rev() {
            writeln!(
                f,
                "{:<10}  {:<3}  {:>5}  {:>5}",
                day.date.format("%Y-%m-%d"),
                day.date.weekday(),
                day.work,
                day.other
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    /// Friday 2024-03-15, late evening.
    fn as_of() -> DateTime<Utc> {
        at(2024, 3, 15, 23)
    }

    /// A listen every evening and every weekday noon for 14 days, minus
    /// weekday noons on or after `work_silent_from`.
    fn history(work_silent_from: NaiveDate) -> Vec<DateTime<Utc>> {
        let first = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        first
            .iter_days()
            .take(14)
            .flat_map(|date| {
                let evening = date.and_hms_opt(20, 0, 0).unwrap().and_utc();
                let noon = date.and_hms_opt(12, 0, 0).unwrap().and_utc();
                let work = !is_weekend(date.weekday()) && date < work_silent_from;
                std::iter::once(evening).chain(work.then_some(noon))
            })
            .collect()
    }

    #[test]
    fn test_work_hour_boundaries() {
        assert!(is_work_hour(&at(2024, 3, 15, 9)));
        assert!(is_work_hour(&at(2024, 3, 15, 16)));
        assert!(!is_work_hour(&at(2024, 3, 15, 17)));
        assert!(!is_work_hour(&at(2024, 3, 15, 8)));
        assert!(!is_work_hour(&at(2024, 3, 16, 12)), "Saturday noon is other-hour");
    }

    #[test]
    fn test_buckets_use_local_day() {
        // 23:30 UTC on Friday is Saturday 00:30 in Berlin.
        let listen = Utc.with_ymd_and_hms(2024, 3, 15, 23, 30, 0).unwrap();
        let as_of = at(2024, 3, 17, 12);
        let buckets = bucket_listens(&[listen], chrono_tz::Europe::Berlin, as_of, 3);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(buckets[0].total(), 0);
        assert_eq!(buckets[1].other, 1);
    }

    #[test]
    fn test_listens_after_as_of_ignored() {
        let buckets = bucket_listens(&[at(2024, 3, 15, 12)], Tz::UTC, at(2024, 3, 15, 10), 1);
        assert_eq!(buckets[0].total(), 0);
    }

    #[test]
    fn test_five_silent_weekdays_trigger_work_streak() {
        let listens = history(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        let outcome = detect_gaps(&listens, Tz::UTC, as_of(), 14, &GapThresholds::default());

        let GapOutcome::Gap(report) = outcome else {
            panic!("Expected a gap");
        };
        assert_eq!(report.streaks.work, 5);
        assert_eq!(report.streaks.other, 0);
        assert_eq!(report.streaks.weekend, 0);
        assert_eq!(report.triggered, vec![StreakKind::Work]);
        assert_eq!(report.days.len(), 14);
    }

    #[test]
    fn test_weekends_skipped_in_work_streak() {
        // Silent since Thursday the 7th: Thu, Fri, (weekend), Mon..Fri = 7.
        let listens = history(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        let buckets = bucket_listens(&listens, Tz::UTC, as_of(), 14);
        assert_eq!(compute_streaks(&buckets).work, 7);
    }

    #[test]
    fn test_work_threshold_is_strict() {
        // Silent Wed..Fri = 3, not above 3.
        let listens = history(NaiveDate::from_ymd_opt(2024, 3, 13).unwrap());
        let outcome = detect_gaps(&listens, Tz::UTC, as_of(), 14, &GapThresholds::default());
        assert_eq!(
            outcome,
            GapOutcome::NoIssue {
                streaks: Streaks { work: 3, other: 0, weekend: 0 }
            }
        );
    }

    #[test]
    fn test_weekend_threshold_is_inclusive() {
        let streaks = Streaks { work: 0, other: 0, weekend: 4 };
        assert_eq!(
            triggered_streaks(&streaks, &GapThresholds::default()),
            vec![StreakKind::Weekend]
        );
        let streaks = Streaks { work: 4, other: 4, weekend: 3 };
        assert_eq!(
            triggered_streaks(&streaks, &GapThresholds::default()),
            vec![StreakKind::Work, StreakKind::Other]
        );
    }

    #[test]
    fn test_total_silence_counts_everything() {
        let buckets = bucket_listens(&[], Tz::UTC, as_of(), 14);
        let streaks = compute_streaks(&buckets);
        assert_eq!(streaks, Streaks { work: 10, other: 14, weekend: 4 });
    }

    #[test]
    fn test_weekend_streak_skips_weekdays() {
        // Only weekday listens: weekend days are all silent.
        let listens: Vec<_> = history(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap())
            .into_iter()
            .filter(|l| !is_weekend(l.weekday()))
            .collect();
        let buckets = bucket_listens(&listens, Tz::UTC, as_of(), 14);
        let streaks = compute_streaks(&buckets);
        assert_eq!(streaks.weekend, 4);
        assert_eq!(streaks.work, 0);
    }

    #[test]
    fn test_simulation_reports_each_triggering_day() {
        let listens = history(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        let reports = simulate_gaps(&listens, Tz::UTC, as_of(), 14, &GapThresholds::default(), 5);

        // Work streak reaches 4 on Thursday and 5 on Friday.
        let dates: Vec<_> = reports.iter().map(|r| r.as_of.date_naive()).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            ]
        );
    }

    #[test]
    fn test_report_body_lists_trigger_and_days() {
        let listens = history(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        let GapOutcome::Gap(report) =
            detect_gaps(&listens, Tz::UTC, as_of(), 14, &GapThresholds::default())
        else {
            panic!("Expected a gap");
        };
        let body = report.to_string();
        assert!(body.contains("work-hour silence: 5 weekdays"));
        assert!(body.contains("2024-03-15  Fri"));
        assert_eq!(body.lines().count(), 1 + 1 + 1 + 1 + 14);
    }
}
