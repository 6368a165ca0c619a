//! # Configuration Module
//!
//! Data directory handling and the typed analysis configuration.
//!
//! ## Data Storage
//!
//! The listen database lives in the platform-standard data directory:
//! - Linux: `~/.local/share/lastscope/`
//! - macOS: `~/Library/Application Support/lastscope/`
//! - Windows: `%APPDATA%\lastscope\`
//!
//! ## Analysis Configuration
//!
//! [`ConfigOptions`] carries raw values as they come off the command line.
//! [`AnalysisConfig::new`] validates them once (timezone, thresholds, sort mode,
//! windows) and produces an immutable value that is handed to every analyser.
//! Nothing downstream re-validates or reads global state.

use crate::analysis::forgotten::{BandThresholds, SortMode};
use crate::analysis::gaps::GapThresholds;
use crate::error::ConfigError;
use crate::listen::parse_timestamp;
use crate::store::{InstantRange, Subject};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the platform-appropriate database file path, creating the
/// `lastscope` data directory if needed.
///
/// # Errors
///
/// Fails if the system data directory cannot be determined or created.
///
/// # Examples
///
/// ```no_run
/// use lastscope::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Database location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("listens.db"))
}

/// Returns the platform-appropriate data directory for lastscope.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please pass --db explicitly."
        )
    })?;

    let app_dir = data_dir.join("lastscope");
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Use `explicit` when given (made absolute), otherwise the default location.
pub fn resolve_db_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path
            .absolutize()
            .with_context(|| format!("Cannot make {} absolute", path.display()))?
            .into_owned()),
        None => get_db_path(),
    }
}

/// Where to find the database and whose history to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub db_path: PathBuf,
    pub user: String,
}

impl RuntimeConfig {
    pub fn new(db_path: Option<&Path>, user: impl Into<String>) -> Result<Self> {
        Ok(Self {
            db_path: resolve_db_path(db_path)?,
            user: user.into(),
        })
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
}

fn parse_optional_instant(value: Option<&str>) -> Result<Option<DateTime<Utc>>, ConfigError> {
    value.map(parse_timestamp).transpose()
}

/// Longest period, in days, any window or look-back may span.
pub const MAX_DAYS: u32 = 36_500;

/// Raw, unvalidated options. Defaults mirror [`AnalysisConfig::default`].
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    pub user: String,
    pub timezone: String,

    pub window_days: u32,
    pub offset_days: u32,
    pub tag_limit: usize,
    pub top_n: usize,

    pub subject: String,
    /// `None` means the Moderate floor of the chosen subject's band table.
    pub min_scrobbles: Option<u64>,
    pub first_listen_after: Option<String>,
    pub first_listen_before: Option<String>,
    pub last_listen_after: Option<String>,
    pub last_listen_before: Option<String>,
    pub per_band: usize,
    pub sort: String,
    pub artist_obsession: Option<u32>,
    pub artist_strong: Option<u32>,
    pub artist_moderate: Option<u32>,
    pub album_obsession: Option<u32>,
    pub album_strong: Option<u32>,
    pub album_moderate: Option<u32>,

    pub gap_days: u32,
    pub work_threshold: u32,
    pub other_threshold: u32,
    pub weekend_threshold: u32,
    pub as_of: Option<String>,
    pub simulate_days: Option<u32>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        let defaults = AnalysisConfig::default();
        let AnalysisConfig {
            user,
            timezone,
            report,
            forgotten,
            gaps,
        } = defaults;
        Self {
            user,
            timezone: timezone.name().to_string(),
            window_days: report.window_days,
            offset_days: report.offset_days,
            tag_limit: report.tag_limit,
            top_n: report.top_n,
            subject: forgotten.subject.to_string(),
            min_scrobbles: None,
            first_listen_after: None,
            first_listen_before: None,
            last_listen_after: None,
            last_listen_before: None,
            per_band: forgotten.per_band,
            sort: forgotten.sort.to_string(),
            artist_obsession: None,
            artist_strong: None,
            artist_moderate: None,
            album_obsession: None,
            album_strong: None,
            album_moderate: None,
            gap_days: gaps.days,
            work_threshold: gaps.thresholds.work,
            other_threshold: gaps.thresholds.other,
            weekend_threshold: gaps.thresholds.weekend,
            as_of: None,
            simulate_days: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub window_days: u32,
    pub offset_days: u32,
    pub tag_limit: usize,
    pub top_n: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgottenConfig {
    pub subject: Subject,
    pub min_scrobbles: u64,
    pub first_listen: InstantRange,
    pub last_listen: InstantRange,
    pub per_band: usize,
    pub sort: SortMode,
    pub artist_bands: BandThresholds,
    pub album_bands: BandThresholds,
}

impl ForgottenConfig {
    /// Threshold table for the configured subject.
    #[must_use]
    pub fn bands(&self) -> &BandThresholds {
        match self.subject {
            Subject::Artist => &self.artist_bands,
            Subject::Album => &self.album_bands,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapConfig {
    pub days: u32,
    pub thresholds: GapThresholds,
    pub as_of: Option<DateTime<Utc>>,
    pub simulate_days: Option<u32>,
}

/// Validated, immutable configuration for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub user: String,
    pub timezone: Tz,
    pub report: ReportConfig,
    pub forgotten: ForgottenConfig,
    pub gaps: GapConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            user: "default".to_string(),
            timezone: Tz::UTC,
            report: ReportConfig {
                window_days: 180,
                offset_days: 0,
                tag_limit: 50,
                top_n: 10,
            },
            forgotten: ForgottenConfig {
                subject: Subject::Artist,
                min_scrobbles: u64::from(BandThresholds::ARTIST.moderate()),
                first_listen: InstantRange::default(),
                last_listen: InstantRange::default(),
                per_band: 20,
                sort: SortMode::Dormancy,
                artist_bands: BandThresholds::ARTIST,
                album_bands: BandThresholds::ALBUM,
            },
            gaps: GapConfig {
                days: 14,
                thresholds: GapThresholds::default(),
                as_of: None,
                simulate_days: None,
            },
        }
    }
}

fn positive(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidThreshold {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn at_most_max_days(name: &'static str, days: u32) -> Result<(), ConfigError> {
    if days > MAX_DAYS {
        return Err(ConfigError::InvalidThreshold {
            name,
            reason: format!("{days} days exceeds the limit of {MAX_DAYS}"),
        });
    }
    Ok(())
}

/// The gap look-back, padded by a day on each side, must stay representable.
fn check_gap_span(as_of: DateTime<Utc>, days: u32, simulated: u32) -> Result<(), ConfigError> {
    let span = Duration::days(i64::from(days) + i64::from(simulated) + 2);
    let fits = as_of.checked_sub_signed(span).is_some()
        && as_of.checked_add_signed(Duration::days(2)).is_some();
    if !fits {
        return Err(ConfigError::InvalidWindow(format!(
            "as-of {as_of} leaves no room for a {days}-day look-back"
        )));
    }
    Ok(())
}

impl AnalysisConfig {
    /// Validate `options` and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: unknown timezone, zero,
    /// oversized or misordered thresholds, unknown sort mode or subject,
    /// unparsable or reversed listen windows.
    pub fn new(options: ConfigOptions) -> Result<Self, ConfigError> {
        let timezone = parse_timezone(&options.timezone)?;

        positive("window-days", u64::from(options.window_days))?;
        positive("tag-limit", options.tag_limit as u64)?;
        positive("per-band", options.per_band as u64)?;
        positive("gap-days", u64::from(options.gap_days))?;
        if options.simulate_days == Some(0) {
            positive("simulate-days", 0)?;
        }
        at_most_max_days("window-days", options.window_days)?;
        at_most_max_days("offset-days", options.offset_days)?;
        at_most_max_days("gap-days", options.gap_days)?;
        at_most_max_days("simulate-days", options.simulate_days.unwrap_or(0))?;

        let artist_bands = BandThresholds::new(
            options.artist_obsession.unwrap_or(BandThresholds::ARTIST.obsession()),
            options.artist_strong.unwrap_or(BandThresholds::ARTIST.strong()),
            options.artist_moderate.unwrap_or(BandThresholds::ARTIST.moderate()),
        )?;
        let album_bands = BandThresholds::new(
            options.album_obsession.unwrap_or(BandThresholds::ALBUM.obsession()),
            options.album_strong.unwrap_or(BandThresholds::ALBUM.strong()),
            options.album_moderate.unwrap_or(BandThresholds::ALBUM.moderate()),
        )?;

        let subject: Subject = options.subject.parse()?;
        let min_scrobbles = options.min_scrobbles.unwrap_or_else(|| {
            let bands = match subject {
                Subject::Artist => &artist_bands,
                Subject::Album => &album_bands,
            };
            u64::from(bands.moderate())
        });

        let first_listen = InstantRange::new(
            parse_optional_instant(options.first_listen_after.as_deref())?,
            parse_optional_instant(options.first_listen_before.as_deref())?,
        )?;
        let last_listen = InstantRange::new(
            parse_optional_instant(options.last_listen_after.as_deref())?,
            parse_optional_instant(options.last_listen_before.as_deref())?,
        )?;

        let thresholds = GapThresholds::new(
            options.work_threshold,
            options.other_threshold,
            options.weekend_threshold,
        )?;
        let as_of = parse_optional_instant(options.as_of.as_deref())?;
        if let Some(as_of) = as_of {
            check_gap_span(as_of, options.gap_days, options.simulate_days.unwrap_or(0))?;
        }

        Ok(Self {
            user: options.user,
            timezone,
            report: ReportConfig {
                window_days: options.window_days,
                offset_days: options.offset_days,
                tag_limit: options.tag_limit,
                top_n: options.top_n,
            },
            forgotten: ForgottenConfig {
                subject,
                min_scrobbles,
                first_listen,
                last_listen,
                per_band: options.per_band,
                sort: options.sort.parse()?,
                artist_bands,
                album_bands,
            },
            gaps: GapConfig {
                days: options.gap_days,
                thresholds,
                as_of,
                simulate_days: options.simulate_days,
            },
        })
    }
}
