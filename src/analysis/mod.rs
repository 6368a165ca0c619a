//! # Analysis Engine
//!
//! Pure computations over store snapshots, plus the [`Analyser`] seam that lets
//! the binary pick one by name.
//!
//! - [`tags`] - tag normalization and weighting
//! - [`drift`] - declined / emerged tags between two periods
//! - [`forgotten`] - interest bands for dormant artists and albums
//! - [`patterns`] - album breadth, new artists, repeat ratio
//! - [`gaps`] - silent-day streaks that hint at tracker outages
//! - [`report`] - assembles the full taste report
//!
//! ```no_run
//! use lastscope::analysis;
//! use lastscope::config::AnalysisConfig;
//! use lastscope::db::SqliteStore;
//!
//! let store = SqliteStore::open("listens.db".as_ref())?;
//! let mut analyser = analysis::analyser("forgotten")?;
//! analyser.configure(&AnalysisConfig::default())?;
//! let result = analyser.run(&store, chrono::Utc::now())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod drift;
pub mod forgotten;
pub mod gaps;
pub mod patterns;
pub mod report;
pub mod tags;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ConfigError};
use crate::store::{CandidateFilter, Store, Window};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Serialize;

/// Output of any analyser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Analysis {
    Report(Box<report::Report>),
    Forgotten(forgotten::ForgottenReport),
    Patterns(patterns::ListeningPatterns),
    Gaps(gaps::GapOutcome),
    GapHistory(Vec<gaps::GapReport>),
}

/// A named analysis that can be configured once and run against a store.
pub trait Analyser {
    fn name(&self) -> &'static str;

    /// Take the validated configuration for subsequent runs.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration cannot be used by this
    /// analyser.
    fn configure(&mut self, config: &AnalysisConfig) -> Result<(), ConfigError>;

    /// Run against `store` with `now` as the reference instant.
    ///
    /// # Errors
    ///
    /// Store failures, wrapped with the failing query's name.
    fn run(&self, store: &dyn Store, now: DateTime<Utc>) -> Result<Analysis, AnalysisError>;
}

/// Names accepted by [`analyser`].
pub const ANALYSERS: [&str; 4] = ["report", "forgotten", "patterns", "gaps"];

/// Select an analyser by name.
pub fn analyser(name: &str) -> Result<Box<dyn Analyser>, ConfigError> {
    let analyser: Box<dyn Analyser> = match name.trim().to_ascii_lowercase().as_str() {
        "report" => Box::<ReportAnalyser>::default(),
        "forgotten" => Box::<ForgottenAnalyser>::default(),
        "patterns" => Box::<PatternsAnalyser>::default(),
        "gaps" => Box::<GapsAnalyser>::default(),
        other => return Err(ConfigError::UnknownAnalyser(other.to_string())),
    };
    Ok(analyser)
}

#[derive(Debug, Default)]
pub struct ReportAnalyser {
    config: AnalysisConfig,
}

impl Analyser for ReportAnalyser {
    fn name(&self) -> &'static str {
        "report"
    }

    fn configure(&mut self, config: &AnalysisConfig) -> Result<(), ConfigError> {
        self.config = config.clone();
        Ok(())
    }

    fn run(&self, store: &dyn Store, now: DateTime<Utc>) -> Result<Analysis, AnalysisError> {
        report::assemble_report(store, &self.config, now).map(|r| Analysis::Report(Box::new(r)))
    }
}

#[derive(Debug, Default)]
pub struct PatternsAnalyser {
    config: AnalysisConfig,
}

impl Analyser for PatternsAnalyser {
    fn name(&self) -> &'static str {
        "patterns"
    }

    fn configure(&mut self, config: &AnalysisConfig) -> Result<(), ConfigError> {
        self.config = config.clone();
        Ok(())
    }

    fn run(&self, store: &dyn Store, now: DateTime<Utc>) -> Result<Analysis, AnalysisError> {
        let window = report::current_window(&self.config, now);
        report::listening_patterns(store, &self.config, &window, now).map(Analysis::Patterns)
    }
}

#[derive(Debug, Default)]
pub struct ForgottenAnalyser {
    config: AnalysisConfig,
}

impl Analyser for ForgottenAnalyser {
    fn name(&self) -> &'static str {
        "forgotten"
    }

    fn configure(&mut self, config: &AnalysisConfig) -> Result<(), ConfigError> {
        self.config = config.clone();
        Ok(())
    }

    fn run(&self, store: &dyn Store, now: DateTime<Utc>) -> Result<Analysis, AnalysisError> {
        let settings = &self.config.forgotten;
        let filter = CandidateFilter {
            min_scrobbles: settings.min_scrobbles,
            first_listen: settings.first_listen,
            last_listen: settings.last_listen,
        };
        let candidates = store.forgotten_candidates(&self.config.user, settings.subject, &filter)?;
        debug!("{} forgotten {} candidates", candidates.len(), settings.subject);

        Ok(Analysis::Forgotten(forgotten::band_forgotten(
            candidates, now, settings,
        )))
    }
}

#[derive(Debug, Default)]
pub struct GapsAnalyser {
    config: AnalysisConfig,
}

impl Analyser for GapsAnalyser {
    fn name(&self) -> &'static str {
        "gaps"
    }

    fn configure(&mut self, config: &AnalysisConfig) -> Result<(), ConfigError> {
        self.config = config.clone();
        Ok(())
    }

    fn run(&self, store: &dyn Store, now: DateTime<Utc>) -> Result<Analysis, AnalysisError> {
        let settings = &self.config.gaps;
        let as_of = settings.as_of.unwrap_or(now);
        let simulated = settings.simulate_days.unwrap_or(0);

        // One extra day on each side covers local-day boundaries in any timezone.
        let span = i64::from(settings.days) + i64::from(simulated) + 1;
        let window = Window {
            start: as_of - Duration::days(span),
            end: as_of + Duration::days(1),
        };
        let listens = store.listen_times(&self.config.user, &window)?;
        let tz = self.config.timezone;

        Ok(match settings.simulate_days {
            Some(days) => Analysis::GapHistory(gaps::simulate_gaps(
                &listens,
                tz,
                as_of,
                settings.days,
                &settings.thresholds,
                days,
            )),
            None => Analysis::Gaps(gaps::detect_gaps(
                &listens,
                tz,
                as_of,
                settings.days,
                &settings.thresholds,
            )),
        })
    }
}
