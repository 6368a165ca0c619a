//! # Lastscope
//!
//! Reads a local scrobble history and reports how listening taste drifts,
//! which favourites fell out of rotation, and when the scrobbler probably
//! stopped recording.
//!
//! ## Usage
//!
//! ```bash
//! # Create the database and load a listen export
//! lastscope init-db
//! lastscope import listens scrobbles.jsonl
//! lastscope import tags tags.jsonl
//!
//! # Analyses
//! lastscope report --window-days 90
//! lastscope forgotten --subject album
//! lastscope --timezone Europe/Berlin gaps
//! ```

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{CommandFactory, Parser};
use lastscope::analysis::gaps::GapOutcome;
use lastscope::analysis::{self, Analysis};
use lastscope::cli::{self, Command, ImportSource};
use lastscope::completion;
use lastscope::config::{AnalysisConfig, ConfigOptions, RuntimeConfig};
use lastscope::db::SqliteStore;
use lastscope::store::Subject;
use log::{debug, info};

/// Main entry point for lastscope.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug lastscope report` - Enable debug logging
/// - `RUST_LOG=lastscope::db=trace lastscope import listens f.jsonl` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    // Resolving the path creates the data directory, so analyses validate first.
    let runtime = || -> Result<RuntimeConfig> {
        let runtime = RuntimeConfig::new(args.db.as_deref(), args.user.clone())?;
        debug!("Using database {}", runtime.db_path.display());
        Ok(runtime)
    };

    let mut options = args.base_options();
    match &args.command {
        Command::InitDb { force } => {
            let runtime = runtime()?;
            if *force {
                SqliteStore::recreate(&runtime.db_path)?;
            } else {
                SqliteStore::open(&runtime.db_path)?;
            }
            println!("Database ready at {}", runtime.db_path.display());
        }
        Command::Import { source } => {
            let runtime = runtime()?;
            let mut store = SqliteStore::open(&runtime.db_path)?;
            match source {
                ImportSource::Listens { path } => {
                    let n = store.import_listens(path, &runtime.user)?;
                    println!("Imported {n} new listens for {}", runtime.user);
                }
                ImportSource::Tags { path } => {
                    let n = store.import_tags(path, Utc::now())?;
                    println!("Recorded tags for {n} subjects");
                }
            }
        }
        Command::Report(period) => {
            period.apply(&mut options);
            run_analysis("report", options, runtime)?;
        }
        Command::Patterns(period) => {
            period.apply(&mut options);
            run_analysis("patterns", options, runtime)?;
        }
        Command::Forgotten(forgotten) => {
            forgotten.apply(&mut options);
            run_analysis("forgotten", options, runtime)?;
        }
        Command::Gaps(gaps) => {
            gaps.apply(&mut options);
            run_analysis("gaps", options, runtime)?;
        }
        Command::TagCandidates {
            subject,
            min_listens,
            refresh_days,
        } => {
            let subject: Subject = subject.parse()?;
            let store = SqliteStore::open(&runtime()?.db_path)?;
            let candidates = store.tag_refresh_candidates(
                subject,
                *min_listens,
                Duration::days(i64::from(*refresh_days)),
                Utc::now(),
            )?;
            info!("{} {subject} tag candidates", candidates.len());
            for candidate in candidates {
                println!("{}\t{}", candidate.listens, candidate.key);
            }
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(*shell), &mut cmd);
        }
    }

    Ok(())
}

/// Validate options, pick the analyser by name and print its result.
///
/// `runtime` is only resolved once the options are known to be valid.
fn run_analysis(
    name: &str,
    options: ConfigOptions,
    runtime: impl FnOnce() -> Result<RuntimeConfig>,
) -> Result<()> {
    let config = AnalysisConfig::new(options)?;
    let mut analyser = analysis::analyser(name)?;
    analyser.configure(&config)?;

    let store = SqliteStore::open(&runtime()?.db_path)?;
    let result = analyser
        .run(&store, Utc::now())
        .with_context(|| format!("{name} analysis failed"))?;

    match result {
        Analysis::Gaps(GapOutcome::NoIssue { streaks }) => {
            println!(
                "No scrobble gap detected (work {}, other {}, weekend {}).",
                streaks.work, streaks.other, streaks.weekend
            );
        }
        Analysis::Gaps(GapOutcome::Gap(report)) => print!("{report}"),
        Analysis::GapHistory(reports) => {
            if reports.is_empty() {
                println!("No scrobble gap triggered in the simulated period.");
            }
            for report in reports {
                print!("{report}");
                println!();
            }
        }
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }

    Ok(())
}
