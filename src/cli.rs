//! # Command-Line Interface Module
//!
//! Clap derive definitions for lastscope. Every analysis flag is optional and
//! only overrides the matching field of
//! [`ConfigOptions`](crate::config::ConfigOptions), so defaults live in one place.
//!
//! ## Commands
//!
//! - `init-db`: create the listen database
//! - `import`: load listens or tags from JSON-lines files
//! - `report`: taste profile, drift, patterns and highlights
//! - `forgotten`: dormant artists or albums by interest band
//! - `patterns`: listening-pattern statistics only
//! - `gaps`: check for likely scrobble outages
//! - `tag-candidates`: subjects whose tags are missing or stale
//!
//! ## Examples
//!
//! ```bash
//! lastscope import listens ~/scrobbles.jsonl
//! lastscope --timezone Europe/Berlin gaps --simulate 30
//! lastscope forgotten --subject album --sort listens
//! ```

use crate::config::ConfigOptions;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "lastscope")]
#[command(about = "Lastscope: taste drift, forgotten favourites and scrobble gaps")]
#[command(version)]
pub struct Args {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true, env = "LASTSCOPE_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Whose listening history to analyse
    #[arg(long, global = true, env = "LASTSCOPE_USER", default_value = "default")]
    pub user: String,

    /// IANA timezone used for calendar days and work hours
    #[arg(long, global = true, env = "LASTSCOPE_TZ", default_value = "UTC")]
    pub timezone: String,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the listen database
    InitDb {
        /// Delete and recreate an existing database
        #[arg(long)]
        force: bool,
    },

    /// Import listens or tags from a JSON-lines file
    Import {
        #[command(subcommand)]
        source: ImportSource,
    },

    /// Current vs. historical taste, drift, listening patterns and highlights
    Report(PeriodArgs),

    /// Artists or albums that fell out of rotation, by interest band
    Forgotten(ForgottenArgs),

    /// Listening-pattern statistics for the current period
    Patterns(PeriodArgs),

    /// Look for runs of silent days that suggest the scrobbler stopped
    Gaps(GapArgs),

    /// Subjects whose tags are missing or older than the refresh interval
    TagCandidates {
        /// `artist` or `album`
        #[arg(long, default_value = "album")]
        subject: String,

        /// Only subjects with more listens than this
        #[arg(long, default_value_t = 10)]
        min_listens: u64,

        /// Tags recorded within this many days are considered fresh
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=36_500))]
        refresh_days: u32,
    },

    /// Generate shell completions
    ///
    /// Usage: lastscope completion bash > ~/.local/share/bash-completion/completions/lastscope
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ImportSource {
    /// `{"artist", "album"?, "track", "timestamp"}` per line
    Listens {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,
    },
    /// `{"artist", "album"?, "tag", "count"}` per line
    Tags {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,
    },
}

#[derive(ClapArgs, Debug, Default)]
pub struct PeriodArgs {
    /// Length of the current period in days
    #[arg(long)]
    pub window_days: Option<u32>,

    /// Shift the current period this many days into the past
    #[arg(long)]
    pub offset_days: Option<u32>,

    /// Maximum tags per ranking
    #[arg(long)]
    pub tag_limit: Option<usize>,

    /// Number of top artists and albums to highlight
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(ClapArgs, Debug, Default)]
pub struct ForgottenArgs {
    /// `artist` or `album`
    #[arg(long)]
    pub subject: Option<String>,

    /// Ignore subjects with fewer lifetime scrobbles
    #[arg(long)]
    pub min_scrobbles: Option<u64>,

    /// First listen on or after this instant
    #[arg(long)]
    pub first_after: Option<String>,

    /// First listen on or before this instant
    #[arg(long)]
    pub first_before: Option<String>,

    /// Last listen on or after this instant
    #[arg(long)]
    pub last_after: Option<String>,

    /// Last listen on or before this instant
    #[arg(long)]
    pub last_before: Option<String>,

    /// Results per band
    #[arg(long)]
    pub per_band: Option<usize>,

    /// `dormancy` or `listens`
    #[arg(long)]
    pub sort: Option<String>,

    #[arg(long)]
    pub artist_obsession: Option<u32>,
    #[arg(long)]
    pub artist_strong: Option<u32>,
    #[arg(long)]
    pub artist_moderate: Option<u32>,
    #[arg(long)]
    pub album_obsession: Option<u32>,
    #[arg(long)]
    pub album_strong: Option<u32>,
    #[arg(long)]
    pub album_moderate: Option<u32>,
}

#[derive(ClapArgs, Debug, Default)]
pub struct GapArgs {
    /// Days to inspect, ending at --as-of
    #[arg(long)]
    pub days: Option<u32>,

    /// Silent weekdays needed to trigger (strictly more than)
    #[arg(long)]
    pub work_threshold: Option<u32>,

    /// Days without evening/night listens needed to trigger (strictly more than)
    #[arg(long)]
    pub other_threshold: Option<u32>,

    /// Silent weekend days needed to trigger (at least)
    #[arg(long)]
    pub weekend_threshold: Option<u32>,

    /// Pretend it is this instant
    #[arg(long)]
    pub as_of: Option<String>,

    /// Re-run once per day for this many trailing days and list each trigger
    #[arg(long)]
    pub simulate: Option<u32>,
}

impl PeriodArgs {
    pub fn apply(&self, options: &mut ConfigOptions) {
        if let Some(v) = self.window_days {
            options.window_days = v;
        }
        if let Some(v) = self.offset_days {
            options.offset_days = v;
        }
        if let Some(v) = self.tag_limit {
            options.tag_limit = v;
        }
        if let Some(v) = self.top {
            options.top_n = v;
        }
    }
}

impl ForgottenArgs {
    pub fn apply(&self, options: &mut ConfigOptions) {
        if let Some(v) = &self.subject {
            options.subject = v.clone();
        }
        options.min_scrobbles = self.min_scrobbles;
        if let Some(v) = self.per_band {
            options.per_band = v;
        }
        if let Some(v) = &self.sort {
            options.sort = v.clone();
        }
        options.first_listen_after = self.first_after.clone();
        options.first_listen_before = self.first_before.clone();
        options.last_listen_after = self.last_after.clone();
        options.last_listen_before = self.last_before.clone();
        options.artist_obsession = self.artist_obsession;
        options.artist_strong = self.artist_strong;
        options.artist_moderate = self.artist_moderate;
        options.album_obsession = self.album_obsession;
        options.album_strong = self.album_strong;
        options.album_moderate = self.album_moderate;
    }
}

impl GapArgs {
    pub fn apply(&self, options: &mut ConfigOptions) {
        if let Some(v) = self.days {
            options.gap_days = v;
        }
        if let Some(v) = self.work_threshold {
            options.work_threshold = v;
        }
        if let Some(v) = self.other_threshold {
            options.other_threshold = v;
        }
        if let Some(v) = self.weekend_threshold {
            options.weekend_threshold = v;
        }
        options.as_of = self.as_of.clone();
        options.simulate_days = self.simulate;
    }
}

impl Args {
    /// Global flags folded into fresh options.
    #[must_use]
    pub fn base_options(&self) -> ConfigOptions {
        ConfigOptions {
            user: self.user.clone(),
            timezone: self.timezone.clone(),
            ..ConfigOptions::default()
        }
    }
}
