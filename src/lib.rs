//! Listening-history analytics over a local scrobble database.
//!
//! Core modules:
//! - [`analysis`] - taste drift, forgotten favourites, listening patterns, gap detection
//! - [`store`] - read contract the analyses run against
//! - [`db`] - SQLite implementation of the store, plus import and tag bookkeeping
//!
//! ### Supporting Modules
//!
//! - [`config`] - data directory, database location and validated analysis settings
//! - [`listen`] - listen records and timestamp parsing
//! - [`error`] - typed configuration, query and analysis errors
//! - [`cli`] - command-line interface definitions with clap integration
//! - [`completion`] - shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use lastscope::analysis::{self, Analysis};
//! use lastscope::config::{AnalysisConfig, ConfigOptions};
//! use lastscope::db::SqliteStore;
//!
//! let mut store = SqliteStore::open("listens.db".as_ref())?;
//! store.import_listens("scrobbles.jsonl".as_ref(), "alice")?;
//!
//! let config = AnalysisConfig::new(ConfigOptions {
//!     user: "alice".into(),
//!     timezone: "Europe/Berlin".into(),
//!     ..ConfigOptions::default()
//! })?;
//!
//! let mut gaps = analysis::analyser("gaps")?;
//! gaps.configure(&config)?;
//! if let Analysis::Gaps(outcome) = gaps.run(&store, chrono::Utc::now())? {
//!     println!("{outcome:?}");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Tag weighting
//!
//! A tag's weight is the share of the period's scrobbles that landed on albums
//! carrying it, either directly or through the album's artist:
//!
//! ```text
//! weight(tag) = min(1.0, Σ listens(album) for albums tagged `tag` / max(total, 1))
//! ```
//!
//! Drift compares the top 20 tags of each period; a tag counts as declined or
//! emerged only when it is absent from the other period's full ranking.

pub mod analysis;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod listen;
pub mod store;
