//! # Listen Database
//!
//! SQLite persistence for listens and tags, and the production
//! [`Store`] implementation.
//!
//! ## Schema
//!
//! - `listens`: one row per scrobble, instant stored as Unix seconds
//! - `artist_tags` / `album_tags`: current tag set per subject with raw counts
//! - `tag_refresh`: when each subject's tags were last recorded (`album = ''`
//!   for artist-level rows)
//!
//! Write paths return `anyhow::Result`; the read queries behind [`Store`]
//! return [`QueryError`] tagged with the query name.

use crate::error::QueryError;
use crate::listen::{Listen, ListenRecord};
use crate::store::{
    AlbumCount, ArtistBreadth, ArtistCount, CandidateFilter, ForgottenCandidate, Store, Subject,
    SubjectKey, TagAssociation, TrackAlbumCounts, Window,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, trace, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS listens (
        id          INTEGER PRIMARY KEY,
        user        TEXT    NOT NULL,
        artist      TEXT    NOT NULL,
        album       TEXT    NOT NULL DEFAULT '',
        track       TEXT    NOT NULL,
        listened_at INTEGER NOT NULL,
        UNIQUE(user, artist, album, track, listened_at)
    );
    CREATE INDEX IF NOT EXISTS idx_listens_user_time ON listens(user, listened_at);
    CREATE INDEX IF NOT EXISTS idx_listens_user_artist ON listens(user, artist, album);

    CREATE TABLE IF NOT EXISTS artist_tags (
        artist TEXT    NOT NULL,
        tag    TEXT    NOT NULL,
        count  INTEGER NOT NULL,
        PRIMARY KEY (artist, tag)
    );

    CREATE TABLE IF NOT EXISTS album_tags (
        artist TEXT    NOT NULL,
        album  TEXT    NOT NULL,
        tag    TEXT    NOT NULL,
        count  INTEGER NOT NULL,
        PRIMARY KEY (artist, album, tag)
    );

    CREATE TABLE IF NOT EXISTS tag_refresh (
        artist       TEXT    NOT NULL,
        album        TEXT    NOT NULL DEFAULT '',
        refreshed_at INTEGER NOT NULL,
        PRIMARY KEY (artist, album)
    );
";

/// Import record for one tag association.
#[derive(Debug, Clone, Deserialize)]
pub struct TagRecord {
    pub artist: String,
    #[serde(default)]
    pub album: String,
    pub tag: String,
    pub count: u32,
}

/// A subject due for (re-)tagging.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TagCandidate {
    pub key: SubjectKey,
    pub listens: u64,
}

fn bound(window: Option<&Window>) -> (i64, i64) {
    window.map_or((i64::MIN, i64::MAX), |w| {
        (w.start.timestamp(), w.end.timestamp())
    })
}

fn instant(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

fn count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let n: i64 = row.get(idx)?;
    u64::try_from(n).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, n))
}

/// SQLite-backed listen store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("SQLite connection refused. DB location: {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Cannot open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Invalid SQL when creating the listen schema")?;
        Ok(Self { conn })
    }

    /// Delete the database file at `path` (if any) and create a fresh one.
    pub fn recreate(path: &Path) -> Result<Self> {
        if path.exists() {
            warn!("Removing existing database at {}", path.display());
            fs::remove_file(path)
                .with_context(|| format!("Cannot remove existing database {}", path.display()))?;
        }
        Self::open(path)
    }

    /// Insert listens in one transaction. Already-recorded listens are skipped.
    /// Returns the number of new rows.
    pub fn insert_listens(&mut self, listens: &[Listen]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO listens (user, artist, album, track, listened_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for listen in listens {
                inserted += stmt
                    .execute(params![
                        listen.user,
                        listen.track.artist,
                        listen.track.album,
                        listen.track.name,
                        listen.listened_at.timestamp(),
                    ])
                    .with_context(|| format!("Invalid SQL when INSERTing listen {listen:?}"))?;
            }
        }

        tx.commit().context("Committing listen transaction failed")?;
        debug!("Inserted {inserted} of {} listens", listens.len());
        Ok(inserted)
    }

    /// Replace the tag set of `key` and stamp its refresh time.
    pub fn record_tags(
        &mut self,
        key: &SubjectKey,
        tags: &[(String, u32)],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        let album = key.album.as_deref().unwrap_or("");

        match &key.album {
            Some(album) => {
                tx.execute(
                    "DELETE FROM album_tags WHERE artist = ?1 AND album = ?2",
                    params![key.artist, album],
                )?;
                let mut stmt = tx.prepare(
                    "INSERT INTO album_tags (artist, album, tag, count) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(artist, album, tag) DO UPDATE SET count = excluded.count",
                )?;
                for (tag, n) in tags {
                    stmt.execute(params![key.artist, album, tag, n])?;
                }
            }
            None => {
                tx.execute("DELETE FROM artist_tags WHERE artist = ?1", params![key.artist])?;
                let mut stmt = tx.prepare(
                    "INSERT INTO artist_tags (artist, tag, count) VALUES (?1, ?2, ?3)
                     ON CONFLICT(artist, tag) DO UPDATE SET count = excluded.count",
                )?;
                for (tag, n) in tags {
                    stmt.execute(params![key.artist, tag, n])?;
                }
            }
        }

        tx.execute(
            "INSERT INTO tag_refresh (artist, album, refreshed_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(artist, album) DO UPDATE SET refreshed_at = excluded.refreshed_at",
            params![key.artist, album, now.timestamp()],
        )?;

        tx.commit()
            .with_context(|| format!("Committing tags for `{key}` failed"))?;
        trace!("Recorded {} tags for `{key}`", tags.len());
        Ok(())
    }

    /// Subjects listened to more than `min_listens` times whose tags were
    /// never recorded, or recorded at or before `now - refresh_interval`.
    pub fn tag_refresh_candidates(
        &self,
        subject: Subject,
        min_listens: u64,
        refresh_interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<TagCandidate>> {
        let cutoff = (now - refresh_interval).timestamp();
        let min_listens = i64::try_from(min_listens).unwrap_or(i64::MAX);

        let sql = match subject {
            Subject::Artist => {
                "SELECT l.artist, NULL, COUNT(*) AS n
                 FROM listens l
                 LEFT JOIN tag_refresh r ON r.artist = l.artist AND r.album = ''
                 WHERE r.refreshed_at IS NULL OR r.refreshed_at <= ?1
                 GROUP BY l.artist
                 HAVING n > ?2
                 ORDER BY n DESC, l.artist"
            }
            Subject::Album => {
                "SELECT l.artist, l.album, COUNT(*) AS n
                 FROM listens l
                 LEFT JOIN tag_refresh r ON r.artist = l.artist AND r.album = l.album
                 WHERE l.album != '' AND (r.refreshed_at IS NULL OR r.refreshed_at <= ?1)
                 GROUP BY l.artist, l.album
                 HAVING n > ?2
                 ORDER BY n DESC, l.artist, l.album"
            }
        };

        let mut stmt = self
            .conn
            .prepare(sql)
            .context("Invalid SQL when selecting tag refresh candidates")?;
        let rows = stmt.query_map(params![cutoff, min_listens], |row| {
            Ok(TagCandidate {
                key: SubjectKey {
                    artist: row.get(0)?,
                    album: row.get(1)?,
                },
                listens: count(row, 2)?,
            })
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row.context("Queried tag candidate unwrap failed")?);
        }
        Ok(candidates)
    }

    /// Import a JSON-lines listen file for `user`.
    pub fn import_listens(&mut self, path: &Path, user: &str) -> Result<usize> {
        let records: Vec<ListenRecord> = read_json_lines(path)?;
        let listens = records
            .into_iter()
            .map(|record| record.into_listen(user))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Bad timestamp in {}", path.display()))?;
        let inserted = self.insert_listens(&listens)?;
        info!("Imported {inserted} new listens from {}", path.display());
        Ok(inserted)
    }

    /// Import a JSON-lines tag file. Each subject's tags replace what was
    /// stored before.
    pub fn import_tags(&mut self, path: &Path, now: DateTime<Utc>) -> Result<usize> {
        let records: Vec<TagRecord> = read_json_lines(path)?;
        let mut grouped: std::collections::BTreeMap<SubjectKey, Vec<(String, u32)>> =
            std::collections::BTreeMap::new();
        for record in records {
            let key = if record.album.is_empty() {
                SubjectKey::artist(record.artist)
            } else {
                SubjectKey::album(record.artist, record.album)
            };
            grouped.entry(key).or_default().push((record.tag, record.count));
        }

        for (key, tags) in &grouped {
            self.record_tags(key, tags, now)?;
        }
        info!("Imported tags for {} subjects from {}", grouped.len(), path.display());
        Ok(grouped.len())
    }

    fn query_rows<T, F>(
        &self,
        operation: &'static str,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        map: F,
    ) -> Result<Vec<T>, QueryError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        trace!("Running query `{operation}`");
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| QueryError::new(operation, e))?;
        let rows = stmt
            .query_map(params, map)
            .map_err(|e| QueryError::new(operation, e))?;
        rows.collect::<rusqlite::Result<Vec<T>>>()
            .map_err(|e| QueryError::new(operation, e))
    }

    fn query_one<T, F>(
        &self,
        operation: &'static str,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        map: F,
    ) -> Result<T, QueryError>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        trace!("Running query `{operation}`");
        self.conn
            .query_row(sql, params, map)
            .map_err(|e| QueryError::new(operation, e))
    }
}

fn read_json_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = fs::File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), number + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl Store for SqliteStore {
    fn total_scrobbles(&self, user: &str, window: Option<&Window>) -> Result<u64, QueryError> {
        let (start, end) = bound(window);
        self.query_one(
            "total_scrobbles",
            "SELECT COUNT(*) FROM listens WHERE user = ?1 AND listened_at >= ?2 AND listened_at < ?3",
            params![user, start, end],
            |row| count(row, 0),
        )
    }

    fn total_artists(&self, user: &str, window: Option<&Window>) -> Result<u64, QueryError> {
        let (start, end) = bound(window);
        self.query_one(
            "total_artists",
            "SELECT COUNT(DISTINCT artist) FROM listens
             WHERE user = ?1 AND listened_at >= ?2 AND listened_at < ?3",
            params![user, start, end],
            |row| count(row, 0),
        )
    }

    fn listen_span(
        &self,
        user: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, QueryError> {
        let span = self
            .conn
            .query_row(
                "SELECT MIN(listened_at), MAX(listened_at) FROM listens WHERE user = ?1",
                params![user],
                |row| Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, Option<i64>>(1)?)),
            )
            .optional()
            .map_err(|e| QueryError::new("listen_span", e))?;

        Ok(match span {
            Some((Some(first), Some(last))) => {
                DateTime::from_timestamp(first, 0).zip(DateTime::from_timestamp(last, 0))
            }
            _ => None,
        })
    }

    fn top_artists(
        &self,
        user: &str,
        window: &Window,
        limit: usize,
    ) -> Result<Vec<ArtistCount>, QueryError> {
        let (start, end) = bound(Some(window));
        self.query_rows(
            "top_artists",
            "SELECT artist, COUNT(*) AS n FROM listens
             WHERE user = ?1 AND listened_at >= ?2 AND listened_at < ?3
             GROUP BY artist ORDER BY n DESC, artist LIMIT ?4",
            params![user, start, end, limit_param(limit)],
            |row| {
                Ok(ArtistCount {
                    artist: row.get(0)?,
                    scrobbles: count(row, 1)?,
                })
            },
        )
    }

    fn top_albums(
        &self,
        user: &str,
        window: &Window,
        limit: usize,
    ) -> Result<Vec<AlbumCount>, QueryError> {
        let (start, end) = bound(Some(window));
        self.query_rows(
            "top_albums",
            "SELECT artist, album, COUNT(*) AS n FROM listens
             WHERE user = ?1 AND album != '' AND listened_at >= ?2 AND listened_at < ?3
             GROUP BY artist, album ORDER BY n DESC, artist, album LIMIT ?4",
            params![user, start, end, limit_param(limit)],
            album_count,
        )
    }

    fn top_albums_for_artist(
        &self,
        user: &str,
        artist: &str,
        window: &Window,
        limit: usize,
    ) -> Result<Vec<AlbumCount>, QueryError> {
        let (start, end) = bound(Some(window));
        self.query_rows(
            "top_albums_for_artist",
            "SELECT artist, album, COUNT(*) AS n FROM listens
             WHERE user = ?1 AND artist = ?2 AND album != ''
               AND listened_at >= ?3 AND listened_at < ?4
             GROUP BY album ORDER BY n DESC, album LIMIT ?5",
            params![user, artist, start, end, limit_param(limit)],
            album_count,
        )
    }

    fn artist_tags(&self) -> Result<Vec<TagAssociation>, QueryError> {
        self.query_rows(
            "artist_tags",
            "SELECT artist, tag, count FROM artist_tags ORDER BY artist, count DESC, tag",
            params![],
            |row| {
                Ok(TagAssociation {
                    subject: SubjectKey::artist(row.get::<_, String>(0)?),
                    tag: row.get(1)?,
                    count: row.get(2)?,
                })
            },
        )
    }

    fn album_tags(&self) -> Result<Vec<TagAssociation>, QueryError> {
        self.query_rows(
            "album_tags",
            "SELECT artist, album, tag, count FROM album_tags
             ORDER BY artist, album, count DESC, tag",
            params![],
            |row| {
                Ok(TagAssociation {
                    subject: SubjectKey::album(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                    tag: row.get(2)?,
                    count: row.get(3)?,
                })
            },
        )
    }

    fn album_listen_counts(
        &self,
        user: &str,
        window: &Window,
    ) -> Result<Vec<AlbumCount>, QueryError> {
        let (start, end) = bound(Some(window));
        self.query_rows(
            "album_listen_counts",
            "SELECT artist, album, COUNT(*) AS n FROM listens
             WHERE user = ?1 AND listened_at >= ?2 AND listened_at < ?3
             GROUP BY artist, album ORDER BY artist, album",
            params![user, start, end],
            album_count,
        )
    }

    fn artist_breadth(
        &self,
        user: &str,
        window: &Window,
    ) -> Result<Vec<ArtistBreadth>, QueryError> {
        let (start, end) = bound(Some(window));
        self.query_rows(
            "artist_breadth",
            "SELECT artist, COUNT(DISTINCT NULLIF(album, '')) AS albums, COUNT(*) AS n
             FROM listens
             WHERE user = ?1 AND listened_at >= ?2 AND listened_at < ?3
             GROUP BY artist ORDER BY n DESC, artist",
            params![user, start, end],
            |row| {
                Ok(ArtistBreadth {
                    artist: row.get(0)?,
                    albums: row.get(1)?,
                    listens: count(row, 2)?,
                })
            },
        )
    }

    fn artist_first_listens(&self, user: &str) -> Result<Vec<DateTime<Utc>>, QueryError> {
        self.query_rows(
            "artist_first_listens",
            "SELECT MIN(listened_at) AS first_at FROM listens WHERE user = ?1
             GROUP BY artist ORDER BY first_at",
            params![user],
            |row| instant(row, 0),
        )
    }

    fn track_album_counts(
        &self,
        user: &str,
        window: &Window,
    ) -> Result<TrackAlbumCounts, QueryError> {
        let (start, end) = bound(Some(window));
        self.query_one(
            "track_album_counts",
            "SELECT COUNT(DISTINCT artist || char(31) || album || char(31) || track),
                    COUNT(DISTINCT CASE WHEN album != '' THEN artist || char(31) || album END)
             FROM listens
             WHERE user = ?1 AND listened_at >= ?2 AND listened_at < ?3",
            params![user, start, end],
            |row| {
                Ok(TrackAlbumCounts {
                    tracks: count(row, 0)?,
                    albums: count(row, 1)?,
                })
            },
        )
    }

    fn listen_times(
        &self,
        user: &str,
        window: &Window,
    ) -> Result<Vec<DateTime<Utc>>, QueryError> {
        let (start, end) = bound(Some(window));
        self.query_rows(
            "listen_times",
            "SELECT listened_at FROM listens
             WHERE user = ?1 AND listened_at >= ?2 AND listened_at < ?3
             ORDER BY listened_at",
            params![user, start, end],
            |row| instant(row, 0),
        )
    }

    fn forgotten_candidates(
        &self,
        user: &str,
        subject: Subject,
        filter: &CandidateFilter,
    ) -> Result<Vec<ForgottenCandidate>, QueryError> {
        let first_after = filter.first_listen.after.map_or(i64::MIN, |t| t.timestamp());
        let first_before = filter.first_listen.before.map_or(i64::MAX, |t| t.timestamp());
        let last_after = filter.last_listen.after.map_or(i64::MIN, |t| t.timestamp());
        let last_before = filter.last_listen.before.map_or(i64::MAX, |t| t.timestamp());
        let min = i64::try_from(filter.min_scrobbles).unwrap_or(i64::MAX);

        let sql = match subject {
            Subject::Artist => {
                "SELECT artist, NULL, COUNT(*) AS total,
                        MIN(listened_at) AS first_at, MAX(listened_at) AS last_at
                 FROM listens WHERE user = ?1
                 GROUP BY artist
                 HAVING total >= ?2 AND first_at >= ?3 AND first_at <= ?4
                        AND last_at >= ?5 AND last_at <= ?6
                 ORDER BY artist"
            }
            Subject::Album => {
                "SELECT artist, album, COUNT(*) AS total,
                        MIN(listened_at) AS first_at, MAX(listened_at) AS last_at
                 FROM listens WHERE user = ?1 AND album != ''
                 GROUP BY artist, album
                 HAVING total >= ?2 AND first_at >= ?3 AND first_at <= ?4
                        AND last_at >= ?5 AND last_at <= ?6
                 ORDER BY artist, album"
            }
        };

        self.query_rows(
            "forgotten_candidates",
            sql,
            params![user, min, first_after, first_before, last_after, last_before],
            |row| {
                Ok(ForgottenCandidate {
                    key: SubjectKey {
                        artist: row.get(0)?,
                        album: row.get(1)?,
                    },
                    total_scrobbles: count(row, 2)?,
                    first_listen: instant(row, 3)?,
                    last_listen: instant(row, 4)?,
                })
            },
        )
    }
}

fn album_count(row: &Row<'_>) -> rusqlite::Result<AlbumCount> {
    Ok(AlbumCount {
        artist: row.get(0)?,
        album: row.get(1)?,
        scrobbles: count(row, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listen::Track;
    use crate::store::InstantRange;
    use chrono::TimeZone;

    fn listen(artist: &str, album: &str, track: &str, at: DateTime<Utc>) -> Listen {
        Listen {
            user: "me".to_string(),
            track: Track {
                artist: artist.to_string(),
                album: album.to_string(),
                name: track.to_string(),
            },
            listened_at: at,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_duplicate_listens_ignored() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let l = listen("Low", "Secret Name", "Soon", t0());
        assert_eq!(store.insert_listens(&[l.clone(), l.clone()]).unwrap(), 1);
        assert_eq!(store.insert_listens(&[l]).unwrap(), 0);
        assert_eq!(store.total_scrobbles("me", None).unwrap(), 1);
    }

    #[test]
    fn test_window_is_half_open() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_listens(&[
                listen("Low", "", "A", t0()),
                listen("Low", "", "B", t0() + Duration::hours(1)),
            ])
            .unwrap();

        let window = Window::new(t0(), t0() + Duration::hours(1)).unwrap();
        assert_eq!(store.total_scrobbles("me", Some(&window)).unwrap(), 1);
        assert_eq!(store.listen_times("me", &window).unwrap(), vec![t0()]);
    }

    #[test]
    fn test_empty_history_has_no_span() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.listen_span("nobody").unwrap(), None);
        assert_eq!(store.total_scrobbles("nobody", None).unwrap(), 0);
    }

    #[test]
    fn test_breadth_ignores_empty_album() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_listens(&[
                listen("Low", "", "A", t0()),
                listen("Low", "Secret Name", "B", t0() + Duration::minutes(5)),
                listen("Low", "C'mon", "C", t0() + Duration::minutes(10)),
            ])
            .unwrap();
        let window = Window::trailing(t0() + Duration::days(1), 7, 0);

        let breadth = store.artist_breadth("me", &window).unwrap();
        assert_eq!(breadth, vec![ArtistBreadth { artist: "Low".to_string(), albums: 2, listens: 3 }]);
        let counts = store.track_album_counts("me", &window).unwrap();
        assert_eq!(counts, TrackAlbumCounts { tracks: 3, albums: 2 });
    }

    #[test]
    fn test_tags_come_back_sorted_by_count() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .record_tags(
                &SubjectKey::artist("Low"),
                &[("indie".to_string(), 40), ("slowcore".to_string(), 100)],
                t0(),
            )
            .unwrap();

        let tags: Vec<_> = store.artist_tags().unwrap().into_iter().map(|t| t.tag).collect();
        assert_eq!(tags, vec!["slowcore", "indie"]);
    }

    #[test]
    fn test_record_tags_replaces_previous_set() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let key = SubjectKey::album("Low", "Secret Name");
        store.record_tags(&key, &[("slowcore".to_string(), 100)], t0()).unwrap();
        store.record_tags(&key, &[("dream pop".to_string(), 50)], t0()).unwrap();

        let tags = store.album_tags().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag, "dream pop");
    }

    #[test]
    fn test_candidate_listen_bounds_are_inclusive() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = t0();
        let last = t0() + Duration::days(10);
        store
            .insert_listens(&[
                listen("Low", "Secret Name", "Soon", first),
                listen("Low", "Secret Name", "Lordy", last),
            ])
            .unwrap();

        let one_second = Duration::seconds(1);
        let hits = |first_listen: InstantRange, last_listen: InstantRange| {
            let filter = CandidateFilter {
                min_scrobbles: 1,
                first_listen,
                last_listen,
            };
            store
                .forgotten_candidates("me", Subject::Artist, &filter)
                .unwrap()
                .len()
        };
        let after = |t| InstantRange {
            after: Some(t),
            before: None,
        };
        let before = |t| InstantRange {
            after: None,
            before: Some(t),
        };
        let open = InstantRange::default();

        assert_eq!(hits(after(first), open), 1, "First listen on the after bound");
        assert_eq!(hits(after(first + one_second), open), 0);
        assert_eq!(hits(before(first), open), 1, "First listen on the before bound");
        assert_eq!(hits(before(first - one_second), open), 0);

        assert_eq!(hits(open, after(last)), 1, "Last listen on the after bound");
        assert_eq!(hits(open, after(last + one_second)), 0);
        assert_eq!(hits(open, before(last)), 1, "Last listen on the before bound");
        assert_eq!(hits(open, before(last - one_second)), 0);
    }
}
