use rusqlite::{Connection, OptionalExtension, Result as SqlResult};
use std::path::{Path, PathBuf};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::MediaFolder;

/// Persisted set of folders the gallery treats as its library.
///
/// Entries are only ever added or refreshed here; the UI prunes stale ones.
/// Exclusion is deliberately not stored: it is read from the marker file.
pub struct WatchList {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedFolder {
    pub path: String,
    pub first_seen: DateTime<Utc>,
    pub last_refreshed: DateTime<Utc>,
}

impl WatchList {
    pub fn open(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        let list = WatchList { conn };
        list.init_schema()?;
        Ok(list)
    }

    pub fn open_in_memory() -> Result<Self> {
        let list = WatchList {
            conn: Connection::open_in_memory()?,
        };
        list.init_schema()?;
        Ok(list)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS watched_folders (
                path TEXT PRIMARY KEY NOT NULL,
                first_seen TEXT NOT NULL,
                last_refreshed TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    // Insert a folder, or bump its refresh time if it is already known
    pub fn upsert(&self, folder: &MediaFolder) -> Result<()> {
        self.upsert_path(&folder.path)
    }

    pub fn upsert_path(&self, path: &Path) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO watched_folders (path, first_seen, last_refreshed)
             VALUES (?1, ?2, ?2)
             ON CONFLICT(path) DO UPDATE SET last_refreshed = excluded.last_refreshed",
            rusqlite::params![path.to_string_lossy(), now],
        )?;

        Ok(())
    }

    pub fn contains(&self, path: &Path) -> Result<bool> {
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM watched_folders WHERE path = ?1"
        )?;

        let found: Option<i64> = stmt
            .query_row([path.to_string_lossy()], |row| row.get(0))
            .optional()?;

        Ok(found.is_some())
    }

    pub fn get(&self, path: &Path) -> Result<Option<WatchedFolder>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, first_seen, last_refreshed FROM watched_folders WHERE path = ?1"
        )?;

        let row = stmt
            .query_row([path.to_string_lossy()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .optional()?;

        row.map(|(path, first, last)| to_watched(path, &first, &last))
            .transpose()
    }

    // All folders, most recently refreshed first
    pub fn all(&self) -> Result<Vec<WatchedFolder>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, first_seen, last_refreshed FROM watched_folders
             ORDER BY last_refreshed DESC, path ASC"
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<SqlResult<Vec<(String, String, String)>>>()?;

        rows.into_iter()
            .map(|(path, first, last)| to_watched(path, &first, &last))
            .collect()
    }

    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.all()?.into_iter().map(|f| PathBuf::from(f.path)).collect())
    }

    pub fn len(&self) -> Result<i64> {
        let mut stmt = self.conn.prepare("SELECT COUNT(*) FROM watched_folders")?;
        let count = stmt.query_row([], |row| row.get(0))?;
        Ok(count)
    }
}

fn to_watched(path: String, first_seen: &str, last_refreshed: &str) -> Result<WatchedFolder> {
    Ok(WatchedFolder {
        path,
        first_seen: DateTime::parse_from_rfc3339(first_seen)?.with_timezone(&Utc),
        last_refreshed: DateTime::parse_from_rfc3339(last_refreshed)?.with_timezone(&Utc),
    })
}
