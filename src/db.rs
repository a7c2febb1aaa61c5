use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::Connection;

use crate::model::{DegreeRequirement, PrerequisiteRecord};
use crate::orchestrator::{AttemptLogEntry, BoxFuture, FetchedPage, Fetcher};

const DB_PATH: &str = "data/catalog.sqlite";

pub fn connect() -> Result<Connection> {
    if let Some(dir) = Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Rendered-text cache filled by the external fetch layer.
        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            title      TEXT,
            text       TEXT NOT NULL,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS prerequisites (
            course_id     TEXT PRIMARY KEY,
            type          TEXT NOT NULL CHECK(type IN ('NONE','SINGLE','AND','OR')),
            found         BOOLEAN NOT NULL DEFAULT 1,
            -- 0 when a source answered but the raw text resisted parsing.
            normalized    BOOLEAN NOT NULL DEFAULT 1,
            source_method TEXT,
            record        TEXT NOT NULL,
            attempts      TEXT,
            scraped_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS degree_requirements (
            major        TEXT NOT NULL,
            catalog_year TEXT NOT NULL,
            source       TEXT,
            record       TEXT NOT NULL,
            updated_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (major, catalog_year)
        );
        ",
    )?;
    Ok(())
}

pub fn insert_page(conn: &Connection, url: &str, title: &str, text: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO pages (url, title, text) VALUES (?1, ?2, ?3)
         ON CONFLICT(url) DO UPDATE SET title = ?2, text = ?3, fetched_at = datetime('now')",
        rusqlite::params![url, title, text],
    )?;
    Ok(())
}

pub fn get_page(conn: &Connection, url: &str) -> Result<Option<FetchedPage>> {
    let mut stmt = conn.prepare("SELECT url, title, text FROM pages WHERE url = ?1")?;
    let mut rows = stmt.query(rusqlite::params![url])?;
    match rows.next()? {
        Some(row) => Ok(Some(FetchedPage {
            url: row.get(0)?,
            title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            text: row.get(2)?,
        })),
        None => Ok(None),
    }
}

pub fn all_pages(conn: &Connection) -> Result<Vec<FetchedPage>> {
    let mut stmt = conn.prepare("SELECT url, title, text FROM pages ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(FetchedPage {
            url: row.get(0)?,
            title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            text: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Upsert a prerequisite record keyed by course id. ERROR-type records are
/// filtered upstream by the record builder and never reach this point.
pub fn upsert_prerequisite(
    conn: &Connection,
    record: &PrerequisiteRecord,
    found: bool,
    normalized: bool,
    attempts: &[AttemptLogEntry],
) -> Result<()> {
    let json = serde_json::to_string(record)?;
    let type_str = serde_json::to_value(record.prereq_type)?
        .as_str()
        .unwrap_or("NONE")
        .to_string();
    let attempts_json = serde_json::to_string(attempts)?;
    conn.execute(
        "INSERT INTO prerequisites
             (course_id, type, found, normalized, source_method, record, attempts)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(course_id) DO UPDATE SET
             type = ?2, found = ?3, normalized = ?4, source_method = ?5, record = ?6,
             attempts = ?7, scraped_at = datetime('now')",
        rusqlite::params![
            record.course_id.to_string(),
            type_str,
            found,
            normalized,
            record.source_method,
            json,
            attempts_json,
        ],
    )?;
    Ok(())
}

/// Upsert a degree-requirement document keyed by (major, catalog year).
pub fn upsert_degree_requirement(conn: &Connection, req: &DegreeRequirement) -> Result<()> {
    let json = serde_json::to_string(req)?;
    conn.execute(
        "INSERT INTO degree_requirements (major, catalog_year, source, record)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(major, catalog_year) DO UPDATE SET
             source = ?3, record = ?4, updated_at = datetime('now')",
        rusqlite::params![req.major, req.catalog_year, req.source, json],
    )?;
    Ok(())
}

pub struct Stats {
    pub pages: usize,
    pub prerequisites: usize,
    pub verified_none: usize,
    pub unnormalized: usize,
    pub degree_requirements: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> {
        Ok(conn.query_row(sql, [], |row| row.get::<_, i64>(0))? as usize)
    };
    Ok(Stats {
        pages: count("SELECT COUNT(*) FROM pages")?,
        prerequisites: count("SELECT COUNT(*) FROM prerequisites")?,
        verified_none: count(
            "SELECT COUNT(*) FROM prerequisites
             WHERE type = 'NONE' AND found = 1 AND normalized = 1",
        )?,
        unnormalized: count("SELECT COUNT(*) FROM prerequisites WHERE normalized = 0")?,
        degree_requirements: count("SELECT COUNT(*) FROM degree_requirements")?,
    })
}

/// Fetch collaborator backed by the page cache. The Mutex makes the
/// connection shareable across the orchestrator's boxed futures; strategies
/// run sequentially, so it is never contended.
pub struct StoredPageFetcher {
    conn: Mutex<Connection>,
}

impl StoredPageFetcher {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl Fetcher for StoredPageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchedPage>> {
        Box::pin(async move {
            let conn = self.conn.lock().expect("page cache lock poisoned");
            get_page(&conn, url)?.ok_or_else(|| anyhow::anyhow!("no cached page for {}", url))
        })
    }
}
