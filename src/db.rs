use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use rusqlite::{ffi, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use crate::error::WriteError;
use crate::parser::{split_related, Relation};

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Opens an existing store for queries. Never creates the file or the table.
pub fn connect_read_only(path: &Path, table: &str) -> Result<Connection> {
    check_table(table)?;
    if !path.exists() {
        bail!("store {:?} does not exist; run `extract` first", path);
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open {:?}", path))?;
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |r| r.get(0),
    )?;
    if n == 0 {
        bail!("store {:?} has no table {:?}", path, table);
    }
    Ok(conn)
}

/// Table names are spliced into SQL, so only plain identifiers pass.
pub fn check_table(table: &str) -> Result<()> {
    if !TABLE_RE.is_match(table) {
        bail!("invalid table name {:?}", table);
    }
    Ok(())
}

pub fn init_schema(conn: &Connection, table: &str) -> Result<()> {
    check_table(table)?;
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            word          TEXT NOT NULL PRIMARY KEY,
            related_words TEXT NOT NULL
        );
        "
    ))
    .with_context(|| format!("Failed to create table {}", table))?;
    Ok(())
}

// ── Writing ──

/// Insert-only writer holding one open transaction.
///
/// Inserts accumulate until `commit_every` successful rows have been written
/// (or until [`RelationWriter::finish`] when `commit_every` is 0). Dropping the
/// writer without finishing rolls back whatever is still pending.
pub struct RelationWriter<'c> {
    conn: &'c Connection,
    insert_sql: String,
    commit_every: usize,
    pending: usize,
    committed: usize,
    open: bool,
}

impl<'c> RelationWriter<'c> {
    pub fn begin(conn: &'c Connection, table: &str, commit_every: usize) -> Result<Self> {
        check_table(table)?;
        conn.execute_batch("BEGIN")?;
        Ok(RelationWriter {
            conn,
            insert_sql: format!("INSERT INTO {table} (word, related_words) VALUES (?1, ?2)"),
            commit_every,
            pending: 0,
            committed: 0,
            open: true,
        })
    }

    /// Attempt one insert. Conflicts and ordinary failures leave the
    /// transaction usable; if SQLite rolled it back instead, the writer
    /// closes and returns [`WriteError::TransactionLost`].
    pub fn insert(&mut self, relation: &Relation) -> Result<(), WriteError> {
        if !self.open {
            return Err(WriteError::NotOpen);
        }
        let mut stmt = self.conn.prepare_cached(&self.insert_sql)?;
        match stmt.execute(rusqlite::params![relation.headword, relation.joined()]) {
            Ok(_) => {
                self.pending += 1;
                Ok(())
            }
            Err(e) if self.conn.is_autocommit() => {
                self.open = false;
                let lost = std::mem::take(&mut self.pending);
                Err(WriteError::TransactionLost { lost, source: e })
            }
            Err(e) if is_key_conflict(&e) => Err(WriteError::Conflict(relation.headword.clone())),
            Err(e) => Err(WriteError::Sqlite(e)),
        }
    }

    /// Commit if the batch is full. Returns whether a commit happened.
    pub fn checkpoint(&mut self) -> Result<bool> {
        if self.commit_every == 0 || self.pending < self.commit_every {
            return Ok(false);
        }
        self.conn
            .execute_batch("COMMIT; BEGIN")
            .context("Failed to commit batch")?;
        debug!(rows = self.pending, "committed batch");
        self.committed += self.pending;
        self.pending = 0;
        Ok(true)
    }

    /// Commit the remaining rows and release the transaction.
    /// Returns the number of rows durably written by this writer.
    pub fn finish(mut self) -> Result<usize> {
        if !self.open {
            bail!(WriteError::NotOpen);
        }
        self.conn.execute_batch("COMMIT").context("Failed to commit")?;
        self.open = false;
        self.committed += self.pending;
        self.pending = 0;
        Ok(self.committed)
    }
}

impl Drop for RelationWriter<'_> {
    fn drop(&mut self) {
        if self.open && !self.conn.is_autocommit() {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

fn is_key_conflict(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(f, _) => matches!(
            f.extended_code,
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
        ),
        _ => false,
    }
}

// ── Reading ──

#[derive(Debug, Serialize)]
pub struct RelationRecord {
    pub word: String,
    pub related: Vec<String>,
}

pub fn fetch_related(conn: &Connection, table: &str, word: &str) -> Result<Option<RelationRecord>> {
    check_table(table)?;
    let joined: Option<String> = conn
        .query_row(
            &format!("SELECT related_words FROM {table} WHERE word = ?1"),
            [word],
            |r| r.get(0),
        )
        .optional()?;
    Ok(joined.map(|j| RelationRecord {
        word: word.to_string(),
        related: split_related(&j),
    }))
}

pub struct Stats {
    pub records: usize,
    pub links: usize,
}

pub fn get_stats(conn: &Connection, table: &str) -> Result<Stats> {
    check_table(table)?;
    let mut stmt = conn.prepare(&format!("SELECT related_words FROM {table}"))?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stats {
        records: rows.len(),
        links: rows.iter().map(|j| split_related(j).len()).sum(),
    })
}
