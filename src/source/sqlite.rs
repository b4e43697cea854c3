use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::info;

use super::DictionarySource;
use crate::error::SourceError;

/// SQLite export of an MDX file: table `mdx(entry, paraphrase)`.
pub struct SqliteDump {
    conn: Connection,
}

impl SqliteDump {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let dump = SqliteDump { conn };
        if !dump.has_table()? {
            return Err(SourceError::MissingTable(path.to_path_buf()));
        }
        info!("Opened sqlite dictionary {:?}", path);
        Ok(dump)
    }

    fn has_table(&self) -> Result<bool, SourceError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'mdx'",
            [],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }
}

impl DictionarySource for SqliteDump {
    fn headwords(&self) -> Result<Vec<String>, SourceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry FROM mdx GROUP BY entry ORDER BY MIN(rowid)")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    fn markup(&self, headword: &str) -> Result<String, SourceError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT paraphrase FROM mdx WHERE entry = ?1 ORDER BY rowid")?;
        let parts = stmt
            .query_map([headword], |row| row.get::<_, Option<String>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if parts.is_empty() {
            return Err(SourceError::MissingHeadword(headword.to_string()));
        }
        Ok(parts.into_iter().flatten().collect::<Vec<_>>().join("\n"))
    }
}
