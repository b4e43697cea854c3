use std::path::PathBuf;

use thiserror::Error;

/// Failures of the dictionary source. Opening errors are fatal; a missing
/// headword only skips that entry.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("unsupported dictionary format: {0:?} (expected .txt, .db, .sqlite or .sqlite3)")]
    UnsupportedFormat(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:?} has no `mdx` table")]
    MissingTable(PathBuf),

    #[error("headword not found: {0}")]
    MissingHeadword(String),

    /// SQLite aborted the whole transaction; everything pending is gone.
    #[error("transaction rolled back by sqlite, {lost} pending rows lost: {source}")]
    TransactionLost {
        lost: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("writer transaction is no longer open")]
    NotOpen,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid related-words class name: {0:?}")]
    InvalidClass(String),
}

/// A raw link target that does not carry a usable headword.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("reference {raw:?} is shorter than the {width}-character prefix")]
    TooShort { raw: String, width: usize },

    #[error("reference {raw:?} does not start with {scheme:?}")]
    MissingScheme { raw: String, scheme: String },

    #[error("reference {0:?} has no target after its prefix")]
    EmptyTarget(String),

    #[error("reference target {0:?} contains the ',' delimiter")]
    ContainsDelimiter(String),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("duplicate headword {0:?}: already stored")]
    Conflict(String),

    /// SQLite aborted the whole transaction; everything pending is gone.
    #[error("transaction rolled back by sqlite, {lost} pending rows lost: {source}")]
    TransactionLost {
        lost: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("writer transaction is no longer open")]
    NotOpen,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl WriteError {
    /// Errors after which the run cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WriteError::TransactionLost { .. } | WriteError::NotOpen)
    }
}
