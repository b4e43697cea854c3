pub mod sqlite;
pub mod text;

use std::path::Path;

use crate::error::SourceError;

pub use sqlite::SqliteDump;
pub use text::TextDump;

/// Read-only view over one dictionary.
pub trait DictionarySource {
    /// Every headword once, in source order.
    fn headwords(&self) -> Result<Vec<String>, SourceError>;

    /// Raw entry markup for `headword`.
    fn markup(&self, headword: &str) -> Result<String, SourceError>;
}

/// Open a dictionary export, picking the reader from the file extension.
pub fn open(path: &Path) -> Result<Box<dyn DictionarySource>, SourceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("txt") => Ok(Box::new(TextDump::open(path)?)),
        Some("db" | "sqlite" | "sqlite3") => Ok(Box::new(SqliteDump::open(path)?)),
        _ => Err(SourceError::UnsupportedFormat(path.to_path_buf())),
    }
}
