use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use super::DictionarySource;
use crate::error::SourceError;

const RECORD_END: &str = "</>";

/// MDict source text: `headword`, markup lines, then a `</>` line.
pub struct TextDump {
    order: Vec<String>,
    entries: HashMap<String, String>,
}

impl TextDump {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let dump = Self::parse(&content);
        info!("Loaded {} headwords from {:?}", dump.order.len(), path);
        Ok(dump)
    }

    pub fn parse(content: &str) -> Self {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut dump = TextDump {
            order: Vec::new(),
            entries: HashMap::new(),
        };

        let mut headword: Option<&str> = None;
        let mut body: Vec<&str> = Vec::new();

        for line in content.lines() {
            match headword {
                None => {
                    let line = line.trim();
                    if !line.is_empty() && line != RECORD_END {
                        headword = Some(line);
                    }
                }
                Some(hw) if line.trim() == RECORD_END => {
                    dump.push(hw, &body.join("\n"));
                    headword = None;
                    body.clear();
                }
                Some(_) => body.push(line),
            }
        }
        // last record may lack its terminator
        if let Some(hw) = headword {
            dump.push(hw, &body.join("\n"));
        }
        dump
    }

    fn push(&mut self, headword: &str, markup: &str) {
        match self.entries.get_mut(headword) {
            Some(existing) => {
                debug!(headword, "repeated headword, appending markup");
                existing.push('\n');
                existing.push_str(markup);
            }
            None => {
                self.order.push(headword.to_string());
                self.entries.insert(headword.to_string(), markup.to_string());
            }
        }
    }
}

impl DictionarySource for TextDump {
    fn headwords(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.order.clone())
    }

    fn markup(&self, headword: &str) -> Result<String, SourceError> {
        self.entries
            .get(headword)
            .cloned()
            .ok_or_else(|| SourceError::MissingHeadword(headword.to_string()))
    }
}
