use std::collections::{BTreeSet, HashSet};

use tracing::warn;

use super::DELIMITER;
use crate::error::ReferenceError;

/// How the link-scheme marker is removed from a raw reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixRule {
    /// Drop a fixed number of leading characters.
    Width(usize),
    /// Require and strip a literal scheme such as `entry://`.
    Scheme(String),
}

impl Default for PrefixRule {
    fn default() -> Self {
        PrefixRule::Width(8)
    }
}

impl PrefixRule {
    /// Split a raw reference into its bare headword.
    pub fn target<'a>(&self, raw: &'a str) -> Result<&'a str, ReferenceError> {
        let target = match self {
            PrefixRule::Width(width) => match raw.char_indices().nth(*width) {
                Some((i, _)) => &raw[i..],
                None if raw.chars().count() == *width => "",
                None => {
                    return Err(ReferenceError::TooShort {
                        raw: raw.to_string(),
                        width: *width,
                    })
                }
            },
            PrefixRule::Scheme(scheme) => {
                raw.strip_prefix(scheme.as_str())
                    .ok_or_else(|| ReferenceError::MissingScheme {
                        raw: raw.to_string(),
                        scheme: scheme.clone(),
                    })?
            }
        };

        if target.is_empty() {
            return Err(ReferenceError::EmptyTarget(raw.to_string()));
        }
        if target.contains(DELIMITER) {
            return Err(ReferenceError::ContainsDelimiter(target.to_string()));
        }
        Ok(target)
    }
}

pub struct Normalized {
    pub related: BTreeSet<String>,
    pub malformed: Vec<ReferenceError>,
}

/// Strip prefixes, drop the entry's own headword and collapse duplicates.
/// Malformed references are skipped and reported back.
pub fn normalize(headword: &str, raw: &HashSet<String>, rule: &PrefixRule) -> Normalized {
    let mut related = BTreeSet::new();
    let mut malformed = Vec::new();

    for r in raw {
        match rule.target(r) {
            Ok(target) => {
                related.insert(target.to_string());
            }
            Err(e) => {
                warn!(headword, "skipping reference: {}", e);
                malformed.push(e);
            }
        }
    }

    related.remove(headword);
    Normalized { related, malformed }
}
