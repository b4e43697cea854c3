pub mod extract;
pub mod normalize;

use std::collections::BTreeSet;

use crate::error::ReferenceError;
use extract::Extractor;
use normalize::PrefixRule;

/// Delimiter used when a related-set is stored as one column.
pub const DELIMITER: &str = ",";

/// One headword and the headwords its entry cross-references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub headword: String,
    pub related: BTreeSet<String>,
}

impl Relation {
    pub fn is_empty(&self) -> bool {
        self.related.is_empty()
    }

    /// Comma-joined form written to the `related_words` column.
    pub fn joined(&self) -> String {
        let words: Vec<&str> = self.related.iter().map(String::as_str).collect();
        words.join(DELIMITER)
    }
}

/// Inverse of [`Relation::joined`].
pub fn split_related(joined: &str) -> Vec<String> {
    joined
        .split(DELIMITER)
        .filter(|w| !w.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

pub struct ProcessedEntry {
    pub relation: Relation,
    pub malformed: Vec<ReferenceError>,
}

/// Markup → raw references → related-set, for a single entry.
pub fn process_entry(
    headword: &str,
    markup: &str,
    extractor: &Extractor,
    rule: &PrefixRule,
) -> ProcessedEntry {
    let raw = extractor.references(markup);
    let normalized = normalize::normalize(headword, &raw, rule);
    ProcessedEntry {
        relation: Relation {
            headword: headword.to_string(),
            related: normalized.related,
        },
        malformed: normalized.malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn run_scenario() {
        let html = r#"<div class="kud"><a href="prefix01jump">jump</a><a href="prefix01run">run</a></div>"#;
        let extractor = Extractor::new("kud").unwrap();
        let entry = process_entry("run", html, &extractor, &PrefixRule::default());
        assert_eq!(entry.relation.joined(), "jump");
        assert!(entry.malformed.is_empty());
    }

    #[test]
    fn entry_without_related_block_is_empty() {
        let extractor = Extractor::new("kud").unwrap();
        let entry = process_entry("walk", "<p>to move on foot</p>", &extractor, &PrefixRule::default());
        assert!(entry.relation.is_empty());
        assert_eq!(entry.relation.joined(), "");
    }

    #[test]
    fn joined_round_trips_to_same_set() {
        let rel = Relation {
            headword: "go".into(),
            related: ["walk", "run out", "proceed"].iter().map(|s| s.to_string()).collect(),
        };
        let back: HashSet<String> = split_related(&rel.joined()).into_iter().collect();
        let orig: HashSet<String> = rel.related.iter().cloned().collect();
        assert_eq!(back, orig);
        assert!(!back.contains("go"));
    }
}
