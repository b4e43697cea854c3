use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::ExtractError;

static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[_a-zA-Z][_a-zA-Z0-9-]*$").unwrap());

/// Finds link targets inside the dictionary's cross-reference blocks.
pub struct Extractor {
    related: Selector,
    anchor: Selector,
}

impl Extractor {
    /// `class` is the marker carried by cross-reference blocks (`kud` in the
    /// Merriam-Webster collegiate dictionary).
    pub fn new(class: &str) -> Result<Self, ExtractError> {
        if !CLASS_RE.is_match(class) {
            return Err(ExtractError::InvalidClass(class.to_string()));
        }
        let related = Selector::parse(&format!(".{}", class))
            .map_err(|_| ExtractError::InvalidClass(class.to_string()))?;
        let anchor =
            Selector::parse("a").map_err(|_| ExtractError::InvalidClass(class.to_string()))?;
        Ok(Extractor { related, anchor })
    }

    /// Raw `href` values of every anchor nested in a related-class element.
    /// Markup that fails to parse cleanly simply yields fewer (or no) matches.
    pub fn references(&self, markup: &str) -> HashSet<String> {
        let mut refs = HashSet::new();
        if markup.trim().is_empty() {
            return refs;
        }

        let doc = Html::parse_document(markup);
        for block in doc.select(&self.related) {
            for a in block.select(&self.anchor) {
                let Some(href) = a.value().attr("href") else {
                    continue;
                };
                if href.is_empty() {
                    continue;
                }
                refs.insert(href.to_string());
            }
        }
        refs
    }
}
