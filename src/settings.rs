use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::parser::normalize::PrefixRule;

/// Looked up in the working directory when no `--config` is given.
const DEFAULT_CONFIG: &str = "related";
const ENV_PREFIX: &str = "RELATED";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dictionary export to read (`.txt` or sqlite dump).
    pub source_path: PathBuf,
    /// SQLite file the relations are written to.
    pub output_store: PathBuf,
    pub table: String,
    /// Class marking cross-reference blocks in entry markup.
    pub related_class: String,
    /// Characters dropped from each link target when `link_scheme` is unset.
    pub prefix_width: usize,
    /// Literal scheme to strip instead of a fixed width, e.g. `entry://`.
    pub link_scheme: Option<String>,
    /// Rows per commit; 0 commits once at the end of the run.
    pub commit_every: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            source_path: PathBuf::from("merriam.txt"),
            output_store: PathBuf::from("merriam.db"),
            table: "merriam".to_string(),
            related_class: "kud".to_string(),
            prefix_width: 8,
            link_scheme: None,
            commit_every: 0,
        }
    }
}

impl Settings {
    /// Defaults, then the config file, then `RELATED_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG).required(false),
        };
        Config::builder()
            .add_source(file_source)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn prefix_rule(&self) -> PrefixRule {
        match &self.link_scheme {
            Some(scheme) if !scheme.is_empty() => PrefixRule::Scheme(scheme.clone()),
            _ => PrefixRule::Width(self.prefix_width),
        }
    }
}
