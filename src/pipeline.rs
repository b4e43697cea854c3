use std::io::Write;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::db::RelationWriter;
use crate::error::WriteError;
use crate::parser::extract::Extractor;
use crate::parser::normalize::PrefixRule;
use crate::parser::process_entry;
use crate::source::DictionarySource;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunCounts {
    pub entries: usize,
    pub written: usize,
    pub empty: usize,
    pub conflicts: usize,
    pub failed: usize,
    pub unreadable: usize,
    pub malformed_refs: usize,
}

impl RunCounts {
    pub fn print(&self) {
        println!(
            "Processed {} entries: {} written, {} without relations, {} duplicates, {} failed writes, {} unreadable.",
            self.entries, self.written, self.empty, self.conflicts, self.failed, self.unreadable,
        );
        if self.malformed_refs > 0 {
            println!("Skipped {} malformed references.", self.malformed_refs);
        }
    }
}

pub fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// One sequential pass: every headword is read, parsed, normalized and
/// offered to the writer before the next one starts. Per-entry failures are
/// counted and reported; source listing, commit and lost-transaction
/// failures abort.
///
/// Each headword that yields relations is printed to `out`; failed inserts
/// are reported on `err`.
pub fn run(
    source: &dyn DictionarySource,
    extractor: &Extractor,
    rule: &PrefixRule,
    writer: &mut RelationWriter<'_>,
    pb: &ProgressBar,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<RunCounts> {
    let headwords = source.headwords()?;
    pb.set_length(headwords.len() as u64);
    info!("Extracting relations from {} headwords", headwords.len());

    let mut counts = RunCounts::default();

    for headword in &headwords {
        counts.entries += 1;
        pb.inc(1);

        let markup = match source.markup(headword) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping {}: {}", headword, e);
                counts.unreadable += 1;
                continue;
            }
        };

        let entry = process_entry(headword, &markup, extractor, rule);
        counts.malformed_refs += entry.malformed.len();
        if entry.relation.is_empty() {
            counts.empty += 1;
            continue;
        }

        pb.suspend(|| writeln!(out, "{}", headword))?;
        match writer.insert(&entry.relation) {
            Ok(()) => {
                counts.written += 1;
                if writer.checkpoint()? {
                    debug!(written = counts.written, "checkpoint");
                }
            }
            Err(e) => {
                pb.suspend(|| writeln!(err, "Error inserting {}: {}", headword, e))?;
                if e.is_fatal() {
                    return Err(e.into());
                }
                match e {
                    WriteError::Conflict(_) => counts.conflicts += 1,
                    _ => counts.failed += 1,
                }
            }
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::parser::split_related;
    use crate::source::TextDump;
    use rusqlite::Connection;

    fn fixture() -> TextDump {
        TextDump::parse(&std::fs::read_to_string("tests/fixtures/collegiate.txt").unwrap())
    }

    fn extract_into(conn: &Connection, source: &TextDump, commit_every: usize) -> RunCounts {
        extract_capturing(conn, source, commit_every).0
    }

    /// Runs the pipeline and returns the counts with what went to stdout and stderr.
    fn extract_capturing(
        conn: &Connection,
        source: &dyn DictionarySource,
        commit_every: usize,
    ) -> (RunCounts, String, String) {
        let extractor = Extractor::new("kud").unwrap();
        let mut writer = RelationWriter::begin(conn, "merriam", commit_every).unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let counts = run(
            source,
            &extractor,
            &PrefixRule::default(),
            &mut writer,
            &ProgressBar::hidden(),
            &mut out,
            &mut err,
        )
        .unwrap();
        writer.finish().unwrap();
        (
            counts,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn all_rows(conn: &Connection) -> Vec<(String, String)> {
        let mut stmt = conn
            .prepare("SELECT word, related_words FROM merriam ORDER BY word")
            .unwrap();
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    }

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn, "merriam").unwrap();
        conn
    }

    #[test]
    fn run_entry_stores_jump_only() {
        let conn = store();
        extract_into(&conn, &fixture(), 0);
        let rec = db::fetch_related(&conn, "merriam", "run").unwrap().unwrap();
        assert_eq!(rec.related, vec!["jump"]);
    }

    #[test]
    fn entries_without_relations_write_nothing() {
        let conn = store();
        let counts = extract_into(&conn, &fixture(), 0);
        assert!(db::fetch_related(&conn, "merriam", "walk").unwrap().is_none());
        assert!(db::fetch_related(&conn, "merriam", "echo").unwrap().is_none());
        assert_eq!(counts.empty, 2);
    }

    #[test]
    fn stored_sets_exclude_headword_and_duplicates() {
        let conn = store();
        extract_into(&conn, &fixture(), 0);
        for (word, joined) in all_rows(&conn) {
            let items = split_related(&joined);
            let unique: std::collections::HashSet<_> = items.iter().collect();
            assert_eq!(unique.len(), items.len(), "duplicates in {}", word);
            assert!(!items.contains(&word), "{} relates to itself", word);
        }
    }

    #[test]
    fn fixture_counts() {
        let conn = store();
        let counts = extract_into(&conn, &fixture(), 0);
        assert_eq!(
            counts,
            RunCounts {
                entries: 5,
                written: 3,
                empty: 2,
                conflicts: 0,
                failed: 0,
                unreadable: 0,
                malformed_refs: 1,
            }
        );
        assert_eq!(
            all_rows(&conn),
            vec![
                ("fast".to_string(), "quick,rapid".to_string()),
                ("quick".to_string(), "fast".to_string()),
                ("run".to_string(), "jump".to_string()),
            ]
        );
    }

    #[test]
    fn rerun_reports_conflicts_and_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merriam.db");
        let source = fixture();

        let first = {
            let conn = db::connect(&path).unwrap();
            db::init_schema(&conn, "merriam").unwrap();
            extract_into(&conn, &source, 0)
        };
        let before = all_rows(&db::connect(&path).unwrap());

        let conn = db::connect(&path).unwrap();
        db::init_schema(&conn, "merriam").unwrap();
        let second = extract_into(&conn, &source, 0);

        assert_eq!(second.entries, first.entries);
        assert_eq!(second.conflicts, first.written);
        assert_eq!(second.written, 0);
        assert_eq!(all_rows(&conn), before);
    }

    #[test]
    fn per_record_commits_give_same_result() {
        let conn = store();
        let counts = extract_into(&conn, &fixture(), 1);
        assert_eq!(counts.written, 3);
        assert_eq!(all_rows(&conn).len(), 3);
    }

    struct Flaky(TextDump);

    impl DictionarySource for Flaky {
        fn headwords(&self) -> Result<Vec<String>, crate::error::SourceError> {
            let mut words = self.0.headwords()?;
            words.insert(0, "ghost".to_string());
            Ok(words)
        }

        fn markup(&self, headword: &str) -> Result<String, crate::error::SourceError> {
            self.0.markup(headword)
        }
    }

    #[test]
    fn unreadable_entry_does_not_stop_the_run() {
        let conn = store();
        let (counts, out, _) = extract_capturing(&conn, &Flaky(fixture()), 0);
        assert_eq!(counts.unreadable, 1);
        assert_eq!(counts.written, 3);
        assert!(!out.contains("ghost"));
    }

    #[test]
    fn console_lists_only_headwords_with_relations() {
        let conn = store();
        let (_, out, err) = extract_capturing(&conn, &fixture(), 0);
        assert_eq!(out, "run\nfast\nquick\n");
        assert!(err.is_empty());
    }

    #[test]
    fn console_reports_each_duplicate_on_rerun() {
        let conn = store();
        extract_into(&conn, &fixture(), 0);
        let (counts, out, err) = extract_capturing(&conn, &fixture(), 0);
        assert_eq!(counts.conflicts, 3);
        assert_eq!(out, "run\nfast\nquick\n");
        let lines: Vec<&str> = err.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Error inserting run: "));
        assert!(lines.iter().all(|l| l.contains("duplicate headword")));
    }

    #[test]
    fn transaction_rolled_back_by_sqlite_aborts_the_run() {
        let conn = store();
        conn.execute_batch(
            "CREATE TRIGGER refuse_quick BEFORE INSERT ON merriam WHEN NEW.word = 'quick'
             BEGIN SELECT RAISE(ROLLBACK, 'refused'); END;",
        )
        .unwrap();

        let extractor = Extractor::new("kud").unwrap();
        let mut writer = RelationWriter::begin(&conn, "merriam", 0).unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = run(
            &fixture(),
            &extractor,
            &PrefixRule::default(),
            &mut writer,
            &ProgressBar::hidden(),
            &mut out,
            &mut err,
        );
        let e = result.unwrap_err();
        assert!(matches!(
            e.downcast_ref::<WriteError>(),
            Some(WriteError::TransactionLost { lost: 2, .. })
        ));
        drop(writer);
        assert!(all_rows(&conn).is_empty());
        assert!(String::from_utf8(err).unwrap().starts_with("Error inserting quick: "));
    }
}
