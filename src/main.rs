mod db;
mod error;
mod parser;
mod pipeline;
mod settings;
mod source;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use parser::extract::Extractor;
use settings::Settings;

#[derive(Parser)]
#[command(name = "mdict_related", about = "Cross-reference extractor for MDict dictionaries")]
struct Cli {
    /// Config file (default: ./related.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract related words from the dictionary into the store
    Extract {
        /// Dictionary export (.txt source text or sqlite dump)
        #[arg(short, long)]
        source: Option<PathBuf>,
        /// Output sqlite store
        #[arg(long)]
        store: Option<PathBuf>,
        /// Commit after this many rows (0 = once at the end)
        #[arg(long)]
        commit_every: Option<usize>,
        /// Class marking cross-reference blocks
        #[arg(long)]
        class: Option<String>,
        /// Strip this literal link scheme instead of a fixed-width prefix
        #[arg(long)]
        scheme: Option<String>,
    },
    /// Show the related words stored for a headword
    Lookup {
        word: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show store statistics
    Stats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let result = match cli.command {
        Commands::Extract {
            source,
            store,
            commit_every,
            class,
            scheme,
        } => {
            if let Some(p) = source {
                settings.source_path = p;
            }
            if let Some(p) = store {
                settings.output_store = p;
            }
            if let Some(n) = commit_every {
                settings.commit_every = n;
            }
            if let Some(c) = class {
                settings.related_class = c;
            }
            if scheme.is_some() {
                settings.link_scheme = scheme;
            }
            extract(&settings)
        }
        Commands::Lookup { word, json } => {
            let conn = db::connect_read_only(&settings.output_store, &settings.table)?;
            match db::fetch_related(&conn, &settings.table, &word)? {
                Some(rec) if json => println!("{}", serde_json::to_string_pretty(&rec)?),
                Some(rec) => {
                    for w in &rec.related {
                        println!("{}", w);
                    }
                }
                None => println!("No related words stored for {:?}.", word),
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect_read_only(&settings.output_store, &settings.table)?;
            let s = db::get_stats(&conn, &settings.table)?;
            println!("Store:   {:?}", settings.output_store);
            println!("Records: {}", s.records);
            println!("Links:   {}", s.links);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn extract(settings: &Settings) -> anyhow::Result<()> {
    info!(?settings, "Starting extraction");

    // Everything fatal happens before the first entry is read.
    let extractor = Extractor::new(&settings.related_class)?;
    let rule = settings.prefix_rule();
    let source = source::open(&settings.source_path)
        .with_context(|| format!("Failed to open dictionary {:?}", settings.source_path))?;
    let conn = db::connect(&settings.output_store)?;
    db::init_schema(&conn, &settings.table)?;

    let mut writer = db::RelationWriter::begin(&conn, &settings.table, settings.commit_every)?;
    let pb = pipeline::progress_bar();
    let counts = pipeline::run(
        source.as_ref(),
        &extractor,
        &rule,
        &mut writer,
        &pb,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )?;
    pb.finish_and_clear();

    let committed = writer.finish()?;
    info!(committed, "Committed relations to {:?}", settings.output_store);
    counts.print();
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
