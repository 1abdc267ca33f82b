//! Command-line entry point: index a corpus, search it, inspect the index.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use funnel_embed::{EmbedConfig, EmbeddingProvider, HashProvider, RemoteProvider};
use funnel_retriever::{FileConfig, Indexer, IndexerConfig};
use tracing::warn;

#[derive(Debug, Parser)]
#[command(
    name = "funnel-retriever",
    version,
    about = "Index a text corpus and search it with two-stage funnel retrieval"
)]
struct Cli {
    /// Corpus root directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Index snapshot file
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// TOML config file carrying the same settings as the flags
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embedding service base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Embedding model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key (falls back to $FUNNEL_API_KEY, then $OPENAI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Index changed chunks under the corpus root
    Index {
        /// Process at most this many files
        #[arg(long)]
        limit: Option<usize>,

        /// Drop the existing index first and re-embed everything
        #[arg(long)]
        reindex: bool,
    },
    /// Search the index
    Search {
        /// The query text
        query: String,

        /// Number of hits to return
        #[arg(long, default_value_t = 5)]
        top_k: usize,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Show index statistics
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => bail!("unknown output format '{other}', expected text or json"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = build_indexer_config(&cli, &file);
    let provider = build_provider(&cli, &file, config.dimension)?;

    match cli.command {
        Command::Index { limit, reindex } => {
            let mut indexer = Indexer::open(config, provider).await?;

            let cancel = indexer.cancel_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after in-flight batches");
                    cancel.cancel();
                }
            });

            let report = if reindex {
                indexer.reindex(limit).await?
            } else {
                indexer.run_indexing(limit).await?
            };
            println!(
                "Indexed {} files: {} chunks embedded, {} up to date, {} failed batches, {} checkpoints.",
                report.files_scanned,
                report.chunks_embedded,
                report.chunks_up_to_date,
                report.batches_failed,
                report.checkpoints
            );
        }
        Command::Search {
            query,
            top_k,
            format,
        } => {
            let indexer = Indexer::open(config, provider).await?;
            let hits = indexer.search(&query, top_k).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
                OutputFormat::Text => {
                    if hits.is_empty() {
                        println!("No results.");
                    }
                    for hit in hits {
                        println!("{:>7.4}  {}", hit.score, hit.key);
                        println!("         {}", hit.snippet);
                    }
                }
            }
        }
        Command::Stats => {
            let indexer = Indexer::open(config, provider).await?;
            let snapshot = &indexer.config().snapshot_path;
            println!("entries:   {}", indexer.entry_count());
            println!("dimension: {}", indexer.config().dimension);
            match std::fs::metadata(snapshot) {
                Ok(meta) => println!("snapshot:  {} ({} bytes)", snapshot.display(), meta.len()),
                Err(_) => println!("snapshot:  {} (not yet written)", snapshot.display()),
            }
        }
    }
    Ok(())
}

/// Flags take precedence over the config file, which takes precedence over
/// the built-in defaults.
fn build_indexer_config(cli: &Cli, file: &FileConfig) -> IndexerConfig {
    let defaults = IndexerConfig::default();
    let mut config = IndexerConfig::new(
        cli.root
            .clone()
            .or_else(|| file.root.clone())
            .unwrap_or(defaults.root),
    )
    .with_snapshot_path(
        cli.snapshot
            .clone()
            .or_else(|| file.snapshot.clone())
            .unwrap_or(defaults.snapshot_path),
    );
    if let Some(dimension) = file.dimension {
        config = config.with_dimension(dimension);
    }
    if let Some(batch_size) = file.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if let Some(workers) = file.workers {
        config = config.with_workers(workers);
    }
    if let Some(interval) = file.checkpoint_interval {
        config = config.with_checkpoint_interval(interval);
    }
    if let Some(max_chunk_length) = file.max_chunk_length {
        config = config.with_max_chunk_length(max_chunk_length);
    }
    if let Some(shortlist_dimension) = file.shortlist_dimension {
        config = config.with_shortlist_dimension(shortlist_dimension);
    }
    if let Some(shortlist_factor) = file.shortlist_factor {
        config = config.with_shortlist_factor(shortlist_factor);
    }
    config
}

/// Pick the embedding provider: the remote client when a key is configured,
/// otherwise the deterministic offline hash embedder.
fn build_provider(
    cli: &Cli,
    file: &FileConfig,
    dimension: usize,
) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let api_key = cli
        .api_key
        .clone()
        .or_else(|| file.api_key.clone())
        .or_else(|| std::env::var("FUNNEL_API_KEY").ok().filter(|k| !k.is_empty()))
        .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()));

    let Some(api_key) = api_key else {
        warn!("no API key configured, using the offline hash embedder (vectors are not semantic)");
        return Ok(Arc::new(HashProvider::new(dimension)));
    };

    let defaults = EmbedConfig::default();
    let api_base = cli
        .api_base
        .clone()
        .or_else(|| file.api_base.clone())
        .unwrap_or(defaults.api_base);
    let model = cli
        .model
        .clone()
        .or_else(|| file.model.clone())
        .unwrap_or(defaults.model);

    let embed = EmbedConfig::new(api_base, model)
        .with_api_key(api_key)
        .with_dimension(dimension);
    let provider = RemoteProvider::new(embed).context("failed to construct the embedding client")?;
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn output_format_parses_case_insensitively() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("yaml").is_err());
    }

    #[test]
    fn flags_override_file_config() {
        let cli = Cli::parse_from([
            "funnel-retriever",
            "index",
            "--root",
            "/from/flag",
            "--limit",
            "3",
        ]);
        let file = FileConfig {
            root: Some(PathBuf::from("/from/file")),
            workers: Some(9),
            ..FileConfig::default()
        };

        let config = build_indexer_config(&cli, &file);
        assert_eq!(config.root, PathBuf::from("/from/flag"));
        // The file still fills in what the flags left unset.
        assert_eq!(config.worker_count, 9);
    }

    #[test]
    fn file_config_fills_when_flags_absent() {
        let cli = Cli::parse_from(["funnel-retriever", "stats"]);
        let file = FileConfig {
            snapshot: Some(PathBuf::from("/var/idx.json")),
            dimension: Some(128),
            ..FileConfig::default()
        };

        let config = build_indexer_config(&cli, &file);
        assert_eq!(config.snapshot_path, PathBuf::from("/var/idx.json"));
        assert_eq!(config.dimension, 128);
        assert_eq!(config.root, PathBuf::from("."));
    }
}
