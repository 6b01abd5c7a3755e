//! VecVault CLI - Command-line interface
//!
//! Usage:
//!   vecvault insert --embedding 0.1,0.2,0.3 [--id <id>] [--metadata <text>]
//!   vecvault search --query 0.1,0.2,0.3 [-k 10] [--min-score 0.8]
//!   vecvault get <id>
//!   vecvault list
//!   vecvault delete <id>
//!
//! Each invocation loads the snapshot (if one exists), runs a single
//! operation and writes the snapshot back after mutations.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use vecvault_core::{AppConfig, LoggingConfig, NewVector};
use vecvault_vector::VectorService;

#[derive(Parser)]
#[command(name = "vecvault")]
#[command(about = "In-memory vector store with duplicate detection")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables still override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot file to load before and save after the command
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a vector, rejecting near-duplicates
    Insert {
        /// Comma-separated components, e.g. 0.1,0.2,0.3
        #[arg(long, allow_hyphen_values = true)]
        embedding: String,
        /// Explicit id (a UUID is generated otherwise)
        #[arg(long)]
        id: Option<String>,
        /// Free-form metadata
        #[arg(long, default_value = "")]
        metadata: String,
    },
    /// Fetch a vector by id
    Get { id: String },
    /// List all vectors
    List,
    /// Delete a vector by id
    Delete { id: String },
    /// Find the most similar vectors
    Search {
        /// Comma-separated query components
        #[arg(long, allow_hyphen_values = true)]
        query: String,
        /// Number of results
        #[arg(short, long, default_value_t = 10)]
        k: usize,
        /// Drop results whose similarity is below this value
        #[arg(long, allow_hyphen_values = true)]
        min_score: Option<f64>,
    },
    /// Number of stored vectors
    Count,
    /// Store and index statistics
    Stats,
}

impl Commands {
    fn mutates(&self) -> bool {
        matches!(self, Commands::Insert { .. } | Commands::Delete { .. })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);

    let service = VectorService::from_config(&config.store)?;
    let snapshot_path = cli.snapshot.or_else(|| config.store.snapshot_path.clone());

    if let Some(path) = snapshot_path.as_deref().filter(|p| p.exists()) {
        let loaded = service
            .load_snapshot(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
        debug!(path = %path.display(), loaded, "Snapshot loaded");
    }

    let mutates = cli.command.mutates();
    run(&service, cli.command)?;

    if mutates {
        if let Some(path) = snapshot_path.as_deref() {
            service
                .save_snapshot(path)
                .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
        }
    }

    Ok(())
}

fn run(service: &VectorService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Insert {
            embedding,
            id,
            metadata,
        } => {
            let mut input = NewVector::new(parse_components(&embedding)?)
                .with_metadata(metadata);
            if let Some(id) = id {
                input = input.with_id(id);
            }
            let record = service.create(input)?;
            info!(id = %record.id, "Inserted vector");
            print_json(&*record)
        }
        Commands::Get { id } => {
            let record = service
                .get(&id)
                .with_context(|| format!("Vector not found: {id}"))?;
            print_json(&*record)
        }
        Commands::List => print_json(&service.get_all()),
        Commands::Delete { id } => {
            let deleted = service.delete(&id);
            print_json(&serde_json::json!({ "id": id, "deleted": deleted }))
        }
        Commands::Search {
            query,
            k,
            min_score,
        } => {
            let query = parse_components(&query)?;
            let results = service.find_similar_filtered(&query, k, min_score)?;
            print_json(&results)
        }
        Commands::Count => print_json(&serde_json::json!({ "count": service.count() })),
        Commands::Stats => print_json(&service.stats()),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Parse `0.1, 0.2,0.3` into components
fn parse_components(raw: &str) -> anyhow::Result<Vec<f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>()
                .with_context(|| format!("Invalid vector component: {part:?}"))
        })
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_components() {
        let parsed = parse_components("0.1,0.2, -3").unwrap();
        assert_eq!(parsed, vec![0.1, 0.2, -3.0]);
        assert_eq!(parse_components(" 1 ,").unwrap(), vec![1.0]);
        assert!(parse_components("").unwrap().is_empty());
        assert!(parse_components("0.1,abc").is_err());
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vecvault",
            "search",
            "--query",
            "-0.5,1",
            "-k",
            "3",
            "--min-score",
            "-0.25",
            "--snapshot",
            "store.json",
        ])
        .unwrap();

        assert_eq!(cli.snapshot, Some(PathBuf::from("store.json")));
        match cli.command {
            Commands::Search {
                query,
                k,
                min_score,
            } => {
                assert_eq!(query, "-0.5,1");
                assert_eq!(k, 3);
                assert_eq!(min_score, Some(-0.25));
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_mutating_commands() {
        let insert =
            Cli::try_parse_from(["vecvault", "insert", "--embedding", "1,0"]).unwrap();
        assert!(insert.command.mutates());
        let list = Cli::try_parse_from(["vecvault", "list"]).unwrap();
        assert!(!list.command.mutates());
    }

    #[test]
    fn test_run_against_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let service = VectorService::default();
        run(
            &service,
            Commands::Insert {
                embedding: "1,0".to_string(),
                id: Some("a".to_string()),
                metadata: "note".to_string(),
            },
        )
        .unwrap();
        service.save_snapshot(&path).unwrap();

        let reloaded = VectorService::default();
        reloaded.load_snapshot(&path).unwrap();
        assert_eq!(reloaded.get("a").unwrap().metadata, "note");
        let missing = Commands::Get {
            id: "missing".to_string(),
        };
        assert!(run(&reloaded, missing).is_err());
    }

    #[test]
    fn test_search_rejects_non_finite_query() {
        let service = VectorService::default();
        service.create(NewVector::new(vec![1.0, 0.0])).unwrap();

        let search = |query: &str, min_score| {
            run(
                &service,
                Commands::Search {
                    query: query.to_string(),
                    k: 5,
                    min_score,
                },
            )
        };
        assert!(search("1,0", Some(0.5)).is_ok());
        assert!(search("NaN,0", None).is_err());
        assert!(search("inf,0", None).is_err());
    }
}
