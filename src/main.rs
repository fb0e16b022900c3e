use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vaf::client::parse_metadata;
use vaf::{
    EmbeddingFunction, FileStorage, Filter, HashingEmbedder, IndexConfig, Metric, MissingSnapshot, TextRecord,
    VafError, VectorIndexClient, DEFAULT_TOP_K,
};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "vaf - an embedding-backed vector index with metadata filtering",
    long_about = None
)]
struct Args {
    /// Snapshot file holding the index
    #[arg(short, long, env = "VAF_SNAPSHOT", default_value = "vaf-index.json")]
    snapshot: PathBuf,

    /// Distance metric: l2 or cosine
    #[arg(short, long, env = "VAF_METRIC", default_value = "l2")]
    metric: Metric,

    /// Vector dimension
    #[arg(short, long, env = "VAF_DIM", default_value_t = 10)]
    dim: usize,

    /// Start from an empty index when the snapshot file does not exist
    #[arg(long)]
    create_if_missing: bool,

    /// Directory of a BERT sentence model; defaults to the hashing embedder
    #[cfg(feature = "embeddings-candle")]
    #[arg(long)]
    model_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed and upsert records from a JSON-lines file
    Upsert {
        /// One `{"id": .., "text": .., ...}` object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Metadata added to every record, as key=value
        #[arg(long = "meta")]
        meta: Vec<String>,
    },
    /// Search by text
    Query {
        #[arg(short, long)]
        text: String,

        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// Required metadata, as key=value
        #[arg(long = "filter")]
        filter: Vec<String>,
    },
    /// Print a record
    Get {
        #[arg(long)]
        id: u64,
    },
    /// Remove a record
    Delete {
        #[arg(long)]
        id: u64,
    },
    /// Print index information
    Info,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let policy = if args.create_if_missing {
        MissingSnapshot::CreateEmpty
    } else {
        MissingSnapshot::Fail
    };
    let config = IndexConfig::new(args.metric, args.dim)?.with_missing_snapshot(policy);

    info!("Opening index at {}", args.snapshot.display());
    let client = VectorIndexClient::open(
        config,
        embedding_function(&args)?,
        Box::new(FileStorage::new(&args.snapshot)),
    )?;
    info!("{}", client);

    match args.command {
        Command::Upsert { input, meta } => {
            let shared = parse_metadata(meta.iter().map(String::as_str))?;
            let records = read_records(&input)?;
            let count = client.upsert_records(records, Some(&shared))?;
            client.persist()?;
            info!("Upserted {} records from {}", count, input.display());
        }
        Command::Query { text, top_k, filter } => {
            let filter: Filter = parse_metadata(filter.iter().map(String::as_str))?.into();
            let results = client.query(&text, top_k, &filter)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Get { id } => match client.get(id)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => return Err(VafError::NotFound { id }.into()),
        },
        Command::Delete { id } => {
            client.delete(id)?;
            client.persist()?;
            info!("Deleted record {}", id);
        }
        Command::Info => {
            println!("{}", serde_json::to_string_pretty(&client.info()?)?);
        }
    }

    Ok(())
}

#[cfg(feature = "embeddings-candle")]
fn embedding_function(args: &Args) -> Result<Box<dyn EmbeddingFunction>, VafError> {
    match &args.model_path {
        Some(path) => Ok(Box::new(vaf::EmbeddingGenerator::new_from_path(path)?)),
        None => Ok(Box::new(HashingEmbedder::new(args.dim)?)),
    }
}

#[cfg(not(feature = "embeddings-candle"))]
fn embedding_function(args: &Args) -> Result<Box<dyn EmbeddingFunction>, VafError> {
    Ok(Box::new(HashingEmbedder::new(args.dim)?))
}

fn read_records(path: &Path) -> Result<Vec<TextRecord>, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str::<TextRecord>(&line)?);
    }
    Ok(records)
}
