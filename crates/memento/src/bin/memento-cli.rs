//! `memento-cli`: a small binary for manual operation against an in-memory
//! deployment — start a full sync over a directory, inspect the resulting
//! statistics, search the graph, and take a checkpoint. Modeled on
//! `dashflow-cli`'s subcommand layout; real AST extraction, transport, and
//! persistence are out of scope here (spec's Non-goals), so every run
//! starts from an empty graph.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use memento::{
    CheckpointReason, CreateCheckpointOptions, Engine, EngineConfig, Entity, EntityType,
    FullSyncRequest, InMemoryGraphStore, InMemoryVectorStore, MockEmbeddingProvider, ParseResult,
    RepositorySource, SearchMode, SearchRequest,
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "memento-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manual operation CLI for the Memento knowledge-graph sync engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full sync over every file under a directory and print the
    /// resulting operation and statistics.
    Sync {
        #[arg(value_name = "DIR")]
        path: PathBuf,
    },
    /// Sync a directory, then run a structural search over the resulting graph.
    Search {
        #[arg(value_name = "DIR")]
        path: PathBuf,
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Sync a directory, then take a manual checkpoint seeded from every
    /// file entity created.
    Checkpoint {
        #[arg(value_name = "DIR")]
        path: PathBuf,
        #[arg(long, default_value_t = 2)]
        hops: u8,
    },
}

/// Enumerates files under a root directory; every file is represented as a
/// bare `File` entity keyed by path, with no symbol/relationship extraction
/// (the parser is out of scope for this crate — spec §1).
struct FsSource {
    root: PathBuf,
}

impl FsSource {
    fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::walk(&path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RepositorySource for FsSource {
    async fn parse_file(&self, path: &str) -> memento::Result<ParseResult> {
        let contents = std::fs::read(path).map_err(|e| memento::Error::database(format!("read {path}: {e}")))?;
        let hash = format!("{:x}", Sha256::digest(&contents));
        let mut entity = Entity::new(path.to_string(), EntityType::File);
        entity.path = Some(path.to_string());
        entity.content_hash = Some(hash);
        Ok(ParseResult { entities: vec![entity], relationships: Vec::new(), errors: Vec::new() })
    }

    async fn list_files(&self) -> memento::Result<Vec<String>> {
        let mut paths = Vec::new();
        Self::walk(&self.root, &mut paths).map_err(|e| memento::Error::database(format!("walk {}: {e}", self.root.display())))?;
        Ok(paths.into_iter().map(|p| p.to_string_lossy().into_owned()).collect())
    }
}

type DemoEngine = Engine<InMemoryGraphStore, InMemoryVectorStore, MockEmbeddingProvider, FsSource>;

fn build_engine(root: &Path) -> DemoEngine {
    Engine::new(
        Arc::new(InMemoryGraphStore::default()),
        Arc::new(InMemoryVectorStore::default()),
        Arc::new(MockEmbeddingProvider::new(32)),
        Arc::new(FsSource::new(root.to_path_buf())),
        EngineConfig::default(),
    )
}

/// Poll `get_status` until the operation leaves `Pending`/`Running`. A CLI
/// invocation is a single process with no external scheduler, so this is a
/// plain wait rather than the coordinator's own event-driven completion.
async fn await_operation(engine: &DemoEngine, op_id: &str) -> memento::SyncOperation {
    loop {
        if let Some(op) = engine.coordinator().get_status(op_id) {
            if !matches!(op.status, memento::OperationStatus::Pending | memento::OperationStatus::Running) {
                return op;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

async fn run_sync(engine: &DemoEngine) -> Result<memento::SyncOperation> {
    engine.ensure_indexes().await;
    let op_id = engine
        .coordinator()
        .start_full_sync(FullSyncRequest { paths: None, options: Default::default() })
        .await;
    Ok(await_operation(engine, &op_id).await)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { path } => {
            let engine = build_engine(&path);
            let op = run_sync(&engine).await?;
            println!("{}", serde_json::to_string_pretty(&op)?);
            println!("{}", serde_json::to_string_pretty(&engine.coordinator().get_statistics())?);
        }
        Commands::Search { path, query, limit } => {
            let engine = build_engine(&path);
            run_sync(&engine).await.context("initial sync before search")?;
            let mut request = SearchRequest::new(query, SearchMode::Structural);
            request.limit = limit;
            let hits = engine.kgs().search(request).await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Commands::Checkpoint { path, hops } => {
            let engine = build_engine(&path);
            run_sync(&engine).await.context("initial sync before checkpoint")?;
            let Some(temporal) = engine.temporal() else {
                anyhow::bail!("history is disabled; set HISTORY_ENABLED=true");
            };
            let seeds = engine.coordinator().get_statistics();
            if seeds.completed == 0 {
                anyhow::bail!("nothing synced under {}", path.display());
            }
            let files = FsSource::new(path.clone()).list_files().await?;
            let checkpoint_id = temporal
                .create_checkpoint(&files, CheckpointReason::Manual, hops, CreateCheckpointOptions::default())
                .await?;
            println!("{checkpoint_id}");
        }
    }

    Ok(())
}
