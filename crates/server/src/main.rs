//! Atlas Server
//!
//! Axum server that streams pipeline runs as NDJSON and serves stored results.
//! The same binary runs a single concept or a recipe search from the command line.

mod api;

use anyhow::{Context, Result};
use atlas_core::models::{Credentials, Settings};
use atlas_core::orchestrator::Coordinator;
use atlas_core::state::ResultStore;
use atlas_core::tools::{RecipeSearchClient, SearchOutcome};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::{net::TcpListener, sync::mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Clone)]
#[command(author, version, about = "Atlas - culturally diverse dish variants with recipes")]
struct Args {
    /// Settings file (defaults to ATLAS_SETTINGS_PATH or <data dir>/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Run the pipeline on one concept and print NDJSON events
    Run {
        /// Dish concept, e.g. "Rice"
        concept: String,
    },
    /// Search the recipe database
    Search {
        /// Search term
        term: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = path.unwrap_or_else(Settings::default_path);
    let settings =
        Settings::load(&path).with_context(|| format!("Failed to load settings from {:?}", path))?;
    settings.load_env_file();
    Ok(settings)
}

async fn run_once(settings: &Settings, store: ResultStore, concept: String) -> Result<()> {
    let credentials = Credentials::from_env(&settings.env.available_keys);
    let (tx, mut rx) = mpsc::channel(16);
    let mut coordinator =
        Coordinator::from_settings(settings, &credentials, store)?.with_event_channel(tx);

    let handle = tokio::spawn(async move { coordinator.run(&concept).await });
    while let Some(event) = rx.recv().await {
        print!("{}", event.to_ndjson()?);
    }

    let run = handle.await.context("Pipeline task failed")?;
    if !run.persisted {
        tracing::warn!(query = %run.query, "Results were not saved");
    }
    Ok(())
}

async fn search_once(settings: &Settings, store: &ResultStore, term: &str) -> Result<()> {
    let credentials = Credentials::from_env(&settings.recipe_search.key_names);
    let client = RecipeSearchClient::from_settings(&settings.recipe_search, &credentials, store).await?;

    match client.search(term).await? {
        SearchOutcome::Found(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        SearchOutcome::RateLimited { status } => {
            tracing::warn!(status, "All recipe-search keys are rate limited");
            println!("{}", serde_json::json!({ "status": status }));
        }
    }
    Ok(())
}

async fn serve(settings: &Settings, store: ResultStore, port: u16) -> Result<()> {
    let state = Arc::new(api::AppState::from_settings(settings, store).await?);
    let app = api::router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Atlas server running at http://{}", addr);
    tracing::info!("   Stream:  /api/query?food=<concept>");
    tracing::info!("   Results: /api/v1/results, /api/v1/dishes/:dish");
    tracing::info!("   Search:  /api/v1/search?q=<term>");
    tracing::info!("   OpenAPI: /api/v1/openapi.json");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let settings = load_settings(args.settings)?;
    let store = ResultStore::open_default();
    tracing::debug!(root = ?store.root(), "Using data directory");

    match args.command.unwrap_or(CliCommand::Serve { port: 8080 }) {
        CliCommand::Serve { port } => serve(&settings, store, port).await,
        CliCommand::Run { concept } => run_once(&settings, store, concept).await,
        CliCommand::Search { term } => search_once(&settings, &store, &term).await,
    }
}
