use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use reqplay::config::Config;
use reqplay::http::builder::ExecutionConfig;
use reqplay::http::client::build_client;
use reqplay::http::executor::ReqwestTransport;
use reqplay::runner::{RunOutcome, Runner};
use reqplay::state::request_state::{HttpMethod, KeyValue, RequestDraft};
use reqplay::storage::{CollectionStore, FileStore, RequestStore, RunLogStore};

#[derive(Parser)]
#[command(name = "reqplay", version, about = "Run saved HTTP requests and keep their history")]
struct Cli {
    /// Config file (defaults to <config dir>/reqplay/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where collections, requests and run logs are stored
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(subcommand)]
    Collection(CollectionCommand),
    #[command(subcommand)]
    Request(RequestCommand),
    /// Run a saved request
    Run { request_id: String },
    /// Run a one-off request without saving it
    Exec {
        method: HttpMethod,
        url: String,
        #[command(flatten)]
        parts: RequestParts,
    },
    /// Show the run history of a request
    History { request_id: String },
}

#[derive(Subcommand)]
enum CollectionCommand {
    Add { name: String },
    List,
}

#[derive(Subcommand)]
enum RequestCommand {
    Add {
        collection_id: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "GET")]
        method: HttpMethod,
        #[arg(long)]
        url: String,
        #[command(flatten)]
        parts: RequestParts,
    },
    List { collection_id: String },
    Rm { collection_id: String, request_id: String },
}

#[derive(clap::Args)]
struct RequestParts {
    /// Header as `name:value`, repeatable
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<KeyValue>,
    /// Query parameter as `key=value`, repeatable
    #[arg(short = 'q', long = "query", value_parser = parse_query)]
    params: Vec<KeyValue>,
    #[arg(long)]
    body: Option<String>,
}

fn split_pair(raw: &str, sep: char) -> Result<KeyValue, String> {
    match raw.split_once(sep) {
        Some((key, value)) if !key.trim().is_empty() => Ok(KeyValue::new(key.trim(), value.trim())),
        _ => Err(format!("expected key{sep}value, got '{raw}'")),
    }
}

fn parse_header(raw: &str) -> Result<KeyValue, String> {
    split_pair(raw, ':')
}

fn parse_query(raw: &str) -> Result<KeyValue, String> {
    split_pair(raw, '=')
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // RUST_LOG wins over the config file
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let root = cli
        .data_dir
        .or_else(|| config.storage.data_dir.clone())
        .unwrap_or_else(FileStore::default_root);
    tracing::debug!(data_dir = %root.display(), "using data directory");
    let store = Arc::new(FileStore::new(root));

    match cli.command {
        Command::Collection(CollectionCommand::Add { name }) => {
            let collection = store.add_collection(&name).await?;
            println!("{}\t{}", collection.id, collection.name);
        }
        Command::Collection(CollectionCommand::List) => {
            for collection in store.list_collections().await? {
                println!("{}\t{}", collection.id, collection.name);
            }
        }
        Command::Request(RequestCommand::Add {
            collection_id,
            name,
            method,
            url,
            parts,
        }) => {
            let draft = RequestDraft {
                name,
                method,
                url,
                headers: parts.headers,
                parameters: parts.params,
                body: parts.body.unwrap_or_default(),
            };
            let request = store.create(&collection_id, draft).await?;
            println!("{}\t{}", request.id, request.name);
        }
        Command::Request(RequestCommand::List { collection_id }) => {
            for request in store.list_by_collection(&collection_id).await? {
                println!("{}\t{} {}\t{}", request.id, request.method, request.url, request.name);
            }
        }
        Command::Request(RequestCommand::Rm {
            collection_id,
            request_id,
        }) => {
            store.delete(&request_id, &collection_id).await?;
        }
        Command::Run { request_id } => {
            let runner = runner(&config, store.clone())?;
            let outcome = runner.run_saved(&request_id).await?;
            report(&outcome)?;
        }
        Command::Exec { method, url, parts } => {
            let runner = runner(&config, store.clone())?;
            let draft_id = Uuid::new_v4().to_string();
            let exec = ExecutionConfig {
                method,
                url,
                headers: parts.headers,
                params: parts.params,
                body: parts.body,
            };
            let outcome = runner.run_inline(&draft_id, exec).await;
            eprintln!("logged as {draft_id}");
            report(&outcome)?;
        }
        Command::History { request_id } => {
            for run in store.list_by_request(&request_id).await? {
                println!(
                    "{}\t{}\t{}\t{} ms",
                    run.created_at.to_rfc3339(),
                    run.status,
                    run.status_text.as_deref().unwrap_or("-"),
                    run.duration_ms
                );
            }
        }
    }

    Ok(())
}

fn runner(config: &Config, store: Arc<FileStore>) -> anyhow::Result<Runner> {
    let client = build_client(&config.http).context("building HTTP client")?;
    let transport = Arc::new(ReqwestTransport::new(client));
    Ok(Runner::new(transport, store.clone(), store))
}

fn report(outcome: &RunOutcome) -> anyhow::Result<()> {
    match outcome {
        RunOutcome::Succeeded { response, .. } => {
            println!(
                "{} {}\t{} ms\t{}",
                response.status,
                response.status_text,
                response.duration_ms,
                humansize::format_size(response.size, humansize::DECIMAL)
            );
            println!("{}", response.data.to_body_string());
            Ok(())
        }
        RunOutcome::Failed { error, .. } => bail!("{error}"),
    }
}
