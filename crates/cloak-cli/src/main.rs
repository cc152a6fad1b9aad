use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloak_core::config::load_config;
use cloak_core::paths::{bulk_store_path, data_dir, settings_path};
use cloak_core::storage::{BulkStore, JsonFileStore, KeyringSecretStore, MemoryStore, SecretStore};
use cloak_core::{Gateway, GatewayConfig, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

mod shell;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cloak calculator gateway harness", long_about = None)]
struct Cli {
    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Keep both stores in memory; nothing reaches the keyring or disk
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive keypad fed from stdin
    Shell,
    /// Print persisted gateway state (never the unlock code)
    Status,
    /// Press a key sequence once, e.g. `12+8*2=`
    Keys {
        sequence: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloak_cli=info,cloak_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let session = Arc::new(open_session(cli.data_dir, cli.ephemeral).await?);
    match cli.command {
        Commands::Shell => shell::run(Arc::new(Gateway::new(session))).await,
        Commands::Status => status_command(&session),
        Commands::Keys { sequence } => keys_command(Gateway::new(session), &sequence).await,
    }
}

async fn open_session(data_dir_override: Option<PathBuf>, ephemeral: bool) -> Result<Session> {
    if ephemeral {
        let store = Arc::new(MemoryStore::new());
        info!("ephemeral session; nothing will be persisted");
        return Ok(Session::start(store.clone(), store, GatewayConfig::default()).await);
    }

    let data = match data_dir_override {
        Some(dir) => dir,
        None => data_dir()?,
    };
    std::fs::create_dir_all(&data)
        .with_context(|| format!("create data directory {}", data.display()))?;
    let config = load_config(&settings_path(&data))?;
    let secrets: Arc<dyn SecretStore> = Arc::new(KeyringSecretStore::new(config.keyring_service.clone()));
    let bulk: Arc<dyn BulkStore> = Arc::new(JsonFileStore::open(bulk_store_path(&data))?);
    info!(data_dir = %data.display(), "session storage opened");
    Ok(Session::start(secrets, bulk, config).await)
}

fn status_command(session: &Session) -> Result<()> {
    let state = session.snapshot();
    let report = serde_json::json!({
        "phase": state.phase(),
        "setupComplete": state.is_setup_complete,
        "paired": state.is_paired,
        "pairedWith": state.paired_with,
        "deviceId": state.device_id,
        "messageCount": state.messages.len(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn keys_command(gateway: Gateway, sequence: &str) -> Result<()> {
    let outcome = gateway.press_str(sequence).await?;
    println!("{}", outcome.display);
    Ok(())
}
