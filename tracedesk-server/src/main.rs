use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracedesk_core::generation::{self, GeminiGenerationClient};
use tracedesk_core::{GenerationClient, TracedeskConfig};
use tracing_subscriber::{fmt, EnvFilter};

use tracedesk_server::http::{self, HttpState};
use tracedesk_server::subsystems::chat::ChatService;
use tracedesk_server::subsystems::store::PgTraceStore;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "tracedesk.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match TracedeskConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Connect to DB
    let pool = match tracedesk_core::db::connect(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match tracedesk_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Tracedesk DB health check passed");
        return Ok(());
    }

    // Generation client, built once and shared by every request
    let api_key = match generation::api_key_from_env() {
        Ok(k) => k,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let backend = Arc::new(GeminiGenerationClient::new(api_key, &config.generation)?);
    let client = GenerationClient::from_config(backend, &config.generation);
    tracing::info!(
        model = %client.model(),
        max_attempts = client.policy().max_attempts(),
        "Generation client ready"
    );

    let store = Arc::new(PgTraceStore::new(pool.clone()));
    let state = HttpState {
        chat: ChatService::from_client(client, store),
        pool: Some(pool),
        http: config.http.clone(),
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
