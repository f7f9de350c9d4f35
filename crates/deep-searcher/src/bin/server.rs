//! deep-searcher HTTP server
//!
//! Run with: cargo run -p deep-searcher --bin deep-searcher-server
//!
//! `DEEP_SEARCHER_CONFIG` points at a YAML or TOML provider configuration; without it the
//! built-in defaults are used. `DEEP_SEARCHER_HOST` and `DEEP_SEARCHER_PORT` override the
//! listener address.

use deep_searcher::{
    server::{state::AppState, DeepSearcherServer, ServerSettings},
    ProviderConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deep_searcher=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      Deep Searcher                        ║
║        Iterative Retrieval-Augmented Question Answering   ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config = match std::env::var("DEEP_SEARCHER_CONFIG") {
        Ok(path) => {
            tracing::info!("Loading configuration from {}", path);
            ProviderConfig::from_file(&path)?
        }
        Err(_) => {
            tracing::info!("DEEP_SEARCHER_CONFIG not set, using default configuration");
            ProviderConfig::default()
        }
    };

    for (capability, setting) in &config.provide_settings {
        tracing::info!("  - {}: {}", capability, setting.provider);
    }
    tracing::info!("  - max_iter: {}", config.query_settings.max_iter);

    let mut settings = ServerSettings::default();
    if let Ok(host) = std::env::var("DEEP_SEARCHER_HOST") {
        settings.host = host;
    }
    if let Ok(port) = std::env::var("DEEP_SEARCHER_PORT") {
        settings.port = port.parse()?;
    }

    let server = DeepSearcherServer::new(settings, AppState::new(config)?);

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /set-provider-config - Select a provider");
    println!("  POST /load-files          - Ingest local files");
    println!("  POST /load-website        - Ingest web pages");
    println!("  GET  /query               - Ask a question");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
