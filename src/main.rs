//! qachat - serve the Gemini chat page.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use qachat::ui::{create_router, ServerState};
use qachat::{config, AppConfig, ChatSession, GeminiClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "qachat")]
#[command(about = "Ask Gemini questions from a web page")]
struct Cli {
    /// Address to listen on (overrides QACHAT_ADDR)
    #[arg(short, long)]
    addr: Option<String>,

    /// Gemini model name (overrides GEMINI_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// API root, e.g. a local mock server (overrides GEMINI_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,qachat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Error configuring Gemini: {e:#}");
            eprintln!("Error configuring Gemini: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server stopped: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env()?;
    if let Some(addr) = &cli.addr {
        config.bind_addr = config::parse_addr(addr)?;
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    Ok(config)
}

async fn serve(config: AppConfig) -> Result<()> {
    tracing::debug!(?config, "Configuration loaded");

    let client = GeminiClient::from_config(&config).context("Failed to build Gemini client")?;
    tracing::info!(model = client.model(), "Using Gemini model");

    let session = ChatSession::new(Arc::new(client));
    tracing::debug!(
        session = %session.id(),
        provider = session.provider_name(),
        "Serving one shared chat session"
    );
    let state = ServerState::new(&config.page_title, &config.header, session);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
