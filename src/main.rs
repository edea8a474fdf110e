use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wellspring::config::Config;
use wellspring::llm::{ChatProvider, GeminiProvider};
use wellspring::server::{self, AppState};
use wellspring::session::ChatSession;

#[derive(Parser)]
#[command(name = "wellspring", version, about = "Conversational-support backend")]
struct Cli {
    /// Address to listen on (overrides SERVER_BIND).
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wellspring=info,tower_http=info".into()),
        )
        .init();

    let mut config = Config::from_env()?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    let provider = Arc::new(GeminiProvider::new(config.llm.clone()));
    tracing::info!(model = provider.model(), "Configured text-generation provider");

    let session = Arc::new(ChatSession::new(
        &config.history,
        config.retry.clone(),
        provider,
    )?);

    // Load order matters: hydrate happened in the constructor; now report
    // snapshot size and run the one-shot retention sweep before serving.
    session.startup().await;

    let state = AppState {
        session,
        limits: config.history.clone(),
    };
    server::serve(state, config.server.bind, shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Received shutdown signal");
}
