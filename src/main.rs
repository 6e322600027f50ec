//! Elicit server binary - composition root and CLI.

use clap::{Parser, Subcommand};
use elicit_core::{ConceptRegistry, InterviewConfig, MethodologyRegistry};
use elicit_engine::{
    CanonicalSlotService, ExtractionService, QuestionService, SessionService, SignalExtractor,
    StrategyService,
};
use elicit_gateway::{start_gateway, AppState};
use elicit_graph::{EmbeddingService, MemoryStore};
use elicit_llm::{AnthropicClient, LlmClients};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "elicit", about = "Adaptive qualitative-interview engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8620)]
        port: u16,

        /// JSON interview configuration; defaults apply when missing.
        #[arg(long, default_value = "config/elicit.json")]
        config: PathBuf,

        #[arg(long, default_value = "config/methodologies")]
        methodologies: PathBuf,

        #[arg(long, default_value = "config/concepts")]
        concepts: PathBuf,

        /// Also write logs to this directory (non-blocking appender).
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

fn init_logging(log_dir: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "elicit.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().json().with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            host,
            port,
            config,
            methodologies,
            concepts,
            log_dir,
        } => {
            let _log_guard = init_logging(log_dir.as_ref());

            let config = InterviewConfig::load(&config)?;
            let api_key = std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY not set"))?;

            let clients = LlmClients::new(
                Arc::new(
                    AnthropicClient::new(&api_key, &config.llm.extraction.model)
                        .with_default_timeout(Duration::from_secs(config.llm.extraction.timeout_secs)),
                ),
                Arc::new(
                    AnthropicClient::new(&api_key, &config.llm.scoring.model)
                        .with_default_timeout(Duration::from_secs(config.llm.scoring.timeout_secs)),
                ),
                Arc::new(
                    AnthropicClient::new(&api_key, &config.llm.generation.model)
                        .with_default_timeout(Duration::from_secs(config.llm.generation.timeout_secs)),
                ),
            );

            let store = Arc::new(MemoryStore::new());
            let embeddings = Arc::new(EmbeddingService::new());
            let methodology_registry = Arc::new(MethodologyRegistry::new(methodologies));
            let concept_registry = Arc::new(ConceptRegistry::new(concepts));

            let engine = elicit_scoring::build_engine(&config)?;
            let strategy = StrategyService::new(engine, &config.phases, &config.engine);

            let sessions = Arc::new(SessionService::new(
                store.clone(),
                methodology_registry.clone(),
                concept_registry,
                ExtractionService::new(
                    clients.extraction.clone(),
                    methodology_registry,
                    config.llm.extraction.temperature,
                    config.llm.extraction.max_tokens,
                    Duration::from_secs(config.llm.extraction.timeout_secs),
                ),
                CanonicalSlotService::new(clients.extraction.clone(), store, embeddings, &config),
                SignalExtractor::new(clients.scoring.clone()),
                strategy,
                QuestionService::new(clients.generation.clone()),
                config,
            ));

            info!("Elicit v{} starting", env!("CARGO_PKG_VERSION"));

            let state = Arc::new(AppState {
                sessions,
                started_at: Instant::now(),
            });
            let bind_addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            start_gateway(state, bind_addr).await?;
        }
    }

    Ok(())
}
