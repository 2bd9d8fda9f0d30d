use anyhow::Context;
use forum_rag::{
    api::routes::create_router,
    cli::{output::Output, Cli, Commands},
    rag::{ingest::IngestOptions, service::ingestor_from_config},
    utils::toml_config::{ForumRagConfig, LogFormat},
    AppState, RagService,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Config { full, validate }) => {
            show_config(&cli.config, full, validate, &output);
            Ok(())
        }
        Some(Commands::Index {
            corpus,
            limit,
            normalized_out,
        }) => {
            let config = load_config(&cli.config, cli.verbose)?;
            run_index(&config, corpus, limit, normalized_out, &output).await
        }
        Some(Commands::Ask { question, sources }) => {
            let config = load_config(&cli.config, cli.verbose)?;
            let service = RagService::from_config(&config)
                .await
                .context("Failed to initialize the query pipeline")?;
            let response = service.query(&question).await?;
            output.answer(&response, sources);
            Ok(())
        }
        Some(Commands::Serve) | None => {
            let config = load_config(&cli.config, cli.verbose)?;
            serve(config, &output).await
        }
    }
}

fn load_config(path: &Path, verbose: bool) -> anyhow::Result<ForumRagConfig> {
    let config = ForumRagConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    init_tracing(&config, verbose);

    for warning in config.validate_with_warnings()? {
        tracing::warn!(kind = ?warning.kind, "{}", warning);
    }
    Ok(config)
}

fn init_tracing(config: &ForumRagConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "forum_rag={0},forum_vector={0},tower_http={0}",
            level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn run_index(
    config: &ForumRagConfig,
    corpus: PathBuf,
    limit: Option<usize>,
    normalized_out: Option<PathBuf>,
    output: &Output,
) -> anyhow::Result<()> {
    output.banner();
    output.info(&format!("Indexing {}", corpus.display()));

    let ingestor = ingestor_from_config(config)
        .await
        .context("Failed to initialize the ingestion pipeline")?;
    let options = IngestOptions {
        corpus,
        limit,
        normalized_out,
    };
    let report = ingestor.run(config, &options).await?;

    output.success("Index built");
    output.kv("threads", &report.threads.to_string());
    output.kv("chunks", &report.chunks.to_string());
    output.kv("dimensions", &report.dimensions.to_string());
    output.kv("stored", &report.stored.to_string());
    Ok(())
}

async fn serve(config: ForumRagConfig, output: &Output) -> anyhow::Result<()> {
    output.banner();

    let service = RagService::from_config(&config)
        .await
        .context("Failed to initialize the query pipeline")?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState {
        config: Arc::new(config),
        service: Arc::new(service),
    };
    let app = create_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    output.success(&format!("Listening on http://{}", addr));
    output.hint(&format!("OpenAPI description at http://{}/api-docs/openapi.json", addr));
    tracing::info!(%addr, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutting down");
}

fn show_config(path: &Path, full: bool, validate: bool, output: &Output) {
    output.header("Configuration");
    output.kv("file", &path.display().to_string());

    let config = match ForumRagConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(1);
        }
    };

    if validate {
        match config.validate_with_warnings() {
            Ok(warnings) => {
                output.success("Configuration is valid");
                for warning in &warnings {
                    output.warning(&warning.message);
                }
            }
            Err(e) => {
                output.error(&e.to_string());
                std::process::exit(1);
            }
        }
    }

    output.kv("server", &format!("{}:{}", config.server.host, config.server.port));
    output.kv("embedding model", &config.rag.embedding_model_name);
    output.kv("generator", &format!("{} ({})", config.generator.name(), config.generator.model()));
    output.kv(
        "chunking",
        &format!(
            "{} tokens, {} overlap",
            config.rag.chunk_size_tokens, config.rag.chunk_overlap_tokens
        ),
    );
    output.kv(
        "retrieval",
        &format!(
            "k = {}, threshold = {}",
            config.rag.retrieval_k, config.rag.similarity_threshold
        ),
    );

    if full {
        match toml::to_string_pretty(&config) {
            Ok(text) => {
                output.newline();
                println!("{}", text);
            }
            Err(e) => output.error(&format!("Failed to render configuration: {}", e)),
        }
    }
}
