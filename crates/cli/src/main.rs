mod config_commands;
mod resolve_commands;

use std::path::PathBuf;

use {
    aggregator_common::{MediaId, PostId},
    aggregator_config::AggregatorConfig,
    clap::{Parser, Subcommand},
    config_commands::ConfigAction,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "aggregator", about = "Aggregator: feed image import and deduplication")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, global = true, env = "AGGREGATOR_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import images into the media library, reusing earlier imports.
    Resolve {
        /// Remote image URLs or `data:image/...;base64,` URIs.
        #[arg(required = true)]
        sources: Vec<String>,
        /// Post the new attachments belong to.
        #[arg(long)]
        post_id: Option<PostId>,
    },
    /// Print the public URL of an attachment.
    Url { id: MediaId },
    /// Print the featured image of a post.
    Thumbnail { post_id: PostId },
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AggregatorConfig> {
    match cli.config {
        Some(ref path) => {
            let mut config = aggregator_config::load_config(path)?;
            aggregator_config::apply_env_overrides(&mut config);
            Ok(config)
        },
        None => Ok(aggregator_config::discover_and_load()),
    }
}

fn init_metrics(config: &AggregatorConfig) -> Option<aggregator_metrics::MetricsHandle> {
    let recorder = aggregator_metrics::MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: config.metrics.global_labels.clone(),
    };
    match aggregator_metrics::init_metrics(recorder) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "failed to install metrics recorder");
            None
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "aggregator starting");

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Resolve { sources, post_id } => {
            let metrics = init_metrics(&config);
            let outcome = resolve_commands::resolve(&config, &sources, post_id).await;
            if let Some(handle) = metrics {
                let rendered = handle.render();
                if !rendered.is_empty() {
                    eprintln!("{rendered}");
                }
            }
            outcome
        },
        Commands::Url { id } => resolve_commands::url(&config, id).await,
        Commands::Thumbnail { post_id } => resolve_commands::thumbnail(&config, post_id).await,
        Commands::Config { action } => config_commands::handle_config(action, &config),
    }
}
