use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use varta::config::Config;
use varta::harvester::Harvester;

#[derive(Parser)]
#[command(
    name = "varta",
    version,
    about = "News harvester: crawl provider feeds, enrich, dedupe and publish",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides VARTA_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the harvester loop until interrupted
    Run,

    /// Run a single harvesting pass and exit
    Once,

    /// Load and print the configured providers and sinks, then exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let format = cli
        .log_format
        .as_deref()
        .unwrap_or(&config.logging.format);
    setup_tracing(format, &config.logging.level, cli.verbose)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "varta starting");

    match cli.command {
        Commands::Run => run(&config).await?,
        Commands::Once => once(&config).await?,
        Commands::Check => check(&config)?,
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let directives = if verbose {
        "varta=debug,info".to_string()
    } else {
        format!("varta={level},warn")
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directives));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

/// Run the periodic harvesting loop until Ctrl-C
async fn run(config: &Config) -> Result<()> {
    let harvester = Harvester::new(config)?;

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    harvester.run(token).await?;
    tracing::info!("varta stopped");
    Ok(())
}

/// Execute exactly one pass, useful for cron-style scheduling
async fn once(config: &Config) -> Result<()> {
    let harvester = Harvester::new(config)?;
    let token = CancellationToken::new();
    harvester.run_once(&token, harvester.providers()).await;
    harvester.shutdown();
    Ok(())
}

/// Validate the registry files without crawling anything
fn check(config: &Config) -> Result<()> {
    let providers = varta::providers::ProviderRegistry::load(&config.providers_file)?;
    println!("providers ({}):", providers.all().len());
    for provider in providers.all() {
        println!("  {} [{}] {}", provider.id, provider.kind, provider.source_url);
    }

    let sinks = varta::publisher::registry::load_sink_configs(&config.sinks_file)?;
    println!("sinks ({}):", sinks.len());
    for sink in &sinks {
        let state = if sink.is_enabled() { "enabled" } else { "disabled" };
        println!("  {} [{}] {}", sink.id, sink.kind, state);
    }

    Ok(())
}
