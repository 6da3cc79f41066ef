//! Segtrans command line entry point.

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use segtrans::cli::{Args, Commands};
use segtrans::config::Config;
use segtrans::service::TranslationService;
use segtrans::subtitle::{generate_srt, load_segments, save_segments};
use segtrans::translate::SUPPORTED_LANGUAGES;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    if let Some(endpoint) = args.endpoint {
        config.translate.endpoint = endpoint;
        config.validate()?;
    }

    match args.command {
        Commands::Languages => {
            println!("{:<6} {:<20}", "Code", "Language");
            println!("{}", "-".repeat(26));
            for (code, name) in SUPPORTED_LANGUAGES {
                println!("{:<6} {:<20}", code, name);
            }
        }
        Commands::Status => {
            let service = TranslationService::connect(config).await?;
            println!("{}", serde_json::to_string_pretty(&service.metrics())?);
        }
        Commands::Text { text, source, target } => {
            let service = TranslationService::connect(config).await?;
            let translated = service.translate(&text, &source, &target).await?;
            println!("{}", translated);
        }
        Commands::Translate { input, output, source, target } => {
            info!("Translating segments: {}", input.display());
            let service = TranslationService::connect(config).await?;

            let segments = load_segments(&input).await?;
            let translated = service.translate_segments(&segments, &source, &target).await?;

            let is_srt = output
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"));
            if is_srt {
                generate_srt(&translated, &output).await?;
            } else {
                save_segments(&translated, &output).await?;
            }

            let metrics = service.metrics();
            info!(
                "Done: {} segments, {} unique, {} cache hits, circuit {}",
                metrics.total_segments, metrics.unique_segments, metrics.cache_hits, metrics.circuit_state
            );
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".segtrans").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "segtrans.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Flushes on drop, so it has to outlive main
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("segtrans.log").display()
    );

    Ok(())
}
