use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

mod cli;

use cli::Cli;
use lodes_fetch::{Config, Pipeline};

const RUN_DIR_PREFIX: &str = "LODES_Download_";

#[tokio::main]
async fn main() -> Result<()> {
    // Set default log level to INFO if not specified
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "lodes_fetch=info");
    }

    let cli = Cli::parse();
    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string();

    // Initialize logging to both console and the per-run log file
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

    let file_appender = tracing_appender::rolling::never(".", format!("log_{}.log", timestamp));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env())
        )
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env())
        )
        .init();

    match run(cli, &timestamp).await {
        Ok(root) => {
            info!("The downloaded CSV files are now available in the directory {}", root);
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {:?}", e);
            Err(e)
        }
    }
}

async fn run(cli: Cli, timestamp: &str) -> Result<String> {
    let config = cli.apply(Config::from_env().context("Failed to load configuration")?);
    let root = config.output_dir.join(format!("{}{}", RUN_DIR_PREFIX, timestamp));

    info!("Starting LODES download into {}", root.display());

    let pipeline = Pipeline::new(config).context("Failed to set up pipeline")?;
    let report = pipeline
        .run(&root)
        .await
        .with_context(|| format!("Download run into {} failed", root.display()))?;

    for (link, reason) in report.skipped() {
        info!(link = %link, reason = %reason, "Skipped unroutable file");
    }
    info!(
        "Resolved {} links for {} tasks; {} files materialized",
        report.links,
        report.tasks,
        report.materialized().count()
    );

    Ok(report.root.display().to_string())
}
