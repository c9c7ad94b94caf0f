use anyhow::Result;
use gpt_ftl::config::DEFAULT_CONFIG_FILE;
use gpt_ftl::progress::format_list;
use gpt_ftl::{Config, Error, OpenAiClient, Orchestrator, ProgressReporter};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout belongs to the progress reporter
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gpt_ftl=info".parse()?),
        )
        .init();

    let reporter = Arc::new(ProgressReporter::stdout());
    reporter.start("Welcome to GPT FTL!");

    reporter.start("Loading configuration...");
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            reporter.error(format!(
                "{}. Please fill in {}.",
                e, DEFAULT_CONFIG_FILE
            ));
            return Ok(());
        }
    };
    reporter.done(format!(
        "Configuration loaded:\n{}",
        format_list([
            format!("Base language: {}", config.base_lang),
            format!("Model: {}", config.model),
            format!("FTL Root Path: {}", config.ftl_root_path.display()),
            format!(
                "Max concurrency: {}",
                config
                    .max_concurrency
                    .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
            ),
        ])
    ));

    let service = OpenAiClient::new(&config)?;
    let orchestrator = Orchestrator::new(Arc::new(config), Arc::new(service), Arc::clone(&reporter));

    let summary = match orchestrator.run().await {
        Ok(summary) => summary,
        Err(Error::Config(e)) => {
            reporter.error(format!("{}. Please fill in {}.", e, DEFAULT_CONFIG_FILE));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for failure in &summary.failures {
        reporter.error(format!(
            "{} ({}): {}",
            failure.file, failure.language, failure.error
        ));
    }

    let message = format!(
        "{} succeeded, {} failed",
        summary.success_count(),
        summary.failure_count()
    );
    if summary.is_success() {
        reporter.done(message);
    } else {
        reporter.error(message);
    }

    info!("Done");
    Ok(())
}
