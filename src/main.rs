use anyhow::Result;
use clap::Parser;
use deep_research_rs::{cli, launch};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let query = args.query.clone();
    let json_events = args.json_events;
    let mut config = args.into_config()?;

    setup_logging(config.verbose);

    let topic = match query {
        Some(topic) if !topic.trim().is_empty() => topic,
        _ => cli::prompt_research(&mut config)?,
    };

    launch(&config, &topic, json_events).await
}

/// `RUST_LOG`优先，否则按verbose选择日志级别；日志输出到stderr
fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("deep_research_rs=debug,warn")
        } else {
            EnvFilter::new("deep_research_rs=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
