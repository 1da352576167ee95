//! nestwork: nested-entity transactions from the command line.
//!
//! Usage:
//!   nestwork --db app.db --schema schema.toml create company company.json
//!   nestwork --db app.db --schema schema.toml unit-of-work invoice 1 invoice.json
//!   nestwork --db app.db --schema schema.toml exec --transaction "DELETE FROM records"

use anyhow::Result;
use clap::Parser;
use nestwork_cli::{run, Cli};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let output = run(&cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
