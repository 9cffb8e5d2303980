//! Entry point for moku, an AI development assistant for the terminal.
//!
//! Loads environment variables, configures logging from the settings file,
//! parses CLI arguments via [`cli`], and dispatches to the chosen handler.

mod assist;
mod cli;
mod client;
mod config;
mod constants;
mod diff;
mod dispatch;
mod git;
mod mutate;
mod project;
mod repl;
mod runner;
mod search;
mod session;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Runs the moku CLI.
///
/// Logging verbosity comes from the configured `log_level`, overridable with
/// `MOKU_LOG`. A malformed config file is the one fatal startup condition;
/// the error is reported before the subscriber exists, so plain stderr.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::Settings::load()?;
    let filter = EnvFilter::try_from_env("MOKU_LOG")
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::parse();
    cli::run(cli, settings).await
}
