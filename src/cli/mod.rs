//! Command-line interface definition and dispatch for moku.
//!
//! Uses [`clap`] with derive macros. Running `moku` with no subcommand enters
//! the interactive REPL; the subcommands are one-shot conveniences over the
//! same components.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::client::HttpModelClient;
use crate::config::Settings;
use crate::git::GitAdapter;
use crate::project::ProjectRegistry;
use crate::session::SessionContext;
use crate::{assist, repl};

/// Top-level CLI structure for moku.
#[derive(Parser)]
#[command(name = "moku", about = "An AI development assistant for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands. Without one, moku starts the REPL.
#[derive(Subcommand)]
pub enum Commands {
    /// Ask a one-shot question
    Ask {
        /// The question to ask
        prompt: Vec<String>,
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// List known projects
    Projects,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Subcommands for the `config` command.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current config
    Show,
    /// Read a single config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
}

/// Parses command-line arguments into a [`Cli`] struct.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Builds the session the REPL and one-shot commands run against.
fn build_session(settings: Settings, model: Option<String>) -> Result<SessionContext> {
    let base = working_dir(&settings);
    let mut registry =
        ProjectRegistry::new(base).context("failed to open the projects directory")?;
    registry.scan().context("failed to scan projects")?;

    let model = model.unwrap_or_else(|| settings.default_model.clone());
    let client = HttpModelClient::from_settings(&settings, &model);
    let mut ctx = SessionContext::new(settings, registry, Box::new(client), GitAdapter::new());
    ctx.model = model;
    Ok(ctx)
}

/// The projects root: the configured `working_dir`, resolved against the
/// current directory when relative.
fn working_dir(settings: &Settings) -> PathBuf {
    let configured = PathBuf::from(&settings.working_dir);
    if configured.is_absolute() {
        configured
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&configured))
            .unwrap_or(configured)
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// The settings snapshot comes from `main`, which already read the config
/// file to set up logging; it is not read again here.
pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        None => {
            let ctx = build_session(settings, None)?;
            repl::run(ctx).await
        }
        Some(Commands::Ask { prompt, model }) => {
            let prompt = prompt.join(" ");
            if prompt.is_empty() {
                anyhow::bail!("No prompt provided. Usage: moku ask \"your question here\"");
            }
            let mut ctx = build_session(settings, model)?;
            println!("{} [model: {}]", "moku".bold().cyan(), ctx.model.yellow());
            println!();
            let response = assist::chat(&mut ctx, &prompt).await?;
            println!("{response}");
            Ok(())
        }
        Some(Commands::Projects) => {
            let ctx = build_session(settings, None)?;
            let projects = ctx.registry.list();
            if projects.is_empty() {
                println!("No projects yet.");
            } else {
                for project in projects {
                    println!("{}  {}", project.name, project.directory.display());
                }
            }
            Ok(())
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => {
                let path = Settings::config_path()?;
                println!("{} {}", "Config path:".bold(), path.display());
                println!();
                println!("{}", toml::to_string_pretty(&settings)?);
                Ok(())
            }
            ConfigAction::Get { key } => {
                let value = settings.get(&key)?;
                println!("{key} = {value}");
                Ok(())
            }
            ConfigAction::Set { key, value } => {
                let updated = settings.with_value(&key, &value)?;
                updated.save()?;
                println!("{key} set to {value}");
                Ok(())
            }
        },
    }
}
