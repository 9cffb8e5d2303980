//! Interactive REPL.
//!
//! A rustyline loop with persistent history. Each line goes through the
//! dispatcher; command errors print and the loop continues. Ctrl+C cancels
//! the current input, Ctrl+D exits.

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config::Settings;
use crate::constants::HISTORY_FILENAME;
use crate::dispatch::{self, Reply};
use crate::session::SessionContext;

pub async fn run(mut ctx: SessionContext) -> Result<()> {
    println!(
        "{} [model: {}] (:help for commands, Ctrl+D to exit)",
        "moku".bold().cyan(),
        ctx.model.yellow(),
    );
    if let Some(project) = ctx.registry.active() {
        println!("active project: {}", project.name.yellow());
    }
    if ctx.settings.git_integration && !ctx.git.is_available() {
        println!("{}", "git integration is on but git was not found".yellow());
    }
    println!();

    let mut rl = DefaultEditor::new()?;
    let history_path = Settings::cache_dir()?.join(HISTORY_FILENAME);
    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    loop {
        let readline = rl.readline(&format!("{} ", ">".green().bold()));
        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                match dispatch::dispatch(&mut ctx, &line).await {
                    Ok(Reply::Message(text)) => {
                        if !text.is_empty() {
                            println!("{text}");
                            println!();
                        }
                    }
                    Ok(Reply::Exit) => break,
                    Err(e) => {
                        println!("{} {e}", "?".yellow());
                        println!();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C clears the line and stays in the loop.
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("{}", "goodbye.".dimmed());
    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&history_path);
    Ok(())
}
