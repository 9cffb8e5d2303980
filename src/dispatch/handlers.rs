//! Command handlers.
//!
//! [`dispatch`] parses a line and routes it to the owning component. Parse
//! errors surface as [`CommandError`]; component failures are rendered into
//! the reply text so a failed command never ends the session.

use std::fs;

use colored::Colorize;
use tracing::warn;

use super::{parse, Command, CommandError, ConfigCmd, GitCmd, Input, ProjectCmd};
use crate::assist;
use crate::mutate::{MutationEngine, MutationOutcome, RefactorKind};
use crate::runner;
use crate::search;
use crate::session::SessionContext;

/// What the REPL should do with a handled line.
#[derive(Debug)]
pub enum Reply {
    Message(String),
    Exit,
}

/// Parses and executes one line of input against the session.
pub async fn dispatch(ctx: &mut SessionContext, line: &str) -> Result<Reply, CommandError> {
    let command = match parse(line)? {
        Input::Chat(text) => {
            if text.is_empty() {
                return Ok(Reply::Message(String::new()));
            }
            let reply = match assist::chat(ctx, &text).await {
                Ok(response) => response,
                Err(e) => error_text("chat", &e),
            };
            return Ok(Reply::Message(reply));
        }
        Input::Command(command) => command,
    };

    let reply = match command {
        Command::Help { topic } => Reply::Message(help_text(topic.as_deref())),
        Command::Context { files } => match ctx.load_context(&files) {
            Ok(message) => Reply::Message(message),
            Err(e) => Reply::Message(error_text("context", &e)),
        },
        Command::Create { file, prompt } => {
            let target = match ctx.resolve(&file) {
                Ok(target) => target,
                Err(e) => return Ok(Reply::Message(error_text("create", &e.into()))),
            };
            let engine = MutationEngine::new(ctx.client.as_ref(), &ctx.settings, &ctx.model);
            match engine.create_file(&target, &prompt, &ctx.context_files).await {
                Ok(outcome) => {
                    let message = render_outcome("Created", &outcome);
                    assist::auto_commit(ctx, &outcome.path, &format!("Create {file}")).await;
                    rescan_active(ctx);
                    Reply::Message(message)
                }
                Err(e) => Reply::Message(error_text("create", &e.into())),
            }
        }
        Command::Edit { file, prompt } => {
            let target = match ctx.resolve(&file) {
                Ok(target) => target,
                Err(e) => return Ok(Reply::Message(error_text("edit", &e.into()))),
            };
            let engine = MutationEngine::new(ctx.client.as_ref(), &ctx.settings, &ctx.model);
            match engine.edit_file(&target, &prompt, &ctx.context_files).await {
                Ok(outcome) => {
                    let message = render_outcome("Edited", &outcome);
                    assist::auto_commit(ctx, &outcome.path, &format!("Edit {file}")).await;
                    rescan_active(ctx);
                    Reply::Message(message)
                }
                Err(e) => Reply::Message(error_text("edit", &e.into())),
            }
        }
        Command::Refactor { file, kind } => {
            let kind = match kind.as_deref() {
                None => RefactorKind::Readability,
                Some(raw) => match raw.parse::<RefactorKind>() {
                    Ok(kind) => kind,
                    Err(e) => return Ok(Reply::Message(error_text("refactor", &e.into()))),
                },
            };
            let target = match ctx.resolve(&file) {
                Ok(target) => target,
                Err(e) => return Ok(Reply::Message(error_text("refactor", &e.into()))),
            };
            let engine = MutationEngine::new(ctx.client.as_ref(), &ctx.settings, &ctx.model);
            match engine.refactor_file(&target, kind, &ctx.context_files).await {
                Ok(outcome) => {
                    let message = render_outcome("Refactored", &outcome);
                    assist::auto_commit(
                        ctx,
                        &outcome.path,
                        &format!("Refactor {file} for {}", kind.as_str()),
                    )
                    .await;
                    rescan_active(ctx);
                    Reply::Message(message)
                }
                Err(e) => Reply::Message(error_text("refactor", &e.into())),
            }
        }
        Command::Explain { file } => match assist::explain(ctx, &file).await {
            Ok(text) => Reply::Message(text),
            Err(e) => Reply::Message(error_text("explain", &e)),
        },
        Command::Analyze { file } => match assist::analyze(ctx, &file).await {
            Ok(text) => Reply::Message(text),
            Err(e) => Reply::Message(error_text("analyze", &e)),
        },
        Command::GenerateTests { file } => {
            let target = match ctx.resolve(&file) {
                Ok(target) => target,
                Err(e) => return Ok(Reply::Message(error_text("generate-tests", &e.into()))),
            };
            let engine = MutationEngine::new(ctx.client.as_ref(), &ctx.settings, &ctx.model);
            match engine.generate_tests(&target, &ctx.context_files).await {
                Ok(outcome) => {
                    let message = render_outcome("Tests written to", &outcome);
                    assist::auto_commit(ctx, &outcome.path, &format!("Add tests for {file}")).await;
                    rescan_active(ctx);
                    Reply::Message(message)
                }
                Err(e) => Reply::Message(error_text("generate-tests", &e.into())),
            }
        }
        Command::Move { src, dst } => Reply::Message(move_file(ctx, &src, &dst)),
        Command::Test { file } => {
            let target = match ctx.resolve(&file) {
                Ok(target) => target,
                Err(e) => return Ok(Reply::Message(error_text("test", &e.into()))),
            };
            let report = runner::run_tests(&ctx.settings.test_command, &target).await;
            Reply::Message(report.output)
        }
        Command::Debug { code, test } => match assist::debug_and_fix(ctx, &code, &test).await {
            Ok(report) => Reply::Message(report),
            Err(e) => Reply::Message(error_text("debug", &e)),
        },
        Command::Auto { prompt } => match assist::auto_develop(ctx, &prompt).await {
            Ok(report) => Reply::Message(report),
            Err(e) => Reply::Message(error_text("auto", &e)),
        },
        Command::Search { query, pattern } => {
            let root = match ctx.registry.active() {
                Some(project) => project.directory.clone(),
                None => std::env::current_dir().unwrap_or_else(|_| ".".into()),
            };
            let matches = search::search_files(&root, &query, pattern.as_deref());
            Reply::Message(search::render_matches(&query, &matches))
        }
        Command::Project(sub) => Reply::Message(handle_project(ctx, sub)),
        Command::Git(sub) => Reply::Message(handle_git(ctx, sub).await),
        Command::Model { name } => match name {
            None => Reply::Message(format!("Current model: {}", ctx.model)),
            Some(name) => {
                ctx.model = name.clone();
                Reply::Message(format!("Model set to {name}"))
            }
        },
        Command::Config(sub) => Reply::Message(handle_config(ctx, sub)),
        Command::Clear => {
            ctx.clear_context();
            Reply::Message("Context and history cleared.".to_string())
        }
        Command::Exit => Reply::Exit,
    };
    Ok(reply)
}

fn error_text(command: &str, error: &anyhow::Error) -> String {
    format!("{} {error:#}", format!("{command}:").red().bold())
}

fn render_outcome(verb: &str, outcome: &MutationOutcome) -> String {
    let mut message = format!("{verb} {}", outcome.path.display());
    if let Some(backup) = &outcome.backup {
        message.push_str(&format!("\nBackup: {}", backup.display()));
    }
    if let Some(diff) = &outcome.diff {
        if !diff.is_empty() {
            message.push_str(&format!("\n\n{diff}"));
        }
    }
    let commentary = commentary_only(&outcome.commentary);
    if !commentary.is_empty() {
        message.push_str(&format!("\n\n{commentary}"));
    }
    message
}

/// The model's prose before the first code fence, if any.
fn commentary_only(response: &str) -> &str {
    match response.find("```") {
        Some(idx) => response[..idx].trim(),
        None => "",
    }
}

fn move_file(ctx: &mut SessionContext, src: &str, dst: &str) -> String {
    let (from, to) = match (ctx.resolve(src), ctx.resolve(dst)) {
        (Ok(from), Ok(to)) => (from, to),
        (Err(e), _) | (_, Err(e)) => return e.to_string(),
    };
    if !from.exists() {
        return format!("{src} does not exist");
    }
    if to.exists() {
        return format!("{dst} already exists");
    }
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                return format!("Failed to move {src}: {e}");
            }
        }
    }
    match fs::rename(&from, &to) {
        Ok(()) => {
            rescan_active(ctx);
            format!("Moved {src} to {dst}")
        }
        Err(e) => format!("Failed to move {src}: {e}"),
    }
}

fn handle_project(ctx: &mut SessionContext, sub: ProjectCmd) -> String {
    match sub {
        ProjectCmd::Create { name, description } => {
            match ctx.registry.create(&name, &description) {
                Ok(project) => format!(
                    "Project '{}' created in {}",
                    project.name,
                    project.directory.display()
                ),
                Err(e) => e.to_string(),
            }
        }
        ProjectCmd::List => {
            let projects = ctx.registry.list();
            if projects.is_empty() {
                return "No projects yet. Use :project create <name>.".to_string();
            }
            projects
                .iter()
                .map(|p| {
                    let marker = if p.active { "*" } else { " " };
                    format!("{marker} {}  {}", p.name, p.directory.display())
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        ProjectCmd::Info { name } => match ctx.registry.info(&name) {
            Ok(project) => {
                let total: u64 = project.files.values().map(|f| f.size).sum();
                let mut out = format!(
                    "Project: {}\nDirectory: {}\nCreated: {}\nFiles: {} ({} bytes)",
                    project.name,
                    project.directory.display(),
                    project.created_at.format("%Y-%m-%d %H:%M:%S"),
                    project.files.len(),
                    total
                );
                if let Some(touched) = project.files.values().filter_map(|f| f.modified).max() {
                    out.push_str(&format!(
                        "\nLast file change: {}",
                        touched.format("%Y-%m-%d %H:%M:%S")
                    ));
                }
                let mut by_ext: std::collections::BTreeMap<&str, usize> =
                    std::collections::BTreeMap::new();
                for info in project.files.values() {
                    if !info.extension.is_empty() {
                        *by_ext.entry(info.extension.as_str()).or_default() += 1;
                    }
                }
                if !by_ext.is_empty() {
                    let parts: Vec<String> = by_ext
                        .iter()
                        .map(|(ext, count)| format!("{count} .{ext}"))
                        .collect();
                    out.push_str(&format!("\nBy type: {}", parts.join(", ")));
                }
                if !project.description.is_empty() {
                    out.push_str(&format!("\nDescription: {}", project.description));
                }
                if !project.tags.is_empty() {
                    out.push_str(&format!("\nTags: {}", project.tags.join(", ")));
                }
                out
            }
            Err(e) => e.to_string(),
        },
        ProjectCmd::Set { name } => match ctx.registry.set_active(&name) {
            Ok(()) => format!("Active project: {name}"),
            Err(e) => e.to_string(),
        },
        ProjectCmd::Rename { old, new } => match ctx.registry.rename(&old, &new) {
            Ok(()) => format!("Renamed '{old}' to '{new}'"),
            Err(e) => e.to_string(),
        },
        ProjectCmd::Remove { name, delete_files } => {
            match ctx.registry.remove(&name, delete_files) {
                Ok(dir) => {
                    if delete_files {
                        format!("Removed project '{name}' and deleted {}", dir.display())
                    } else {
                        format!(
                            "Removed project '{name}'. Files left in {}",
                            dir.display()
                        )
                    }
                }
                Err(e) => e.to_string(),
            }
        }
    }
}

async fn handle_git(ctx: &mut SessionContext, sub: GitCmd) -> String {
    let dir = match ctx.registry.active() {
        Some(project) => project.directory.clone(),
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => return format!("git: {e}"),
        },
    };
    match sub {
        GitCmd::Init => ctx.git.init(&dir).await,
        GitCmd::Add { paths } => ctx.git.add(&dir, &paths).await,
        GitCmd::Commit { message } => ctx.git.commit(&dir, &message).await,
        GitCmd::Status => ctx.git.status(&dir).await,
    }
}

fn handle_config(ctx: &mut SessionContext, sub: ConfigCmd) -> String {
    match sub {
        ConfigCmd::Show => match toml::to_string_pretty(&ctx.settings) {
            Ok(rendered) => rendered,
            Err(e) => format!("config: {e}"),
        },
        ConfigCmd::Get { key } => match ctx.settings.get(&key) {
            Ok(value) => format!("{key} = {value}"),
            Err(e) => e.to_string(),
        },
        ConfigCmd::Set { key, value } => match ctx.settings.with_value(&key, &value) {
            Ok(updated) => {
                if let Err(e) = updated.save() {
                    return format!("config: {e}");
                }
                ctx.settings = updated;
                format!("{key} set to {value}")
            }
            Err(e) => e.to_string(),
        },
    }
}

/// Refreshes the active project's file listing after a mutation.
fn rescan_active(ctx: &mut SessionContext) {
    let Some(name) = ctx.registry.active().map(|p| p.name.clone()) else {
        return;
    };
    if let Some(project) = ctx.registry.get_mut(&name) {
        if let Err(e) = project.scan_files().and_then(|_| project.save()) {
            warn!(project = name, error = %e, "project rescan failed");
        }
    }
}

fn help_text(topic: Option<&str>) -> String {
    if let Some(topic) = topic {
        let usage = match topic.trim_start_matches(':') {
            "help" => ":help [command] - show help",
            "context" => ":context <file> [file ...] - attach files to model requests",
            "create" => ":create <file> <prompt> - generate a new file",
            "edit" => ":edit <file> <prompt> - rewrite an existing file",
            "refactor" => ":refactor <file> [performance|readability|structure]",
            "explain" => ":explain <file> - explain a file's code",
            "analyze" => ":analyze <file> - review a file for quality issues",
            "generate-tests" => ":generate-tests <file> - write a test file for a file",
            "move" => ":move <src> <dst> - move or rename a file",
            "test" => ":test <file> - run the configured test command on a file",
            "debug" => ":debug <code-file> <test-file> - fix code until its tests pass",
            "auto" => ":auto <prompt> - build a whole project from a prompt",
            "search" => ":search <query> [glob] - search project files",
            "project" => ":project create <name> [description] | list | info <name> | set <name> | rename <old> <new> | remove <name> [--delete-files]",
            "git" => ":git init | add [paths...] | commit <message> | status",
            "model" => ":model [name] - show or switch the model",
            "config" => ":config show | get <key> | set <key> <value>",
            "clear" => ":clear - drop context files and history",
            "exit" => ":exit - leave",
            other => return format!("No help for '{other}'."),
        };
        return usage.to_string();
    }
    let lines = [
        ("Conversation", ""),
        ("  <text>", "chat with the model"),
        ("  :context <files...>", "attach files to requests"),
        ("  :clear", "drop context and history"),
        ("Files", ""),
        ("  :create <file> <prompt>", "generate a new file"),
        ("  :edit <file> <prompt>", "rewrite an existing file"),
        ("  :refactor <file> [kind]", "refactor (performance, readability, structure)"),
        ("  :explain <file>", "explain a file"),
        ("  :analyze <file>", "code quality review"),
        ("  :generate-tests <file>", "write tests for a file"),
        ("  :move <src> <dst>", "move or rename a file"),
        ("Testing", ""),
        ("  :test <file>", "run tests"),
        ("  :debug <code> <test>", "fix code until tests pass"),
        ("Projects", ""),
        ("  :auto <prompt>", "build a project from a prompt"),
        ("  :project ...", "create, list, info, set, rename, remove"),
        ("  :search <query> [glob]", "search project files"),
        ("  :git ...", "init, add, commit, status"),
        ("Session", ""),
        ("  :model [name]", "show or switch model"),
        ("  :config ...", "show, get, set"),
        ("  :help [command]", "this help"),
        ("  :exit", "leave"),
    ];
    lines
        .iter()
        .map(|(cmd, desc)| {
            if desc.is_empty() {
                cmd.bold().to_string()
            } else {
                format!("{}  {}", cmd.cyan(), desc)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, Generate, ModelRequest};
    use crate::config::Settings;
    use crate::git::GitAdapter;
    use crate::project::ProjectRegistry;
    use std::path::PathBuf;

    struct StubClient {
        reply: String,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Generate for StubClient {
        async fn generate(&self, _request: &ModelRequest) -> Result<String, ClientError> {
            if self.fail {
                Err(ClientError::Unreachable("connection refused".to_string()))
            } else {
                Ok(self.reply.clone())
            }
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("moku_dispatch_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn session(base: &PathBuf, reply: &str) -> SessionContext {
        let registry = ProjectRegistry::new(base.clone()).unwrap();
        let client = StubClient {
            reply: reply.to_string(),
            fail: false,
        };
        SessionContext::new(
            Settings::default(),
            registry,
            Box::new(client),
            GitAdapter::new(),
        )
    }

    async fn message(ctx: &mut SessionContext, line: &str) -> String {
        match dispatch(ctx, line).await.unwrap() {
            Reply::Message(text) => text,
            Reply::Exit => panic!("unexpected exit"),
        }
    }

    #[tokio::test]
    async fn create_writes_stub_reply() {
        let dir = temp_dir("create");
        let mut ctx = session(&dir, "hello");
        let target = dir.join("a.txt");

        let reply = message(&mut ctx, &format!(":create {} say hello", target.display())).await;
        assert!(reply.contains("Created"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        assert!(!dir.join("backups").exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn edit_reports_backup() {
        let dir = temp_dir("edit");
        let target = dir.join("a.txt");
        fs::write(&target, "hello").unwrap();
        let mut ctx = session(&dir, "goodbye");

        let reply = message(&mut ctx, &format!(":edit {} say goodbye", target.display())).await;
        assert_eq!(fs::read_to_string(&target).unwrap(), "goodbye");
        assert!(reply.contains("Backup:"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn edit_missing_file_reports_and_writes_nothing() {
        let dir = temp_dir("edit_missing");
        let target = dir.join("missing.txt");
        let mut ctx = session(&dir, "anything");

        let reply = message(&mut ctx, &format!(":edit {} x", target.display())).await;
        assert!(reply.contains("does not exist"));
        assert!(!target.exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn chat_line_touches_no_files() {
        let dir = temp_dir("chat");
        let mut ctx = session(&dir, "you could use a BTreeMap");

        let reply = message(&mut ctx, "what map should I use?").await;
        assert_eq!(reply, "you could use a BTreeMap");
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let dir = temp_dir("unknown");
        let mut ctx = session(&dir, "");
        let err = dispatch(&mut ctx, ":frobnicate").await.unwrap_err();
        assert!(matches!(err, CommandError::Unknown(_)));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn refactor_rejects_unknown_kind() {
        let dir = temp_dir("refactor_kind");
        let target = dir.join("a.py");
        fs::write(&target, "x = 1").unwrap();
        let mut ctx = session(&dir, "pass");

        let reply = message(
            &mut ctx,
            &format!(":refactor {} patterns", target.display()),
        )
        .await;
        assert!(reply.contains("invalid refactor kind"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "x = 1");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn project_lifecycle_round_trips() {
        let dir = temp_dir("project");
        let mut ctx = session(&dir, "");

        let created = message(&mut ctx, ":project create calc a calculator").await;
        assert!(created.contains("calc"));

        let dup = message(&mut ctx, ":project create calc again").await;
        assert!(dup.contains("already exists"));

        let info = message(&mut ctx, ":project info calc").await;
        assert!(info.contains("Project: calc"));
        assert!(info.contains("Description: a calculator"));

        let set = message(&mut ctx, ":project set calc").await;
        assert!(set.contains("Active project: calc"));

        let listed = message(&mut ctx, ":project list").await;
        assert!(listed.contains("* calc"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn create_resolves_into_active_project() {
        let dir = temp_dir("resolve");
        let mut ctx = session(&dir, "content");
        message(&mut ctx, ":project create app x").await;
        message(&mut ctx, ":project set app").await;

        message(&mut ctx, ":create main.py entry point").await;
        let project_dir = ctx.registry.get("app").unwrap().directory.clone();
        assert!(project_dir.join("main.py").exists());
        // The file listing picked up the new file.
        assert!(ctx.registry.get("app").unwrap().files.contains_key("main.py"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn move_renames_within_project() {
        let dir = temp_dir("move");
        let src = dir.join("a.txt");
        fs::write(&src, "content").unwrap();
        let mut ctx = session(&dir, "");

        let reply = message(
            &mut ctx,
            &format!(":move {} {}", src.display(), dir.join("b.txt").display()),
        )
        .await;
        assert!(reply.contains("Moved"));
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dir.join("b.txt")).unwrap(), "content");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn model_command_switches_session_model() {
        let dir = temp_dir("model");
        let mut ctx = session(&dir, "");
        let shown = message(&mut ctx, ":model").await;
        assert!(shown.contains(&ctx.settings.default_model));

        message(&mut ctx, ":model llama3").await;
        assert_eq!(ctx.model, "llama3");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn config_get_reads_settings() {
        let dir = temp_dir("config");
        let mut ctx = session(&dir, "");
        let reply = message(&mut ctx, ":config get backup_files").await;
        assert!(reply.contains("backup_files = true"));

        let unknown = message(&mut ctx, ":config get no_such_key").await;
        assert!(unknown.contains("unknown config key"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn clear_drops_context_and_history() {
        let dir = temp_dir("clear");
        let mut ctx = session(&dir, "ok");
        message(&mut ctx, "remember this").await;
        assert_eq!(ctx.history_len(), 1);

        message(&mut ctx, ":clear").await;
        assert_eq!(ctx.history_len(), 0);
        assert!(ctx.context_files.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn exit_returns_exit() {
        let dir = temp_dir("exit");
        let mut ctx = session(&dir, "");
        assert!(matches!(
            dispatch(&mut ctx, ":exit").await.unwrap(),
            Reply::Exit
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
