//! Command parsing and routing.
//!
//! A REPL line is either plain chat or a `:`-prefixed command. Commands parse
//! into a tagged [`Command`] value up front, so dispatch is an exhaustive
//! match and unknown tokens or bad arity are rejected before any component
//! runs. The dispatcher itself routes and validates only; state lives in the
//! [`SessionContext`](crate::session::SessionContext) it is handed.

mod handlers;

pub use handlers::{dispatch, Reply};

use thiserror::Error;

/// Errors from parsing a command line.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The `:` token names no known command.
    #[error("unknown command :{name}\navailable commands: {list}", name = .0, list = COMMAND_LIST)]
    Unknown(String),
    /// Wrong number of arguments for a known command.
    #[error("usage: {0}")]
    Arity(&'static str),
}

const COMMAND_LIST: &str = "help, context, create, edit, refactor, explain, analyze, \
     generate-tests, move, test, debug, auto, search, project, git, model, config, clear, exit";

/// One parsed REPL line.
#[derive(Debug)]
pub enum Input {
    /// Unprefixed text, forwarded to the model as conversation.
    Chat(String),
    Command(Command),
}

/// Project subcommands for `:project`.
#[derive(Debug)]
pub enum ProjectCmd {
    Create { name: String, description: String },
    List,
    Info { name: String },
    Set { name: String },
    Rename { old: String, new: String },
    Remove { name: String, delete_files: bool },
}

/// Git subcommands for `:git`.
#[derive(Debug)]
pub enum GitCmd {
    Init,
    Add { paths: Vec<String> },
    Commit { message: String },
    Status,
}

/// Config subcommands for `:config`.
#[derive(Debug)]
pub enum ConfigCmd {
    Show,
    Get { key: String },
    Set { key: String, value: String },
}

/// Every recognized command, fully parsed.
#[derive(Debug)]
pub enum Command {
    Help { topic: Option<String> },
    Context { files: Vec<String> },
    Create { file: String, prompt: String },
    Edit { file: String, prompt: String },
    Refactor { file: String, kind: Option<String> },
    Explain { file: String },
    Analyze { file: String },
    GenerateTests { file: String },
    Move { src: String, dst: String },
    Test { file: String },
    Debug { code: String, test: String },
    Auto { prompt: String },
    Search { query: String, pattern: Option<String> },
    Project(ProjectCmd),
    Git(GitCmd),
    Model { name: Option<String> },
    Config(ConfigCmd),
    Clear,
    Exit,
}

/// Parses one line of REPL input.
pub fn parse(line: &str) -> Result<Input, CommandError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Input::Chat(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("");
    let args: Vec<&str> = words.collect();

    let command = match name {
        "help" => Command::Help {
            topic: args.first().map(|s| s.to_string()),
        },
        "context" => {
            if args.is_empty() {
                return Err(CommandError::Arity(":context <file> [file ...]"));
            }
            Command::Context {
                files: args.iter().map(|s| s.to_string()).collect(),
            }
        }
        "create" => {
            let (file, prompt) = file_and_rest(rest, ":create <file> <prompt>")?;
            Command::Create { file, prompt }
        }
        "edit" => {
            let (file, prompt) = file_and_rest(rest, ":edit <file> <prompt>")?;
            Command::Edit { file, prompt }
        }
        "refactor" => match args.as_slice() {
            [file] => Command::Refactor {
                file: file.to_string(),
                kind: None,
            },
            [file, kind] => Command::Refactor {
                file: file.to_string(),
                kind: Some(kind.to_string()),
            },
            _ => return Err(CommandError::Arity(":refactor <file> [performance|readability|structure]")),
        },
        "explain" => Command::Explain {
            file: single(&args, ":explain <file>")?,
        },
        "analyze" => Command::Analyze {
            file: single(&args, ":analyze <file>")?,
        },
        "generate-tests" => Command::GenerateTests {
            file: single(&args, ":generate-tests <file>")?,
        },
        "move" => match args.as_slice() {
            [src, dst] => Command::Move {
                src: src.to_string(),
                dst: dst.to_string(),
            },
            _ => return Err(CommandError::Arity(":move <src> <dst>")),
        },
        "test" => Command::Test {
            file: single(&args, ":test <file>")?,
        },
        "debug" => match args.as_slice() {
            [code, test] => Command::Debug {
                code: code.to_string(),
                test: test.to_string(),
            },
            _ => return Err(CommandError::Arity(":debug <code-file> <test-file>")),
        },
        "auto" => {
            let prompt = rest_after(rest, "auto");
            if prompt.is_empty() {
                return Err(CommandError::Arity(":auto <prompt>"));
            }
            Command::Auto { prompt }
        }
        "search" => match args.as_slice() {
            [query] => Command::Search {
                query: query.to_string(),
                pattern: None,
            },
            [query, pattern] => Command::Search {
                query: query.to_string(),
                pattern: Some(pattern.to_string()),
            },
            _ => return Err(CommandError::Arity(":search <query> [glob]")),
        },
        "project" => Command::Project(parse_project(rest, &args)?),
        "git" => Command::Git(parse_git(rest, &args)?),
        "model" => Command::Model {
            name: args.first().map(|s| s.to_string()),
        },
        "config" => Command::Config(parse_config(&args)?),
        "clear" => Command::Clear,
        "exit" | "quit" => Command::Exit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Input::Command(command))
}

/// Splits off the first whitespace-delimited token, returning it and the
/// trimmed remainder.
fn split_first(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

/// Splits `rest` ("cmd file prompt words...") into the file and the
/// remaining text, requiring both. The prompt keeps its internal spacing.
fn file_and_rest(rest: &str, usage: &'static str) -> Result<(String, String), CommandError> {
    let (_cmd, tail) = split_first(rest);
    let (file, prompt) = split_first(tail);
    let prompt = prompt.trim_end();
    if file.is_empty() || prompt.is_empty() {
        return Err(CommandError::Arity(usage));
    }
    Ok((file.to_string(), prompt.to_string()))
}

/// The text after the command token, preserving internal spacing.
fn rest_after(rest: &str, cmd: &str) -> String {
    rest.trim_start()
        .strip_prefix(cmd)
        .unwrap_or("")
        .trim()
        .to_string()
}

fn single(args: &[&str], usage: &'static str) -> Result<String, CommandError> {
    match args {
        [one] => Ok(one.to_string()),
        _ => Err(CommandError::Arity(usage)),
    }
}

fn parse_project(rest: &str, args: &[&str]) -> Result<ProjectCmd, CommandError> {
    match args {
        ["list"] => Ok(ProjectCmd::List),
        ["info", name] => Ok(ProjectCmd::Info {
            name: name.to_string(),
        }),
        ["set", name] => Ok(ProjectCmd::Set {
            name: name.to_string(),
        }),
        ["rename", old, new] => Ok(ProjectCmd::Rename {
            old: old.to_string(),
            new: new.to_string(),
        }),
        ["remove", name] => Ok(ProjectCmd::Remove {
            name: name.to_string(),
            delete_files: false,
        }),
        ["remove", name, "--delete-files"] => Ok(ProjectCmd::Remove {
            name: name.to_string(),
            delete_files: true,
        }),
        ["create", name, ..] => {
            // Everything after the name is the description.
            let (_cmd, tail) = split_first(rest);
            let (_sub, tail) = split_first(tail);
            let (_name, description) = split_first(tail);
            Ok(ProjectCmd::Create {
                name: name.to_string(),
                description: description.trim_end().to_string(),
            })
        }
        _ => Err(CommandError::Arity(
            ":project create <name> [description] | list | info <name> | set <name> | rename <old> <new> | remove <name> [--delete-files]",
        )),
    }
}

fn parse_git(rest: &str, args: &[&str]) -> Result<GitCmd, CommandError> {
    match args {
        ["init"] => Ok(GitCmd::Init),
        ["status"] => Ok(GitCmd::Status),
        ["add", paths @ ..] => Ok(GitCmd::Add {
            paths: paths.iter().map(|s| s.to_string()).collect(),
        }),
        ["commit", _, ..] => {
            let (_cmd, tail) = split_first(rest);
            let (_sub, message) = split_first(tail);
            Ok(GitCmd::Commit {
                message: message.trim_end().to_string(),
            })
        }
        _ => Err(CommandError::Arity(
            ":git init | add [paths...] | commit <message> | status",
        )),
    }
}

fn parse_config(args: &[&str]) -> Result<ConfigCmd, CommandError> {
    match args {
        [] | ["show"] => Ok(ConfigCmd::Show),
        ["get", key] => Ok(ConfigCmd::Get {
            key: key.to_string(),
        }),
        ["set", key, value] => Ok(ConfigCmd::Set {
            key: key.to_string(),
            value: value.to_string(),
        }),
        _ => Err(CommandError::Arity(":config show | get <key> | set <key> <value>")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprefixed_line_is_chat() {
        match parse("how do I sort a vec?").unwrap() {
            Input::Chat(text) => assert_eq!(text, "how do I sort a vec?"),
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn unknown_command_lists_available() {
        let err = parse(":frobnicate").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown command :frobnicate"));
        assert!(message.contains("create"));
        assert!(message.contains("git"));
    }

    #[test]
    fn create_keeps_prompt_spacing() {
        match parse(":create app.py a web   server").unwrap() {
            Input::Command(Command::Create { file, prompt }) => {
                assert_eq!(file, "app.py");
                assert_eq!(prompt, "a web   server");
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn create_without_prompt_is_arity_error() {
        let err = parse(":create app.py").unwrap_err();
        assert!(matches!(err, CommandError::Arity(_)));
        assert!(err.to_string().contains(":create <file> <prompt>"));
    }

    #[test]
    fn refactor_kind_is_optional() {
        match parse(":refactor app.py").unwrap() {
            Input::Command(Command::Refactor { kind: None, .. }) => {}
            _ => panic!("expected refactor without kind"),
        }
        match parse(":refactor app.py performance").unwrap() {
            Input::Command(Command::Refactor {
                kind: Some(kind), ..
            }) => assert_eq!(kind, "performance"),
            _ => panic!("expected refactor with kind"),
        }
    }

    #[test]
    fn project_create_takes_description() {
        match parse(":project create calc a small calculator").unwrap() {
            Input::Command(Command::Project(ProjectCmd::Create { name, description })) => {
                assert_eq!(name, "calc");
                assert_eq!(description, "a small calculator");
            }
            _ => panic!("expected project create"),
        }
    }

    #[test]
    fn project_remove_flag() {
        match parse(":project remove calc --delete-files").unwrap() {
            Input::Command(Command::Project(ProjectCmd::Remove {
                delete_files: true, ..
            })) => {}
            _ => panic!("expected remove with flag"),
        }
    }

    #[test]
    fn git_commit_message_spans_words() {
        match parse(":git commit initial project layout").unwrap() {
            Input::Command(Command::Git(GitCmd::Commit { message })) => {
                assert_eq!(message, "initial project layout");
            }
            _ => panic!("expected commit"),
        }
    }

    #[test]
    fn exit_and_quit_both_exit() {
        assert!(matches!(
            parse(":exit").unwrap(),
            Input::Command(Command::Exit)
        ));
        assert!(matches!(
            parse(":quit").unwrap(),
            Input::Command(Command::Exit)
        ));
    }

    #[test]
    fn auto_takes_whole_prompt() {
        match parse(":auto todo app with sqlite").unwrap() {
            Input::Command(Command::Auto { prompt }) => {
                assert_eq!(prompt, "todo app with sqlite");
            }
            _ => panic!("expected auto"),
        }
    }
}
