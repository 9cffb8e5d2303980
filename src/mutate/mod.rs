//! The file mutation engine.
//!
//! Turns a natural-language instruction plus optional existing content into a
//! new file version via the model client. Each invocation is a short-lived
//! task stepping through `Pending -> ContentFetched -> Generated -> Written`
//! (or `Failed`); nothing is retained once the write completes.
//!
//! The backup-then-write step is atomic with respect to the target: new
//! content lands in a sibling temp file first and is renamed over the target
//! only after any backup copy has succeeded. A model failure, timeout, or
//! missing code block therefore never leaves a partially written file.

mod extract;

use extract::extract_code;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ContextFile, Generate, ModelRequest};
use crate::config::Settings;

/// Errors from file mutation operations.
#[derive(Debug, Error)]
pub enum MutationError {
    /// `create` was pointed at an existing file.
    #[error("{0} already exists — use :edit to modify it")]
    AlreadyExists(PathBuf),
    /// `edit`/`refactor` was pointed at a missing file.
    #[error("{0} does not exist")]
    NotFound(PathBuf),
    /// An unrecognized refactor kind or similar bad argument.
    #[error("{0}")]
    InvalidArgument(String),
    /// The model response contained nothing usable.
    #[error("the model response contained no code")]
    NoCode,
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Lifecycle of a single mutation task, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    ContentFetched,
    Generated,
    Written,
    Failed,
}

/// Fixed set of refactoring goals for `:refactor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefactorKind {
    Performance,
    Readability,
    Structure,
}

impl RefactorKind {
    /// The instruction sent to the model for this kind.
    fn instruction(&self) -> &'static str {
        match self {
            RefactorKind::Performance => {
                "Optimize this code for better performance. Improve algorithms, \
                 reduce complexity, and minimize resource usage."
            }
            RefactorKind::Readability => {
                "Improve code readability while preserving functionality. Use better \
                 names, add comments where they help, and simplify complex expressions."
            }
            RefactorKind::Structure => {
                "Refactor the code organization. Improve function and module \
                 structure and enhance cohesion."
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefactorKind::Performance => "performance",
            RefactorKind::Readability => "readability",
            RefactorKind::Structure => "structure",
        }
    }
}

impl std::str::FromStr for RefactorKind {
    type Err = MutationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "performance" => Ok(RefactorKind::Performance),
            "readability" => Ok(RefactorKind::Readability),
            "structure" => Ok(RefactorKind::Structure),
            other => Err(MutationError::InvalidArgument(format!(
                "invalid refactor kind: {other}. Valid kinds: performance, readability, structure"
            ))),
        }
    }
}

/// Result of a successful mutation.
#[derive(Debug)]
pub struct MutationOutcome {
    pub path: PathBuf,
    /// The model's full commentary, for display.
    pub commentary: String,
    /// Diff preview: unified against the previous content for edits,
    /// all-additions for created files.
    pub diff: Option<String>,
    /// Where the previous content was backed up, when backups are on.
    pub backup: Option<PathBuf>,
}

/// Drives create/edit/refactor operations through the model client.
///
/// Holds borrows only — one engine is built per dispatched command.
pub struct MutationEngine<'a> {
    client: &'a dyn Generate,
    settings: &'a Settings,
    model: &'a str,
}

impl<'a> MutationEngine<'a> {
    pub fn new(client: &'a dyn Generate, settings: &'a Settings, model: &'a str) -> Self {
        Self {
            client,
            settings,
            model,
        }
    }

    fn request(&self, prompt: String, context: &[ContextFile]) -> ModelRequest {
        ModelRequest::new(prompt, self.model, self.settings.temperature_for(self.model))
            .with_context(context.to_vec())
    }

    /// Creates a new file from an instruction.
    ///
    /// The target must not already exist. On success the generated content is
    /// written atomically; on any failure the filesystem is untouched.
    pub async fn create_file(
        &self,
        path: &Path,
        instruction: &str,
        context: &[ContextFile],
    ) -> Result<MutationOutcome, MutationError> {
        if path.exists() {
            return Err(MutationError::AlreadyExists(path.to_path_buf()));
        }
        debug!(path = %path.display(), state = ?TaskState::Pending, "create task ready");

        let request = self.request(instruction.to_string(), context);
        let response = match self.client.generate(&request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), state = ?TaskState::Failed, "generation failed");
                return Err(e.into());
            }
        };
        debug!(path = %path.display(), state = ?TaskState::Generated, "response received");

        let code = first_code_block(&response, &language_of(path))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_atomic(path, &code, None)?;
        info!(path = %path.display(), bytes = code.len(), state = ?TaskState::Written, "file created");

        let preview = crate::diff::new_file_preview(&code, &path.display().to_string());
        Ok(MutationOutcome {
            path: path.to_path_buf(),
            commentary: response,
            diff: Some(preview),
            backup: None,
        })
    }

    /// Edits an existing file according to an instruction.
    ///
    /// The previous content is read fully into memory before the model call;
    /// no file handle is held across it. When `backup_files` is on, the
    /// original is copied aside before the atomic overwrite.
    pub async fn edit_file(
        &self,
        path: &Path,
        instruction: &str,
        context: &[ContextFile],
    ) -> Result<MutationOutcome, MutationError> {
        if !path.exists() {
            return Err(MutationError::NotFound(path.to_path_buf()));
        }
        let existing = fs::read_to_string(path)?;
        debug!(path = %path.display(), state = ?TaskState::ContentFetched, "edit task ready");

        let language = language_of(path);
        let prompt = format!(
            "{instruction}\n\nFile to edit: {}\n```{language}\n{existing}\n```",
            path.display()
        );

        let response = match self.client.generate(&self.request(prompt, context)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), state = ?TaskState::Failed, "generation failed");
                return Err(e.into());
            }
        };

        let code = first_code_block(&response, &language)?;
        let backup = if self.settings.backup_files {
            Some(backup_path_for(path)?)
        } else {
            None
        };
        write_atomic(path, &code, backup.as_deref().map(|b| (path, b)))?;
        info!(path = %path.display(), state = ?TaskState::Written, "file edited");

        let diff = crate::diff::unified_diff(&existing, &code, &path.display().to_string());
        Ok(MutationOutcome {
            path: path.to_path_buf(),
            commentary: response,
            diff: Some(diff),
            backup,
        })
    }

    /// Refactors an existing file toward one of the fixed goals.
    pub async fn refactor_file(
        &self,
        path: &Path,
        kind: RefactorKind,
        context: &[ContextFile],
    ) -> Result<MutationOutcome, MutationError> {
        let instruction = format!(
            "Please refactor the following code. {} Provide the full refactored file.",
            kind.instruction()
        );
        self.edit_file(path, &instruction, context).await
    }

    /// Generates a test file next to the target.
    ///
    /// The test file is named `test_{name}` unless the target already looks
    /// like a test, in which case `{stem}_more.{ext}` is used.
    pub async fn generate_tests(
        &self,
        path: &Path,
        context: &[ContextFile],
    ) -> Result<MutationOutcome, MutationError> {
        if !path.exists() {
            return Err(MutationError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let language = language_of(path);
        let test_path = test_path_for(path);

        let prompt = format!(
            "Create comprehensive unit tests for the following code. Cover the \
             public functions, edge cases, and error handling.\n\nFile: {}\n```{language}\n{content}\n```\n\n\
             The tests will be saved as {}.",
            path.display(),
            test_path.display()
        );

        let response = self.client.generate(&self.request(prompt, context)).await?;
        let code = first_code_block(&response, &language)?;

        let backup = if test_path.exists() && self.settings.backup_files {
            Some(backup_path_for(&test_path)?)
        } else {
            None
        };
        write_atomic(
            &test_path,
            &code,
            backup.as_deref().map(|b| (test_path.as_path(), b)),
        )?;
        info!(path = %test_path.display(), "tests generated");

        Ok(MutationOutcome {
            path: test_path,
            commentary: response,
            diff: None,
            backup,
        })
    }
}

/// File extension used as the fence language, defaulting to `text`.
fn language_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "text".to_string())
}

/// Picks the code to write from a model response.
///
/// The first fenced block wins; a fence-less response is taken whole, since
/// some models answer with bare content. Only an empty response is an error.
fn first_code_block(response: &str, language: &str) -> Result<String, MutationError> {
    let codes = extract_code(response, language);
    if let Some(code) = codes.into_iter().next() {
        return Ok(code);
    }
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(MutationError::NoCode);
    }
    Ok(trimmed.to_string())
}

/// Computes the backup location for `path`: `backups/{name}.{unix_ts}.bak`
/// beside the target.
fn backup_path_for(path: &Path) -> Result<PathBuf, MutationError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let backup_dir = parent.join(crate::constants::BACKUP_DIR_NAME);
    fs::create_dir_all(&backup_dir)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(backup_dir.join(format!("{}.{}.bak", name, Utc::now().timestamp())))
}

/// Writes `content` to `path` atomically.
///
/// The content goes to a sibling temp file first; when a backup is
/// requested, the original is copied before the rename. Any failure removes
/// the temp file and leaves the target exactly as it was.
fn write_atomic(
    path: &Path,
    content: &str,
    backup: Option<(&Path, &Path)>,
) -> Result<(), MutationError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.tmp.{}", name, std::process::id()));

    fs::write(&tmp, content)?;

    if let Some((original, backup_path)) = backup {
        if let Err(e) = fs::copy(original, backup_path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Test file path for a target: `test_{name}` beside it, or
/// `{stem}_more.{ext}` when the target is already a test.
fn test_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if name.starts_with("test_") {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = language_of(path);
        parent.join(format!("{stem}_more.{ext}"))
    } else {
        parent.join(format!("test_{name}"))
    }
}
