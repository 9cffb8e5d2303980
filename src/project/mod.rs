//! Project tracking for moku.
//!
//! A project is a named, filesystem-rooted collection of files. Metadata is
//! persisted as `.project.json` inside the project directory; the file list
//! is rebuilt by scanning rather than stored. The [`registry`] submodule owns
//! the set of known projects for the process lifetime.

mod registry;

pub use registry::ProjectRegistry;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::PROJECT_META_FILENAME;

/// Errors from project registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A project with that name is already registered.
    #[error("project '{0}' already exists")]
    DuplicateName(String),
    /// No project with that name is registered.
    #[error("project '{0}' not found")]
    NotFound(String),
    /// A relative path would escape the project root.
    #[error("path '{0}' escapes the project directory")]
    PathTraversal(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid project metadata: {0}")]
    Meta(#[from] serde_json::Error),
}

/// Stat info recorded for each file during a scan.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub extension: String,
}

/// Metadata persisted to `.project.json`.
#[derive(Debug, Serialize, Deserialize)]
struct ProjectMeta {
    name: String,
    #[serde(default)]
    description: String,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    #[serde(default)]
    tags: Vec<String>,
}

/// A tracked development project.
#[derive(Debug)]
pub struct Project {
    pub name: String,
    pub directory: PathBuf,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub tags: Vec<String>,
    /// Relative path -> stat info, rebuilt by [`Project::scan_files`].
    pub files: BTreeMap<String, FileInfo>,
    /// At most one project in a registry is active at a time.
    pub active: bool,
}

impl Project {
    /// Creates a new project rooted at `directory`, creating the directory.
    pub fn new(name: &str, directory: PathBuf) -> Result<Self, RegistryError> {
        fs::create_dir_all(&directory)?;
        let now = Utc::now();
        Ok(Self {
            name: name.to_string(),
            directory,
            description: String::new(),
            created_at: now,
            last_modified: now,
            tags: Vec::new(),
            files: BTreeMap::new(),
            active: false,
        })
    }

    /// Loads a project from its directory, falling back to the directory
    /// name when no metadata file exists.
    pub fn load(directory: &Path) -> Result<Self, RegistryError> {
        let meta_path = directory.join(PROJECT_META_FILENAME);
        let mut project = Self::new(
            &directory
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            directory.to_path_buf(),
        )?;

        if meta_path.exists() {
            let contents = fs::read_to_string(&meta_path)?;
            let meta: ProjectMeta = serde_json::from_str(&contents)?;
            project.name = meta.name;
            project.description = meta.description;
            project.created_at = meta.created_at;
            project.last_modified = meta.last_modified;
            project.tags = meta.tags;
        }

        project.scan_files()?;
        Ok(project)
    }

    /// Persists metadata to `.project.json` and bumps `last_modified`.
    pub fn save(&mut self) -> Result<(), RegistryError> {
        self.last_modified = Utc::now();
        let meta = ProjectMeta {
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            last_modified: self.last_modified,
            tags: self.tags.clone(),
        };
        let json = serde_json::to_string_pretty(&meta)?;
        fs::write(self.directory.join(PROJECT_META_FILENAME), json)?;
        Ok(())
    }

    /// Rebuilds the file list by walking the project directory.
    ///
    /// Dotfiles and backup directories are skipped.
    pub fn scan_files(&mut self) -> Result<(), RegistryError> {
        self.files.clear();
        walk(&self.directory, &self.directory, &mut self.files);
        debug!(project = %self.name, files = self.files.len(), "scanned project");
        Ok(())
    }
}

fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<String, FileInfo>) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == crate::constants::BACKUP_DIR_NAME {
            continue;
        }

        if path.is_dir() {
            walk(root, &path, files);
        } else if let Ok(stat) = entry.metadata() {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();
            files.insert(
                rel,
                FileInfo {
                    size: stat.len(),
                    modified: stat.modified().ok().map(DateTime::from),
                    extension: path
                        .extension()
                        .map(|e| e.to_string_lossy().to_string())
                        .unwrap_or_default(),
                },
            );
        }
    }
}
