//! Version control adapter.
//!
//! Thin wrapper over the `git` binary for per-project repositories. Every
//! operation shells out with the project directory as the working directory
//! and reports a human-readable summary string. When git is not installed,
//! all operations degrade to a notice instead of failing.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

const GITIGNORE_TEMPLATE: &str = "\
# Python
__pycache__/
*.py[cod]
env/
venv/
build/
dist/
*.egg-info/

# IDE files
.idea/
.vscode/
*.swp

# OS files
.DS_Store
Thumbs.db

# Project specific
backups/
logs/
";

/// Handle to the system git binary.
pub struct GitAdapter {
    available: bool,
}

impl GitAdapter {
    /// Probes for a usable `git` on the PATH.
    pub fn new() -> Self {
        let available = std::process::Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if available {
            debug!("git support initialized");
        } else {
            warn!("git not found, version control integration disabled");
        }
        Self { available }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> std::io::Result<(bool, String, String)> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok((
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }

    /// Initializes a repository in `dir` and seeds a `.gitignore`.
    pub async fn init(&self, dir: &Path) -> String {
        if !self.available {
            return "Git is not installed on this system.".to_string();
        }
        match self.run(dir, &["init"]).await {
            Ok((true, stdout, _)) => {
                if let Err(e) = std::fs::write(dir.join(".gitignore"), GITIGNORE_TEMPLATE) {
                    warn!(error = %e, "failed to write .gitignore");
                }
                info!(dir = %dir.display(), "git repository initialized");
                format!("Git repository initialized in {}\n{stdout}", dir.display())
            }
            Ok((false, _, stderr)) => format!("Git initialization failed: {stderr}"),
            Err(e) => format!("Error initializing Git repository: {e}"),
        }
    }

    /// Stages the given paths, or everything when `paths` is empty.
    pub async fn add(&self, dir: &Path, paths: &[String]) -> String {
        if !self.available {
            return "Git is not installed on this system.".to_string();
        }
        let patterns: Vec<&str> = if paths.is_empty() {
            vec!["."]
        } else {
            paths.iter().map(|p| p.as_str()).collect()
        };
        let mut failures = Vec::new();
        for pattern in &patterns {
            match self.run(dir, &["add", pattern]).await {
                Ok((true, _, _)) => {}
                Ok((false, _, stderr)) => failures.push(format!("Failed to add {pattern}: {stderr}")),
                Err(e) => failures.push(format!("Failed to add {pattern}: {e}")),
            }
        }
        if failures.is_empty() {
            "Files added to the staging area".to_string()
        } else {
            failures.join("\n")
        }
    }

    /// Commits staged changes with the given message.
    pub async fn commit(&self, dir: &Path, message: &str) -> String {
        if !self.available {
            return "Git is not installed on this system.".to_string();
        }
        match self.run(dir, &["commit", "-m", message]).await {
            Ok((true, stdout, _)) => {
                info!(dir = %dir.display(), message, "changes committed");
                format!("Changes committed: {stdout}")
            }
            Ok((false, stdout, stderr)) => {
                // "nothing to commit" lands on stdout with a non-zero status.
                if stderr.is_empty() {
                    format!("Commit failed: {stdout}")
                } else {
                    format!("Commit failed: {stderr}")
                }
            }
            Err(e) => format!("Error committing changes: {e}"),
        }
    }

    /// Returns the repository status for `dir`.
    pub async fn status(&self, dir: &Path) -> String {
        if !self.available {
            return "Git is not installed on this system.".to_string();
        }
        match self.run(dir, &["status"]).await {
            Ok((true, stdout, _)) => stdout,
            Ok((false, _, stderr)) => format!("Git status failed: {stderr}"),
            Err(e) => format!("Error getting Git status: {e}"),
        }
    }

    /// Stages everything and commits in one step, for post-mutation commits.
    pub async fn add_and_commit(&self, dir: &Path, message: &str) -> String {
        if !self.available {
            return "Git is not installed on this system.".to_string();
        }
        let add = self.add(dir, &[]).await;
        if add.contains("Failed") {
            return add;
        }
        self.commit(dir, message).await
    }
}

impl Default for GitAdapter {
    fn default() -> Self {
        Self::new()
    }
}
