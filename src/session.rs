//! Interactive session state.
//!
//! Everything a dispatched command needs to run: settings, the project
//! registry, the model client, git, the attached context files, and the
//! bounded conversation history. There is no global state; the session is
//! built once at startup and threaded through every command.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::client::{ContextFile, Generate};
use crate::config::Settings;
use crate::git::GitAdapter;
use crate::project::{ProjectRegistry, RegistryError};

/// One user/model turn kept for history-aware prompts.
pub struct Exchange {
    pub prompt: String,
    pub response: String,
}

pub struct SessionContext {
    pub settings: Settings,
    pub registry: ProjectRegistry,
    pub client: Box<dyn Generate>,
    pub git: GitAdapter,
    /// The model requests are sent to; starts as the configured default.
    pub model: String,
    pub context_files: Vec<ContextFile>,
    history: VecDeque<Exchange>,
}

impl SessionContext {
    pub fn new(
        settings: Settings,
        registry: ProjectRegistry,
        client: Box<dyn Generate>,
        git: GitAdapter,
    ) -> Self {
        let model = settings.default_model.clone();
        Self {
            settings,
            registry,
            client,
            git,
            model,
            context_files: Vec::new(),
            history: VecDeque::new(),
        }
    }

    /// Loads the given files as context, replacing any previous set.
    ///
    /// Paths resolve against the active project directory when one is set,
    /// the current directory otherwise. At most `max_context_files` are
    /// loaded; the rest are reported back as skipped.
    pub fn load_context(&mut self, paths: &[String]) -> anyhow::Result<String> {
        let mut loaded = Vec::new();
        let mut skipped = Vec::new();

        for path in paths {
            if loaded.len() >= self.settings.max_context_files {
                skipped.push(path.clone());
                continue;
            }
            let resolved = self.resolve(path)?;
            let content = fs::read_to_string(&resolved)
                .with_context(|| format!("failed to read {}", resolved.display()))?;
            let language = resolved
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| "text".to_string());
            loaded.push(ContextFile {
                name: path.clone(),
                language,
                content,
            });
        }

        debug!(count = loaded.len(), "context files loaded");
        let mut message = format!("Loaded {} context file(s).", loaded.len());
        if !skipped.is_empty() {
            message.push_str(&format!(
                " Skipped {} over the limit of {}: {}",
                skipped.len(),
                self.settings.max_context_files,
                skipped.join(", ")
            ));
        }
        self.context_files = loaded;
        Ok(message)
    }

    pub fn clear_context(&mut self) {
        self.context_files.clear();
        self.history.clear();
    }

    /// Resolves a user-supplied path for file operations.
    ///
    /// Absolute paths pass through. Relative paths land inside the active
    /// project directory when one is set (going through the registry's
    /// traversal check, so `..` cannot escape it), the current directory
    /// otherwise.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, RegistryError> {
        let p = Path::new(path);
        if p.is_absolute() {
            return Ok(p.to_path_buf());
        }
        match self.registry.active() {
            Some(project) => {
                let name = project.name.clone();
                self.registry.resolve_path(&name, path)
            }
            None => Ok(p.to_path_buf()),
        }
    }

    /// Records a finished exchange, evicting the oldest past the cap.
    pub fn push_exchange(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        self.history.push_back(Exchange {
            prompt: prompt.into(),
            response: response.into(),
        });
        while self.history.len() > self.settings.max_history_entries {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Exchange> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Renders the conversation so far for a history-aware prompt.
    pub fn history_prompt(&self, prompt: &str) -> String {
        if self.history.is_empty() {
            return prompt.to_string();
        }
        let mut rendered = String::new();
        for exchange in self.history() {
            rendered.push_str(&format!(
                "User: {}\nAssistant: {}\n",
                exchange.prompt, exchange.response
            ));
        }
        rendered.push_str(&format!("User: {prompt}"));
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, ModelRequest};

    struct NullClient;

    #[async_trait::async_trait]
    impl Generate for NullClient {
        async fn generate(&self, _request: &ModelRequest) -> Result<String, ClientError> {
            Ok(String::new())
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("moku_session_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn session(base: PathBuf, settings: Settings) -> SessionContext {
        let registry = ProjectRegistry::new(base).unwrap();
        SessionContext::new(settings, registry, Box::new(NullClient), GitAdapter::new())
    }

    #[test]
    fn history_is_capped() {
        let dir = temp_dir("history");
        let mut settings = Settings::default();
        settings.max_history_entries = 3;
        let mut ctx = session(dir.clone(), settings);

        for i in 0..5 {
            ctx.push_exchange(format!("q{i}"), format!("a{i}"));
        }
        assert_eq!(ctx.history_len(), 3);
        assert_eq!(ctx.history().next().unwrap().prompt, "q2");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn context_load_respects_limit() {
        let dir = temp_dir("ctx_limit");
        let files_dir = dir.join("files");
        fs::create_dir_all(&files_dir).unwrap();
        let mut paths = Vec::new();
        for i in 0..4 {
            let p = files_dir.join(format!("f{i}.py"));
            fs::write(&p, "x = 1").unwrap();
            paths.push(p.display().to_string());
        }

        let mut settings = Settings::default();
        settings.max_context_files = 2;
        let mut ctx = session(dir.clone(), settings);

        let message = ctx.load_context(&paths).unwrap();
        assert_eq!(ctx.context_files.len(), 2);
        assert!(message.contains("Skipped 2"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn resolve_prefers_active_project() {
        let dir = temp_dir("resolve");
        let mut ctx = session(dir.clone(), Settings::default());
        assert_eq!(ctx.resolve("a.txt").unwrap(), PathBuf::from("a.txt"));

        ctx.registry.create("demo", "").unwrap();
        ctx.registry.set_active("demo").unwrap();
        let resolved = ctx.resolve("a.txt").unwrap();
        assert!(resolved.starts_with(&dir));
        assert!(resolved.ends_with("a.txt"));

        assert_eq!(ctx.resolve("/abs/a.txt").unwrap(), PathBuf::from("/abs/a.txt"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn resolve_rejects_escapes_from_active_project() {
        let dir = temp_dir("resolve_escape");
        let mut ctx = session(dir.clone(), Settings::default());
        ctx.registry.create("demo", "").unwrap();
        ctx.registry.set_active("demo").unwrap();

        assert!(matches!(
            ctx.resolve("../outside.txt"),
            Err(RegistryError::PathTraversal(_))
        ));
        assert!(matches!(
            ctx.resolve("sub/../../outside.txt"),
            Err(RegistryError::PathTraversal(_))
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn history_prompt_renders_exchanges() {
        let dir = temp_dir("prompt");
        let mut ctx = session(dir.clone(), Settings::default());
        assert_eq!(ctx.history_prompt("hi"), "hi");

        ctx.push_exchange("one", "1");
        let rendered = ctx.history_prompt("two");
        assert!(rendered.starts_with("User: one\nAssistant: 1\n"));
        assert!(rendered.ends_with("User: two"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
