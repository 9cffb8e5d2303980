//! Model client abstraction for moku.
//!
//! Defines the [`Generate`] trait that decouples every model-backed operation
//! from the live HTTP endpoint, the [`ModelRequest`] built fresh per command,
//! and the [`ClientError`] taxonomy. [`HttpModelClient`] is the production
//! implementation; tests substitute a deterministic stub.

mod http;

pub use http::HttpModelClient;

use thiserror::Error;

/// Errors from the model endpoint exchange.
///
/// No retries happen at this layer — the caller decides whether to retry.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint could not be reached, or the request timed out.
    /// An abandoned in-flight request after a timeout lands here too.
    #[error("model endpoint unreachable: {0}")]
    Unreachable(String),
    /// The endpoint answered with a non-success status.
    #[error("model endpoint returned {status}: {message}")]
    Remote { status: u16, message: String },
    /// The response body did not match the expected schema.
    #[error("malformed model response: {0}")]
    Protocol(String),
}

/// A file attached to a request as supporting context.
#[derive(Debug, Clone)]
pub struct ContextFile {
    pub name: String,
    pub language: String,
    pub content: String,
}

/// A single generation request. Constructed fresh per command invocation and
/// never persisted.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: String,
    pub context: Vec<ContextFile>,
    pub model: String,
    pub temperature: f64,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            prompt: prompt.into(),
            context: Vec::new(),
            model: model.into(),
            temperature,
        }
    }

    /// Attaches context files to the request.
    pub fn with_context(mut self, context: Vec<ContextFile>) -> Self {
        self.context = context;
        self
    }

    /// Renders the prompt plus any context files into the text sent upstream.
    ///
    /// Context files are appended as fenced blocks after the instruction,
    /// so the model sees them the same way a human reviewer would.
    pub fn render(&self) -> String {
        if self.context.is_empty() {
            return self.prompt.clone();
        }
        let mut out = self.prompt.clone();
        out.push_str("\n\nContext:\n");
        for file in &self.context {
            out.push_str(&format!(
                "File: {}\n```{}\n{}\n```\n\n",
                file.name, file.language, file.content
            ));
        }
        out.truncate(out.trim_end().len());
        out
    }
}

/// The injectable generation capability.
///
/// Every mutating command goes through this trait, so tests can swap in a
/// stub and exercise the file mutation engine without a live endpoint.
#[async_trait::async_trait]
pub trait Generate: Send + Sync {
    /// Performs a single request/response exchange with the model endpoint.
    async fn generate(&self, request: &ModelRequest) -> Result<String, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_context_is_the_prompt() {
        let req = ModelRequest::new("say hello", "m1", 0.7);
        assert_eq!(req.render(), "say hello");
    }

    #[test]
    fn render_appends_context_fences() {
        let req = ModelRequest::new("edit this", "m1", 0.7).with_context(vec![ContextFile {
            name: "lib.rs".to_string(),
            language: "rs".to_string(),
            content: "fn main() {}".to_string(),
        }]);
        let rendered = req.render();
        assert!(rendered.starts_with("edit this\n\nContext:\n"));
        assert!(rendered.contains("File: lib.rs\n```rs\nfn main() {}\n```"));
        assert!(!rendered.ends_with('\n'));
    }
}
