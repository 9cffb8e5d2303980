//! Centralized constants for moku.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "moku";

/// Default generation endpoint (Ollama-compatible).
pub const DEFAULT_API_URL: &str = "http://localhost:11434/api/generate";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "qwen2.5-coder:14b";

/// Default root directory for managed projects.
pub const DEFAULT_WORKING_DIR: &str = "projects";

/// Default request timeout for the model endpoint, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default sampling temperature when a model has no override.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Readline history filename.
pub const HISTORY_FILENAME: &str = "history.txt";

/// Per-project metadata filename.
pub const PROJECT_META_FILENAME: &str = ".project.json";

/// Subdirectory (beside an edited file) where backups are placed.
pub const BACKUP_DIR_NAME: &str = "backups";

/// Maximum number of context files attached to a request.
pub const MAX_CONTEXT_FILES: usize = 10;

/// Maximum number of conversation exchanges kept in memory.
pub const MAX_HISTORY_ENTRIES: usize = 100;

/// Default command used by `:test` to run a test file.
pub const DEFAULT_TEST_COMMAND: &str = "python3 -m unittest";

/// Timeout for test runner subprocesses, in seconds.
pub const TEST_RUN_TIMEOUT_SECS: u64 = 60;

/// Maximum number of matching lines `:search` returns.
pub const SEARCH_MAX_MATCHES: usize = 50;

/// Context lines shown around each `:search` match.
pub const SEARCH_CONTEXT_LINES: usize = 2;

/// Maximum number of files `:auto` will plan and generate.
pub const AUTO_MAX_FILES: usize = 8;
