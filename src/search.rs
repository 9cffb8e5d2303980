//! Project search.
//!
//! Case-insensitive substring search across the files of a directory tree,
//! with an optional glob filter on file names. Backs the `:search` command.

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{SEARCH_CONTEXT_LINES, SEARCH_MAX_MATCHES};

const BINARY_DETECTION_BYTES: usize = 8192;

/// One matching line with its surrounding context.
pub struct SearchMatch {
    pub path: PathBuf,
    /// 1-based line number of the match.
    pub line: usize,
    /// Context lines around the match, the matching line included.
    pub snippet: String,
}

/// Searches `root` recursively for lines containing `query` (case-insensitive).
///
/// `pattern` restricts the search to files whose name matches the glob.
/// At most [`SEARCH_MAX_MATCHES`] matches are returned; hidden directories
/// and backup directories are skipped.
pub fn search_files(root: &Path, query: &str, pattern: Option<&str>) -> Vec<SearchMatch> {
    let include = pattern.and_then(|p| glob::Pattern::new(p).ok());
    let needle = query.to_lowercase();
    let mut matches = Vec::new();
    walk(root, root, &needle, &include, &mut matches);
    matches
}

fn walk(
    root: &Path,
    dir: &Path,
    needle: &str,
    include: &Option<glob::Pattern>,
    matches: &mut Vec<SearchMatch>,
) {
    if matches.len() >= SEARCH_MAX_MATCHES {
        return;
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if matches.len() >= SEARCH_MAX_MATCHES {
            return;
        }
        let path = entry.path();
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        if path.is_dir() {
            if name.starts_with('.') || name == crate::constants::BACKUP_DIR_NAME {
                continue;
            }
            walk(root, &path, needle, include, matches);
        } else if path.is_file() {
            if let Some(pattern) = include {
                if !pattern.matches(&name) {
                    continue;
                }
            }
            search_file(root, &path, needle, matches);
        }
    }
}

fn search_file(root: &Path, path: &Path, needle: &str, matches: &mut Vec<SearchMatch>) {
    let content = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return,
    };
    let check_len = content.len().min(BINARY_DETECTION_BYTES);
    if content[..check_len].contains(&0) {
        return;
    }
    let text = match String::from_utf8(content) {
        Ok(s) => s,
        Err(_) => return,
    };

    let relative = path.strip_prefix(root).unwrap_or(path);
    let lines: Vec<&str> = text.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if matches.len() >= SEARCH_MAX_MATCHES {
            return;
        }
        if !line.to_lowercase().contains(needle) {
            continue;
        }
        let start = idx.saturating_sub(SEARCH_CONTEXT_LINES);
        let end = (idx + SEARCH_CONTEXT_LINES + 1).min(lines.len());
        let snippet = lines[start..end]
            .iter()
            .enumerate()
            .map(|(offset, l)| {
                let n = start + offset + 1;
                let marker = if start + offset == idx { ">" } else { " " };
                format!("{marker}{n:>4} | {l}")
            })
            .collect::<Vec<_>>()
            .join("\n");
        matches.push(SearchMatch {
            path: relative.to_path_buf(),
            line: idx + 1,
            snippet,
        });
    }
}

/// Renders matches for display as `path:line` headers with snippets.
pub fn render_matches(query: &str, matches: &[SearchMatch]) -> String {
    if matches.is_empty() {
        return format!("No matches for '{query}'.");
    }
    let mut out = format!("{} match(es) for '{query}':\n", matches.len());
    for m in matches {
        out.push_str(&format!("\n{}:{}\n", m.path.display(), m.line));
        out.push_str(&m.snippet);
        out.push('\n');
    }
    if matches.len() >= SEARCH_MAX_MATCHES {
        out.push_str(&format!("\n(capped at {SEARCH_MAX_MATCHES} matches)\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("moku_search_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn finds_case_insensitive_matches() {
        let dir = temp_dir("basic");
        fs::write(dir.join("a.py"), "def Alpha():\n    pass\n").unwrap();
        fs::write(dir.join("b.py"), "beta = 1\n").unwrap();

        let matches = search_files(&dir, "alpha", None);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, Path::new("a.py"));
        assert_eq!(matches[0].line, 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn glob_pattern_restricts_files() {
        let dir = temp_dir("glob");
        fs::write(dir.join("a.py"), "target\n").unwrap();
        fs::write(dir.join("a.md"), "target\n").unwrap();

        let matches = search_files(&dir, "target", Some("*.py"));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, Path::new("a.py"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn skips_backup_and_hidden_dirs() {
        let dir = temp_dir("skip");
        fs::create_dir_all(dir.join("backups")).unwrap();
        fs::create_dir_all(dir.join(".git")).unwrap();
        fs::write(dir.join("backups/a.bak"), "target\n").unwrap();
        fs::write(dir.join(".git/config"), "target\n").unwrap();
        fs::write(dir.join("a.txt"), "target\n").unwrap();

        let matches = search_files(&dir, "target", None);
        assert_eq!(matches.len(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn caps_match_count() {
        let dir = temp_dir("cap");
        let body = "needle\n".repeat(SEARCH_MAX_MATCHES * 2);
        fs::write(dir.join("big.txt"), body).unwrap();

        let matches = search_files(&dir, "needle", None);
        assert_eq!(matches.len(), SEARCH_MAX_MATCHES);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn snippet_includes_context() {
        let dir = temp_dir("ctx");
        fs::write(dir.join("a.txt"), "one\ntwo\nneedle\nfour\nfive\n").unwrap();

        let matches = search_files(&dir, "needle", None);
        assert_eq!(matches.len(), 1);
        let snippet = &matches[0].snippet;
        assert!(snippet.contains("one"));
        assert!(snippet.contains("five"));
        assert!(snippet.contains(">   3 | needle"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
