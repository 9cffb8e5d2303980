//! Test execution.
//!
//! Runs the configured test command against a single test file in a child
//! process, with a hard timeout and both output streams captured.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::info;

use crate::constants::TEST_RUN_TIMEOUT_SECS;

/// Outcome of a test run, for callers that need to branch on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed,
    TimedOut,
    Error,
}

/// A finished test run: the verdict plus a displayable report.
pub struct TestReport {
    pub outcome: TestOutcome,
    pub output: String,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.outcome == TestOutcome::Passed
    }
}

/// Runs `test_command` with `test_file` appended, in `test_file`'s directory.
///
/// The command string is split on whitespace; the first token is the program
/// and the rest are arguments. The child is killed if it exceeds the timeout.
pub async fn run_tests(test_command: &str, test_file: &Path) -> TestReport {
    if !test_file.exists() {
        return TestReport {
            outcome: TestOutcome::Error,
            output: format!("Test file {} does not exist.", test_file.display()),
        };
    }

    let mut parts = test_command.split_whitespace();
    let Some(program) = parts.next() else {
        return TestReport {
            outcome: TestOutcome::Error,
            output: "Test command is empty.".to_string(),
        };
    };

    let dir = test_file.parent().unwrap_or_else(|| Path::new("."));
    let file_name = test_file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| test_file.display().to_string());

    let mut cmd = Command::new(program);
    cmd.args(parts)
        .arg(&file_name)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            return TestReport {
                outcome: TestOutcome::Error,
                output: format!("Failed to run tests: {e}"),
            };
        }
    };

    let timeout = Duration::from_secs(TEST_RUN_TIMEOUT_SECS);
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            info!(file = %test_file.display(), code, "tests executed");

            if output.status.success() {
                TestReport {
                    outcome: TestOutcome::Passed,
                    output: format!("Tests passed:\n{}", combine(&stdout, &stderr)),
                }
            } else {
                TestReport {
                    outcome: TestOutcome::Failed,
                    output: format!("Tests failed (exit code {code}):\n{}", combine(&stdout, &stderr)),
                }
            }
        }
        Ok(Err(e)) => TestReport {
            outcome: TestOutcome::Error,
            output: format!("Failed to run tests: {e}"),
        },
        Err(_) => TestReport {
            outcome: TestOutcome::TimedOut,
            output: format!(
                "Test execution timed out after {} seconds",
                TEST_RUN_TIMEOUT_SECS
            ),
        },
    }
}

fn combine(stdout: &str, stderr: &str) -> String {
    // unittest writes its report to stderr.
    let mut text = stdout.trim().to_string();
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(stderr);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("moku_runner_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn missing_file_reports_error() {
        let report = run_tests("true", Path::new("/nonexistent/test_x.py")).await;
        assert_eq!(report.outcome, TestOutcome::Error);
        assert!(report.output.contains("does not exist"));
    }

    #[tokio::test]
    async fn empty_command_reports_error() {
        let dir = temp_dir("empty");
        let file = dir.join("test_a.py");
        fs::write(&file, "").unwrap();
        let report = run_tests("  ", &file).await;
        assert_eq!(report.outcome, TestOutcome::Error);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn successful_command_passes() {
        let dir = temp_dir("pass");
        let file = dir.join("test_a.py");
        fs::write(&file, "").unwrap();
        // `true` ignores its argument and exits 0.
        let report = run_tests("true", &file).await;
        assert!(report.passed());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn failing_command_is_reported() {
        let dir = temp_dir("fail");
        let file = dir.join("test_a.py");
        fs::write(&file, "").unwrap();
        let report = run_tests("false", &file).await;
        assert_eq!(report.outcome, TestOutcome::Failed);
        assert!(report.output.contains("Tests failed"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
