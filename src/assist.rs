//! Read-only assistant operations and the auto-development loop.
//!
//! These operations talk to the model but, except for `auto_develop` and
//! `debug_and_fix`, never touch the filesystem. Each takes the session
//! context explicitly; results come back as display-ready strings.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::client::ModelRequest;
use crate::constants::AUTO_MAX_FILES;
use crate::mutate::{MutationEngine, MutationError};
use crate::runner;
use crate::session::SessionContext;

/// Forwards a plain chat line to the model with the running history.
pub async fn chat(ctx: &mut SessionContext, line: &str) -> anyhow::Result<String> {
    debug!(history = ctx.history_len(), "chat turn");
    let prompt = ctx.history_prompt(line);
    let request = ModelRequest::new(prompt, &ctx.model, ctx.settings.temperature_for(&ctx.model))
        .with_context(ctx.context_files.clone());
    let response = ctx.client.generate(&request).await?;
    ctx.push_exchange(line, response.clone());
    Ok(response)
}

/// Asks the model to explain the contents of a file.
pub async fn explain(ctx: &mut SessionContext, path: &str) -> anyhow::Result<String> {
    let resolved = ctx.resolve(path)?;
    let content = read_target(&resolved)?;
    let language = language_of(&resolved);

    let prompt = format!(
        "Please explain the following code in detail:\n\n\
         File: {path}\n```{language}\n{content}\n```\n\n\
         Include explanations of:\n\
         1. Overall purpose and functionality\n\
         2. How the code is structured\n\
         3. Key algorithms and functions\n\
         4. Notable patterns or techniques used\n\
         5. Potential improvements or issues"
    );

    let request = ModelRequest::new(prompt, &ctx.model, ctx.settings.temperature_for(&ctx.model));
    let response = ctx.client.generate(&request).await?;
    Ok(format!("Explanation of {path}:\n\n{response}"))
}

/// Asks the model for a code quality review of a file.
pub async fn analyze(ctx: &mut SessionContext, path: &str) -> anyhow::Result<String> {
    let resolved = ctx.resolve(path)?;
    let content = read_target(&resolved)?;
    let language = language_of(&resolved);

    let prompt = format!(
        "Review the following code for quality issues:\n\n\
         File: {path}\n```{language}\n{content}\n```\n\n\
         Report on:\n\
         1. Complexity hotspots\n\
         2. Style issues\n\
         3. Potential bugs and anti-patterns\n\
         4. Error handling gaps\n\
         Keep the report concise and actionable."
    );

    let request = ModelRequest::new(prompt, &ctx.model, ctx.settings.temperature_for(&ctx.model));
    let response = ctx.client.generate(&request).await?;
    Ok(format!("Analysis of {path}:\n\n{response}"))
}

/// Runs the tests; on failure, asks the model to fix the code and reruns.
pub async fn debug_and_fix(
    ctx: &mut SessionContext,
    code_path: &str,
    test_path: &str,
) -> anyhow::Result<String> {
    let code_file = ctx.resolve(code_path)?;
    let test_file = ctx.resolve(test_path)?;

    let before = runner::run_tests(&ctx.settings.test_command, &test_file).await;
    if before.passed() {
        return Ok(format!("All tests passed. No fixes needed.\n\n{}", before.output));
    }

    let code_content = read_target(&code_file)?;
    let test_content = read_target(&test_file)?;
    let language = language_of(&code_file);

    let instruction = format!(
        "The following code has failing tests. Fix the code so the tests pass.\n\n\
         Code file ({code_path}):\n```{language}\n{code_content}\n```\n\n\
         Test file ({test_path}):\n```{language}\n{test_content}\n```\n\n\
         Test results:\n{}\n\n\
         Provide the complete fixed content of {code_path}.",
        before.output
    );

    let engine = MutationEngine::new(ctx.client.as_ref(), &ctx.settings, &ctx.model);
    let outcome = engine.edit_file(&code_file, &instruction, &[]).await?;

    let after = runner::run_tests(&ctx.settings.test_command, &test_file).await;
    if after.passed() {
        info!(file = %code_file.display(), "fix applied, tests pass");
        auto_commit(ctx, &code_file, &format!("Fix {code_path} to pass tests")).await;
    } else {
        warn!(file = %code_file.display(), "fix applied, tests still failing");
    }

    let mut report = format!(
        "Original test results:\n{}\n\nFix applied to {}.\n",
        before.output,
        outcome.path.display()
    );
    if let Some(diff) = &outcome.diff {
        if !diff.is_empty() {
            report.push_str(&format!("\n{diff}\n"));
        }
    }
    report.push_str(&format!("\nNew test results:\n{}", after.output));
    Ok(report)
}

/// Builds a whole project from a prompt: plan first, then one file at a time.
///
/// The project name comes from the prompt's leading word. The model's plan is
/// mined for file names; at most [`AUTO_MAX_FILES`] are created. When git
/// integration is on the project gets a repository and a commit per phase.
pub async fn auto_develop(ctx: &mut SessionContext, prompt: &str) -> anyhow::Result<String> {
    let leading = prompt.split_whitespace().next().unwrap_or("project");
    let name: String = leading
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();

    let project_dir = {
        let project = ctx.registry.create(&name, prompt)?;
        project.directory.clone()
    };
    ctx.registry.set_active(&name)?;
    info!(project = %name, dir = %project_dir.display(), "auto development started");

    if ctx.settings.git_integration {
        ctx.git.init(&project_dir).await;
    }

    let planning_prompt = format!(
        "I need to create a project based on: '{prompt}'\n\n\
         Provide a development plan including:\n\
         1. A list of source files with brief descriptions\n\
         2. The implementation approach\n\
         3. A testing strategy\n\
         Format the response as a step-by-step plan. Do not write code yet."
    );
    let request = ModelRequest::new(
        planning_prompt,
        &ctx.model,
        ctx.settings.temperature_for(&ctx.model),
    );
    let plan = ctx.client.generate(&request).await?;

    fs::write(
        project_dir.join("development_plan.md"),
        format!("# Development plan for {name}\n\n{plan}\n"),
    )?;
    if ctx.settings.git_integration {
        ctx.git.add_and_commit(&project_dir, "Add development plan").await;
    }

    let files = planned_files(&plan);
    let mut results = vec![format!("Development plan saved. Planned files: {}", files.join(", "))];

    let engine = MutationEngine::new(ctx.client.as_ref(), &ctx.settings, &ctx.model);
    for file in &files {
        let file_prompt = format!(
            "Create the file '{file}' for the project '{prompt}'.\n\n\
             Development plan:\n{plan}\n\n\
             Write complete, well-documented code for this one file."
        );
        let target = project_dir.join(file);
        match engine.create_file(&target, &file_prompt, &[]).await {
            Ok(_) => results.push(format!("Created {file}")),
            Err(MutationError::AlreadyExists(_)) => {
                results.push(format!("Skipped {file} (already exists)"))
            }
            Err(e) => {
                warn!(file, error = %e, "auto development file failed");
                results.push(format!("Failed to create {file}: {e}"));
            }
        }
    }

    if let Some(project) = ctx.registry.get_mut(&name) {
        project.scan_files()?;
        project.save()?;
    }
    if ctx.settings.git_integration {
        ctx.git.add_and_commit(&project_dir, "Add generated files").await;
    }

    Ok(format!(
        "Project '{name}' created in {}.\n\n{}",
        project_dir.display(),
        results.join("\n")
    ))
}

/// Commits a mutated file's project when git integration is on and the file
/// lives inside the active project.
pub async fn auto_commit(ctx: &SessionContext, path: &Path, message: &str) {
    if !ctx.settings.git_integration {
        return;
    }
    let Some(project) = ctx.registry.active() else {
        return;
    };
    if path.starts_with(&project.directory) {
        ctx.git.add_and_commit(&project.directory, message).await;
    }
}

/// Extracts planned file names from a development plan.
///
/// Picks up dotted file names with a known source extension, deduplicated in
/// order of first appearance, capped at [`AUTO_MAX_FILES`]. The plan document
/// itself is excluded.
fn planned_files(plan: &str) -> Vec<String> {
    let re = regex::Regex::new(r"\b[a-zA-Z0-9_]+\.(?:py|rs|js|ts|go|java|c|cpp|h|sh|toml|json|md)\b")
        .ok();
    let mut seen = BTreeSet::new();
    let mut files = Vec::new();
    if let Some(re) = re {
        for m in re.find_iter(plan) {
            let name = m.as_str().to_string();
            if name == "development_plan.md" || !seen.insert(name.clone()) {
                continue;
            }
            files.push(name);
            if files.len() >= AUTO_MAX_FILES {
                break;
            }
        }
    }
    files
}

fn read_target(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!("{} does not exist", path.display());
    }
    Ok(fs::read_to_string(path)?)
}

fn language_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "text".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_files_dedupes_and_caps() {
        let plan = "We will write main.py, utils.py, then main.py again, \
                    plus test_main.py and notes.txt and more.py extra.py \
                    a.py b.py c.py d.py e.py";
        let files = planned_files(plan);
        assert_eq!(files.iter().filter(|f| *f == "main.py").count(), 1);
        assert!(files.len() <= AUTO_MAX_FILES);
        assert!(!files.contains(&"notes.txt".to_string()));
    }

    #[test]
    fn plan_document_is_excluded() {
        let files = planned_files("development_plan.md and app.py");
        assert_eq!(files, vec!["app.py".to_string()]);
    }
}
