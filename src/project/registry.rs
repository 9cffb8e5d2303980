//! The project registry — exclusive owner of the known-projects list.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use super::{Project, RegistryError};

/// Owns the list of known projects, rooted at the configured working
/// directory. Projects keep insertion order; lookups are by name.
pub struct ProjectRegistry {
    base_dir: PathBuf,
    projects: Vec<Project>,
}

impl ProjectRegistry {
    /// Creates a registry rooted at `base_dir`, creating the directory.
    pub fn new(base_dir: PathBuf) -> Result<Self, RegistryError> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            projects: Vec::new(),
        })
    }

    /// Discovers existing projects under the base directory.
    ///
    /// Called once at startup; dot-directories are ignored.
    pub fn scan(&mut self) -> Result<(), RegistryError> {
        self.projects.clear();
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.base_dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_dir()
                    && !p
                        .file_name()
                        .map(|n| n.to_string_lossy().starts_with('.'))
                        .unwrap_or(true)
            })
            .collect();
        dirs.sort();

        for dir in dirs {
            match Project::load(&dir) {
                Ok(project) => self.projects.push(project),
                // An unreadable project must not take the whole session down.
                Err(e) => warn!(dir = %dir.display(), error = %e, "skipping unreadable project"),
            }
        }
        info!(count = self.projects.len(), "scanned projects");
        Ok(())
    }

    /// Creates a new project.
    ///
    /// Fails with [`RegistryError::DuplicateName`] without touching the
    /// existing project. The directory name is a sanitized form of the name
    /// plus a timestamp, so renames never have to move files.
    pub fn create(&mut self, name: &str, description: &str) -> Result<&Project, RegistryError> {
        let name = name.trim();
        if self.get(name).is_some() {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        let safe_name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe_name = if safe_name.is_empty() {
            format!("project_{}", Utc::now().timestamp())
        } else {
            safe_name
        };

        let dir_name = format!("{}_{}", safe_name, Utc::now().format("%Y%m%d_%H%M%S"));
        let dir_path = self.base_dir.join(dir_name);

        let mut project = Project::new(name, dir_path)?;
        project.description = description.to_string();
        project.save()?;
        info!(name = %project.name, dir = %project.directory.display(), "created project");

        self.projects.push(project);
        Ok(self.projects.last().expect("just pushed"))
    }

    /// All projects in insertion order.
    pub fn list(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.name == name)
    }

    /// Like [`ProjectRegistry::get`] but unknown names are an error.
    pub fn info(&self, name: &str) -> Result<&Project, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Marks `name` as the active project, deactivating any other.
    pub fn set_active(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.get(name).is_none() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        for project in &mut self.projects {
            project.active = project.name == name;
        }
        Ok(())
    }

    /// The currently active project, if any.
    pub fn active(&self) -> Option<&Project> {
        self.projects.iter().find(|p| p.active)
    }

    /// Renames a project in place; the directory is not moved.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), RegistryError> {
        if self.get(new).is_some() {
            return Err(RegistryError::DuplicateName(new.to_string()));
        }
        let project = self
            .get_mut(old)
            .ok_or_else(|| RegistryError::NotFound(old.to_string()))?;
        project.name = new.to_string();
        project.save()?;
        Ok(())
    }

    /// Drops a project from tracking; `delete_files` also removes its
    /// directory. Removal is always an explicit user action.
    pub fn remove(&mut self, name: &str, delete_files: bool) -> Result<PathBuf, RegistryError> {
        let idx = self
            .projects
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let project = self.projects.remove(idx);
        if delete_files {
            fs::remove_dir_all(&project.directory)?;
        }
        info!(name = %name, deleted = delete_files, "removed project");
        Ok(project.directory)
    }

    /// Resolves `rel` against a project's root.
    ///
    /// Absolute paths and any `..` component are rejected so a resolved path
    /// can never escape the project directory.
    pub fn resolve_path(&self, name: &str, rel: &str) -> Result<PathBuf, RegistryError> {
        let project = self.info(name)?;
        let rel_path = Path::new(rel);
        if rel_path.is_absolute() {
            return Err(RegistryError::PathTraversal(rel.to_string()));
        }
        for component in rel_path.components() {
            match component {
                Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                    return Err(RegistryError::PathTraversal(rel.to_string()));
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }
        Ok(project.directory.join(rel_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_registry(name: &str) -> ProjectRegistry {
        let dir = std::env::temp_dir().join(format!("moku_reg_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        ProjectRegistry::new(dir).unwrap()
    }

    fn cleanup(registry: &ProjectRegistry) {
        let _ = fs::remove_dir_all(&registry.base_dir);
    }

    #[test]
    fn create_then_info_round_trips() {
        let mut registry = temp_registry("roundtrip");
        let dir = registry.create("demo", "a demo").unwrap().directory.clone();
        let project = registry.info("demo").unwrap();
        assert_eq!(project.name, "demo");
        assert_eq!(project.directory, dir);
        assert!(dir.exists());
        assert!(dir.join(crate::constants::PROJECT_META_FILENAME).exists());
        cleanup(&registry);
    }

    #[test]
    fn duplicate_create_fails_and_mutates_nothing() {
        let mut registry = temp_registry("dup");
        registry.create("demo", "first").unwrap();
        fs::write(
            registry.get("demo").unwrap().directory.join("a.txt"),
            "keep",
        )
        .unwrap();

        let err = registry.create("demo", "second").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
        assert_eq!(registry.list().len(), 1);
        let kept =
            fs::read_to_string(registry.get("demo").unwrap().directory.join("a.txt")).unwrap();
        assert_eq!(kept, "keep");
        cleanup(&registry);
    }

    #[test]
    fn list_keeps_insertion_order() {
        let mut registry = temp_registry("order");
        registry.create("bravo", "").unwrap();
        registry.create("alpha", "").unwrap();
        let names: Vec<_> = registry.list().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bravo", "alpha"]);
        cleanup(&registry);
    }

    #[test]
    fn at_most_one_active_project() {
        let mut registry = temp_registry("active");
        registry.create("one", "").unwrap();
        registry.create("two", "").unwrap();
        registry.set_active("one").unwrap();
        registry.set_active("two").unwrap();
        assert_eq!(registry.active().unwrap().name, "two");
        assert_eq!(registry.list().iter().filter(|p| p.active).count(), 1);
        assert!(matches!(
            registry.set_active("three"),
            Err(RegistryError::NotFound(_))
        ));
        cleanup(&registry);
    }

    #[test]
    fn resolve_path_rejects_traversal() {
        let mut registry = temp_registry("traversal");
        registry.create("demo", "").unwrap();

        for bad in ["../escape.txt", "a/../../b", "src/../..", "/etc/passwd"] {
            let err = registry.resolve_path("demo", bad).unwrap_err();
            assert!(
                matches!(err, RegistryError::PathTraversal(_)),
                "expected traversal rejection for {bad}"
            );
        }

        let ok = registry.resolve_path("demo", "src/main.py").unwrap();
        assert!(ok.starts_with(&registry.get("demo").unwrap().directory));
        cleanup(&registry);
    }

    #[test]
    fn rename_keeps_directory() {
        let mut registry = temp_registry("rename");
        let dir = registry.create("old", "").unwrap().directory.clone();
        registry.rename("old", "new").unwrap();
        assert!(registry.get("old").is_none());
        assert_eq!(registry.get("new").unwrap().directory, dir);
        cleanup(&registry);
    }

    #[test]
    fn remove_without_delete_leaves_files() {
        let mut registry = temp_registry("remove");
        let dir = registry.create("demo", "").unwrap().directory.clone();
        registry.remove("demo", false).unwrap();
        assert!(registry.get("demo").is_none());
        assert!(dir.exists());
        cleanup(&registry);
    }

    #[test]
    fn scan_skips_unreadable_project_metadata() {
        let mut registry = temp_registry("badmeta");
        registry.create("good", "").unwrap();

        let stray = registry.base_dir.join("stray");
        fs::create_dir_all(&stray).unwrap();
        fs::write(
            stray.join(crate::constants::PROJECT_META_FILENAME),
            "{not json",
        )
        .unwrap();

        registry.scan().unwrap();
        let names: Vec<_> = registry.list().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
        cleanup(&registry);
    }

    #[test]
    fn scan_rediscovers_saved_projects() {
        let mut registry = temp_registry("scan");
        registry.create("demo", "persisted").unwrap();
        let base = registry.base_dir.clone();

        let mut fresh = ProjectRegistry::new(base).unwrap();
        fresh.scan().unwrap();
        let project = fresh.info("demo").unwrap();
        assert_eq!(project.description, "persisted");
        cleanup(&fresh);
    }
}
