//! Role (persona) loading.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::ModelSpec;

/// Resolves the persona text for a model slot.
pub trait RoleLoader: Send + Sync {
    /// Role body for `spec`, or `None` when the spec has no role or the
    /// role cannot be found.
    fn load(&self, spec: &ModelSpec) -> Option<String>;
}

/// Reads roles from `<dir>/<role>.md`, `<dir>/<role>.txt` or `<dir>/<role>`.
#[derive(Debug, Clone)]
pub struct FileRoleLoader {
    dir: PathBuf,
}

impl FileRoleLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidates(&self, role: &str) -> [PathBuf; 3] {
        [
            self.dir.join(format!("{role}.md")),
            self.dir.join(format!("{role}.txt")),
            self.dir.join(role),
        ]
    }
}

impl RoleLoader for FileRoleLoader {
    fn load(&self, spec: &ModelSpec) -> Option<String> {
        let role = spec.role.as_deref()?;
        // Role names are file stems, never paths.
        if role.contains(['/', '\\']) || role.starts_with('.') {
            debug!(role, "Ignoring role with path separators");
            return None;
        }

        let body = self
            .candidates(role)
            .iter()
            .filter(|p| p.is_file())
            .find_map(|p| std::fs::read_to_string(p).ok())?;

        let body = body.trim();
        if body.is_empty() {
            None
        } else {
            Some(body.to_string())
        }
    }
}
