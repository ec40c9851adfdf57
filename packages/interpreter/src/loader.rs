use crate::error::{InterpretError, InterpretResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source of templates for `@import` and [`crate::Interpreter::render_template`]
pub trait TemplateLoader {
    fn load(&self, path: &str) -> InterpretResult<String>;
}

/// Loads templates from disk, relative to a root directory
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, path: &str) -> InterpretResult<String> {
        let resolved = self.resolve(path);
        std::fs::read_to_string(&resolved).map_err(|err| InterpretError::Load {
            path: resolved.display().to_string(),
            message: err.to_string(),
        })
    }
}

/// In-memory templates for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(path.into(), source.into());
    }
}

impl TemplateLoader for MemoryLoader {
    fn load(&self, path: &str) -> InterpretResult<String> {
        self.templates
            .get(path)
            .cloned()
            .ok_or_else(|| InterpretError::Load {
                path: path.to_string(),
                message: "no such template".to_string(),
            })
    }
}
