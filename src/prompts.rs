//! Prompt file access and bound-value substitution.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::PromptError;

/// Markup type of a prompt source, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Pml,
    Markdown,
    Text,
}

impl PromptKind {
    /// Infer the kind from a source path. Anything but `.xml`, `.md`, or
    /// `.txt` is a configuration error.
    pub fn from_path(path: &Path) -> Result<Self, PromptError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("xml") => Ok(Self::Pml),
            Some("md") => Ok(Self::Markdown),
            Some("txt") => Ok(Self::Text),
            _ => Err(PromptError::UnsupportedExtension {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Placeholder replaced with a job's bound value before dispatch.
pub const BIND_PLACEHOLDER: &str = "{{result}}";

/// Substitute the bound value into prompt text.
pub fn substitute_bound_value(text: &str, value: &str) -> String {
    text.replace(BIND_PLACEHOLDER, value)
}

/// Reads raw prompt content given the workflow file and a source path
/// relative to the workflow's directory.
#[async_trait]
pub trait PromptReader: Send + Sync {
    async fn read(&self, workflow_path: &Path, source_file: &str) -> Result<String, PromptError>;
}

/// Filesystem-backed prompt reader.
pub struct FsPromptReader;

#[async_trait]
impl PromptReader for FsPromptReader {
    async fn read(&self, workflow_path: &Path, source_file: &str) -> Result<String, PromptError> {
        let dir = workflow_path.parent().unwrap_or_else(|| Path::new("."));
        let full: PathBuf = dir.join(source_file);
        PromptKind::from_path(&full)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PromptError::NotFound { path: full })
            }
            Err(e) => Err(PromptError::Io(e)),
        }
    }
}
