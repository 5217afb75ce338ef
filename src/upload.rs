use std::path::{Path, PathBuf};

use log::debug;

use crate::error::WorkflowError;

/// A file received from the browser, held in memory until persisted.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name as supplied by the client.
    pub name: String,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Name safe to join onto a directory: the last path component only.
    ///
    /// Browsers may send full client paths (`C:\data\MMSTA.xlsx`), so both
    /// separators are treated as boundaries.
    pub fn stored_name(&self) -> Result<&str, WorkflowError> {
        let name = self
            .name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();

        if name.is_empty() || name == "." || name == ".." {
            return Err(WorkflowError::InvalidFileName(self.name.clone()));
        }
        Ok(name)
    }

    /// Write the bytes verbatim to `<dir>/<name>`, creating `dir` if needed.
    ///
    /// An existing file with the same name is overwritten. Returns the
    /// absolute path of the written file.
    pub async fn persist(&self, dir: &Path) -> Result<PathBuf, WorkflowError> {
        let name = self.stored_name()?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| WorkflowError::storage(dir, e))?;

        let path = dir.join(name);
        tokio::fs::write(&path, &self.content)
            .await
            .map_err(|e| WorkflowError::storage(&path, e))?;

        let path = tokio::fs::canonicalize(&path)
            .await
            .map_err(|e| WorkflowError::storage(&path, e))?;
        debug!("stored upload {} ({} bytes)", path.display(), self.content.len());

        Ok(path)
    }
}
