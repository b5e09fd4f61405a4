//! Materialization of declared file contents as output artifacts.

use crate::strategy::FileWriteContext;
use anvil_core::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, write};

/// Writes an action's declared contents under the execution root.
#[derive(Debug)]
pub struct FileWriteStrategy {
    exec_root: PathBuf,
}

impl FileWriteStrategy {
    /// A file-write strategy rooted at `exec_root`.
    pub fn new(exec_root: PathBuf) -> Self {
        Self { exec_root }
    }
}

#[async_trait]
impl FileWriteContext for FileWriteStrategy {
    fn name(&self) -> &str {
        "file-write"
    }

    async fn write_output(&self, output: &Path, contents: &[u8]) -> Result<()> {
        let path = self.exec_root.join(output);
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        write(&path, contents).await?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote output file");
        Ok(())
    }
}
