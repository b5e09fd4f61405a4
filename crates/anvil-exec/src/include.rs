//! Placeholder include contexts for local execution.
//!
//! Local execution resolves file-level dependencies by direct filesystem
//! access at the time a compile runs, so no advance discovery pass is
//! needed. These implementations exist because the action framework
//! requires every declared capability to have some registered
//! implementation; they are not approximations of real include scanning.

use crate::strategy::{IncludeExtractionContext, IncludeScanningContext};
use anvil_core::{Result, SpawnSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, write};

/// Include extraction that writes an empty artifact and always succeeds.
#[derive(Debug, Default)]
pub struct NoopIncludeExtraction;

#[async_trait]
impl IncludeExtractionContext for NoopIncludeExtraction {
    fn name(&self) -> &str {
        "local"
    }

    async fn extract_includes(&self, primary_output: &Path) -> Result<()> {
        if let Some(parent) = primary_output.parent() {
            create_dir_all(parent).await?;
        }
        write(primary_output, []).await?;
        Ok(())
    }
}

/// Include scanning that reports nothing discovered and never fails.
#[derive(Debug, Default)]
pub struct NoopIncludeScanning;

#[async_trait]
impl IncludeScanningContext for NoopIncludeScanning {
    fn name(&self) -> &str {
        "local"
    }

    async fn find_additional_inputs(&self, _spawn: &SpawnSpec) -> Result<Option<Vec<PathBuf>>> {
        Ok(None)
    }
}
