//! Tests for the placeholder include contexts and the file-write
//! strategy.
#![allow(
    clippy::expect_used,
    clippy::min_ident_chars,
    clippy::absolute_paths,
    reason = "Test code prioritizes clarity"
)]

use anvil_core::SpawnSpec;
use anvil_exec::{
    FileWriteContext, FileWriteStrategy, IncludeExtractionContext, IncludeScanningContext,
    NoopIncludeExtraction, NoopIncludeScanning,
};
use std::path::Path;

#[tokio::test]
async fn test_extraction_writes_a_zero_length_artifact() {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let artifact = scratch.path().join("deep/nested/compile.includes");

    NoopIncludeExtraction
        .extract_includes(&artifact)
        .await
        .expect("extraction never fails");

    let metadata = tokio::fs::metadata(&artifact)
        .await
        .expect("artifact exists");
    assert_eq!(metadata.len(), 0, "artifact must be empty");
}

#[tokio::test]
async fn test_extraction_truncates_stale_artifacts() {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let artifact = scratch.path().join("compile.includes");
    tokio::fs::write(&artifact, b"stale contents")
        .await
        .expect("seed stale artifact");

    NoopIncludeExtraction
        .extract_includes(&artifact)
        .await
        .expect("extraction never fails");
    let metadata = tokio::fs::metadata(&artifact)
        .await
        .expect("artifact exists");
    assert_eq!(metadata.len(), 0);
}

#[tokio::test]
async fn test_scanning_discovers_nothing() {
    let spawn = SpawnSpec::new("CppCompile", vec!["cc".to_owned(), "-c".to_owned()]);
    let discovered = NoopIncludeScanning
        .find_additional_inputs(&spawn)
        .await
        .expect("scanning never fails");
    assert!(discovered.is_none());
}

#[tokio::test]
async fn test_file_write_places_contents_under_exec_root() {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let strategy = FileWriteStrategy::new(scratch.path().to_path_buf());

    strategy
        .write_output(Path::new("out/generated/params"), b"--flag=1\n")
        .await
        .expect("write succeeds");

    let written = tokio::fs::read(scratch.path().join("out/generated/params"))
        .await
        .expect("output exists");
    assert_eq!(written, b"--flag=1\n");
}
