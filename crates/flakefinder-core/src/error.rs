//! Error types for detection operations

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Test path does not exist: {0}")]
    TestPathMissing(PathBuf),

    #[error("Failed to spawn test runner: {0}")]
    RunnerSpawn(#[from] std::io::Error),

    #[error("Temp directory error: {0}")]
    TempDir(String),
}

/// Result type for detection operations
pub type Result<T> = std::result::Result<T, DetectError>;
