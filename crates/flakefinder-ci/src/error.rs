//! Error types for CI history imports

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiImportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for CI history imports
pub type Result<T> = std::result::Result<T, CiImportError>;
