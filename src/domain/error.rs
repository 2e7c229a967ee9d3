//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent malformed input detected before any remote call.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid version: {0}. Provide a valid SemVer version string. (i.e. 1.2.3).")]
    InvalidVersion(String),

    #[error("invalid lockfile: {0}")]
    InvalidLockfile(String),

    #[error("invalid cookbook metadata: {message}")]
    InvalidMetadata { message: String },
}
