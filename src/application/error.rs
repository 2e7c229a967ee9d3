//! Application-level errors (wraps domain errors)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::DomainError;
use crate::infrastructure::ApiError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("No versions of Cookbook found: {0}.")]
    NoCookbookVersions(String),

    #[error("Cookbook not found: {name} ({version}).")]
    CookbookNotFound { name: String, version: String },

    #[error("{name} ({version}) did not contain a Berksfile.lock")]
    MissingLockfile { name: String, version: String },

    #[error("Failed to apply Berksfile.lock to {environment}.")]
    LockApplyFailed {
        environment: String,
        #[source]
        source: ApiError,
    },

    #[error("Package not found: {}.", .0.display())]
    PackageNotFound(PathBuf),

    #[error("Error retrieving remote package: {0}.")]
    PackageDownload(#[source] ApiError),

    #[error("Error extracting package: {0}")]
    PackageExtract(String),

    #[error("Package did not contain a 'cookbooks' directory.")]
    MissingCookbooksDir,

    #[error("could not determine GitHub repository from git remote 'origin'")]
    UnknownRepository,

    #[error("release {0} exists but could not be found")]
    ReleaseNotFound(String),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Remote(#[from] ApiError),

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
