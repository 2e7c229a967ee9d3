//! Domain layer: entities and pure parsing logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod cookbook;
pub mod entities;
pub mod error;
pub mod lockfile;
pub mod metadata;
pub mod version;

pub use cookbook::{Cookbook, CookbookFile, Segment};
pub use entities::*;
pub use error::DomainError;
pub use lockfile::{Lockfile, LOCKFILE_NAME};
pub use metadata::{CookbookMetadata, METADATA_JSON, METADATA_RB};
pub use version::{locked_version, validate_version, VersionSpec, LATEST};
