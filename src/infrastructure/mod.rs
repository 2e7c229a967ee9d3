//! Infrastructure layer: I/O implementations and DI container
//!
//! This layer implements the I/O boundary traits (Chef Server, SSH, GitHub,
//! HTTP downloads) and wires up services.

pub mod chef;
pub mod di;
pub mod error;
pub mod github;
pub mod http;
pub mod ssh;
pub mod traits;

pub use error::{ApiError, InfraError, InfraResult};
