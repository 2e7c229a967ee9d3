//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (ChefServer, NodeRunner, etc.)
//! but are themselves concrete structs, not traits.

mod deploy;
mod fanout;
mod install;
mod release;

pub use deploy::{DeployService, FanOutResult, UpgradeResult, CHEF_CLIENT};
pub use fanout::FanOutService;
pub use install::{is_url, InstallService};
pub use release::{parse_repository, ReleaseReport, ReleaseService, ASSET_NAME};

/// Progress notifications emitted while a service runs.
///
/// Services never print; the CLI turns these into status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<'a> {
    DiscoveringNodes { environment: &'a str },
    Dispatching { command: &'a str, count: usize },
    Upgrading { environment: &'a str, version: &'a str },
    ApplyingLocks { environment: &'a str },
    UploadingCookbook { name: &'a str, version: &'a str },
    UploadingAsset { file: &'a str },
}
