//! berkflow: Chef environment orchestration
//!
//! Runs commands and Chef Client across the nodes of an environment, upgrades
//! environments to the cookbook locks of an application release, installs
//! Berkshelf packages and publishes cookbook packages as GitHub releases.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
