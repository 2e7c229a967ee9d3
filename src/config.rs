//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Berkshelf config: `$BERKSHELF_PATH/config.json` (default `~/.berkshelf/config.json`)
//! 3. berkflow config: `$XDG_CONFIG_HOME/berkflow/berkflow.toml`, or the file given by `--config`
//! 4. Environment variables: `BERKFLOW_*` prefix, `__` between sections

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Chef Server identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ChefConfig {
    /// Organization URL, e.g. `https://chef.example.com/organizations/acme`
    pub chef_server_url: String,
    /// Client name used to sign requests
    pub node_name: String,
    /// Path to the client's private key (PEM)
    pub client_key: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SslConfig {
    pub verify: bool,
}

impl Default for SslConfig {
    fn default() -> Self {
        Self { verify: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SshConfig {
    /// Passed to `ssh -o ConnectTimeout`
    pub connect_timeout_secs: u64,
    /// Per-node command deadline, unlimited when unset
    pub command_timeout_secs: Option<u64>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            command_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FanOutConfig {
    /// Worker threads used for per-node operations
    pub max_concurrency: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self { max_concurrency: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".into(),
        }
    }
}

/// Unified configuration for berkflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub chef: ChefConfig,
    pub ssl: SslConfig,
    pub ssh: SshConfig,
    pub fanout: FanOutConfig,
    pub github: GithubConfig,
    /// Root directory for per-node result logs
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chef: ChefConfig::default(),
            ssl: SslConfig::default(),
            ssh: SshConfig::default(),
            fanout: FanOutConfig::default(),
            github: GithubConfig::default(),
            output_dir: PathBuf::from("berkflow_out"),
        }
    }
}

/// Get the Berkshelf config file (`$BERKSHELF_PATH/config.json`).
pub fn berkshelf_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("BERKSHELF_PATH") {
        return Some(PathBuf::from(expand(&dir)).join("config.json"));
    }
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".berkshelf").join("config.json"))
}

/// Get the XDG config directory for berkflow.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "berkflow").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("berkflow.toml"))
}

fn expand(raw: &str) -> String {
    shellexpand::full(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// `explicit` replaces the global berkflow config file and must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        let berkshelf = berkshelf_config_path();
        match explicit {
            Some(path) => Self::load_from(berkshelf.as_deref(), Some(path), true),
            None => Self::load_from(berkshelf.as_deref(), global_config_path().as_deref(), false),
        }
    }

    /// Load from explicit file locations; missing optional files are skipped.
    pub fn load_from(
        berkshelf: Option<&Path>,
        overlay: Option<&Path>,
        overlay_required: bool,
    ) -> Result<Self, ApplicationError> {
        let mut builder = Config::builder();

        if let Some(path) = berkshelf {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Json)
                    .required(false),
            );
        }
        if let Some(path) = overlay {
            if overlay_required && !path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            builder = builder.add_source(File::from(path).required(overlay_required));
        }

        builder = builder.add_source(
            Environment::with_prefix("BERKFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;
        let mut settings: Self = config.try_deserialize().map_err(config_err)?;
        settings.expand_paths();
        Ok(settings)
    }

    /// Expand `~` and `$VAR` in path-like fields.
    fn expand_paths(&mut self) {
        if !self.chef.client_key.as_os_str().is_empty() {
            self.chef.client_key =
                PathBuf::from(expand(self.chef.client_key.to_string_lossy().as_ref()));
        }
        self.output_dir = PathBuf::from(expand(self.output_dir.to_string_lossy().as_ref()));
    }

    /// Check that the Chef Server identity is complete.
    pub fn validate_chef(&self) -> Result<(), ApplicationError> {
        let missing = |field: &str| ApplicationError::Config {
            message: format!("chef.{field} is not configured"),
        };
        if self.chef.chef_server_url.trim().is_empty() {
            return Err(missing("chef_server_url"));
        }
        if self.chef.node_name.trim().is_empty() {
            return Err(missing("node_name"));
        }
        if self.chef.client_key.as_os_str().is_empty() {
            return Err(missing("client_key"));
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# berkflow configuration
#
# Locations (by precedence, lowest to highest):
#   Berkshelf: ~/.berkshelf/config.json      (chef + ssl sections are read from here)
#   Global:    ~/.config/berkflow/berkflow.toml (or --config PATH)
#   Env:       BERKFLOW_* environment variables, e.g. BERKFLOW_CHEF__NODE_NAME

# Root directory for per-node stdout/stderr logs
# output_dir = "berkflow_out"

[chef]
# chef_server_url = "https://chef.example.com/organizations/acme"
# node_name = "deploy"
# client_key = "~/.chef/deploy.pem"

[ssl]
# verify = true

[ssh]
# connect_timeout_secs = 10
# command_timeout_secs = 1800

[fanout]
# max_concurrency = 16

[github]
# api_url = "https://api.github.com"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_config_files_when_loading_then_uses_defaults() {
        let settings = Settings::load_from(None, None, false).expect("load defaults");
        assert!(settings.ssl.verify);
        assert_eq!(settings.fanout.max_concurrency, 16);
        assert_eq!(settings.output_dir, PathBuf::from("berkflow_out"));
        assert!(settings.ssh.command_timeout_secs.is_none());
    }

    #[test]
    fn given_tilde_in_client_key_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings::default();
        settings.chef.client_key = PathBuf::from("~/.chef/deploy.pem");

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let key = settings.chef.client_key.to_string_lossy();
        assert!(key.starts_with(&home), "client_key should start with home: {key}");
        assert!(!key.contains('~'));
    }

    #[test]
    fn given_incomplete_chef_config_when_validate_then_names_missing_field() {
        let mut settings = Settings::default();
        settings.chef.chef_server_url = "https://chef.example.com".into();

        let err = settings.validate_chef().unwrap_err();
        assert!(matches!(err, ApplicationError::Config { .. }));
        assert_eq!(err.to_string(), "config error: chef.node_name is not configured");
    }

    #[test]
    fn given_template_when_parsed_then_is_valid_toml() {
        let parsed: Settings = toml::from_str(&Settings::template()).expect("template parses");
        assert_eq!(parsed, Settings::default());
    }
}
