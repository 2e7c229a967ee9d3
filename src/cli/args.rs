//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Chef orchestration: run commands, converge and upgrade environments, ship cookbook releases
#[derive(Parser, Debug)]
#[command(name = "berkflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Config file (default: ~/.config/berkflow/berkflow.toml)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// SSH user (default: $USER)
    #[arg(short = 'u', long, global = true, env = "BERKFLOW_SSH_USER")]
    pub ssh_user: Option<String>,

    /// SSH password (uses sshpass)
    #[arg(short = 'p', long, global = true, env = "BERKFLOW_SSH_PASSWORD", hide_env_values = true)]
    pub ssh_password: Option<String>,

    /// SSH private key
    #[arg(short = 'P', long, global = true, env = "BERKFLOW_SSH_KEY", value_hint = ValueHint::FilePath)]
    pub ssh_key: Option<PathBuf>,

    /// Directory for per-node logs (default: berkflow_out)
    #[arg(short, long, global = true, value_hint = ValueHint::DirPath)]
    pub out_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a shell command on every node in an environment
    #[command(alias = "exec")]
    Execute {
        /// Chef environment
        environment: String,
        /// Command to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
        /// Run the command with sudo
        #[arg(long)]
        sudo: bool,
    },

    /// Run Chef Client on every node in an environment
    #[command(name = "run_chef", alias = "run-chef")]
    RunChef {
        /// Chef environment
        environment: String,
    },

    /// Lock an environment to an application version and converge it
    #[command(alias = "up")]
    Upgrade {
        /// Chef environment
        environment: String,
        /// Application cookbook
        application: String,
        /// Version to upgrade to (SemVer or "latest")
        #[arg(value_name = "VERSION", default_value = crate::domain::LATEST)]
        cookbook_version: String,
        /// Upgrade even if the environment is already at this version
        #[arg(short, long)]
        force: bool,
    },

    /// Upload the cookbooks of a Berkshelf package to the Chef Server
    #[command(alias = "in")]
    Install {
        /// Package URL or path
        #[arg(value_hint = ValueHint::AnyPath)]
        source: String,
        /// Overwrite frozen cookbooks
        #[arg(short, long)]
        force: bool,
    },

    /// Package the cookbook in the current directory and attach it to a GitHub release
    Release {
        /// Berksfile to package
        #[arg(short, long, default_value = "Berksfile", value_hint = ValueHint::FilePath)]
        berksfile: PathBuf,
        /// GitHub access token
        #[arg(short = 't', long = "github-token", env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Show version
    #[command(alias = "ver")]
    Version,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show config paths
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn given_run_chef_alias_when_parsing_then_maps_to_run_chef() {
        let cli = Cli::try_parse_from(["berkflow", "run-chef", "production"]).unwrap();
        assert!(matches!(cli.command, Commands::RunChef { environment } if environment == "production"));
    }

    #[test]
    fn given_upgrade_without_version_when_parsing_then_defaults_to_latest() {
        let cli = Cli::try_parse_from(["berkflow", "up", "production", "myapp"]).unwrap();
        match cli.command {
            Commands::Upgrade {
                cookbook_version,
                force,
                ..
            } => {
                assert_eq!(cookbook_version, "latest");
                assert!(!force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn given_upgrade_with_version_when_parsing_then_keeps_it_apart_from_version_flag() {
        let cli = Cli::try_parse_from(["berkflow", "upgrade", "production", "myapp", "1.2.3", "-f"])
            .unwrap();
        match cli.command {
            Commands::Upgrade {
                cookbook_version,
                force,
                ..
            } => {
                assert_eq!(cookbook_version, "1.2.3");
                assert!(force);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let err = Cli::try_parse_from(["berkflow", "upgrade", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn given_exec_with_flags_when_parsing_then_keeps_command_words() {
        let cli =
            Cli::try_parse_from(["berkflow", "exec", "--sudo", "staging", "ls", "-la", "/tmp"]).unwrap();
        match cli.command {
            Commands::Execute {
                environment,
                command,
                sudo,
            } => {
                assert_eq!(environment, "staging");
                assert_eq!(command, vec!["ls", "-la", "/tmp"]);
                assert!(sudo);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
