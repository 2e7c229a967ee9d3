//! Command dispatch: builds services from settings and reports progress

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{FanOutResult, Progress, UpgradeResult, CHEF_CLIENT};
use crate::application::{ApplicationError, IoResultExt};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{berkshelf_config_path, global_config_path, Settings};
use crate::domain::validate_version;
use crate::exitcode;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::ssh::SshCredentials;
use crate::infrastructure::InfraError;

/// Execute a CLI command, returning the process exit code.
pub fn execute_command(cli: &Cli) -> CliResult<i32> {
    match &cli.command {
        Commands::Execute {
            environment,
            command,
            sudo,
        } => cmd_execute(cli, environment, &command.join(" "), *sudo),
        Commands::RunChef { environment } => cmd_run_chef(cli, environment),
        Commands::Upgrade {
            environment,
            application,
            cookbook_version,
            force,
        } => cmd_upgrade(cli, environment, application, cookbook_version, *force),
        Commands::Install { source, force } => cmd_install(cli, source, *force),
        Commands::Release { berksfile, token } => cmd_release(cli, berksfile, token),
        Commands::Version => {
            output::info(env!("CARGO_PKG_VERSION"));
            Ok(exitcode::OK)
        }
        Commands::Config { command } => cmd_config(cli, command),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "berkflow", &mut io::stdout());
            Ok(exitcode::OK)
        }
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(out_dir) = &cli.out_dir {
        settings.output_dir = out_dir.clone();
    }
    debug!("load_settings: chef_server_url={}", settings.chef.chef_server_url);
    Ok(settings)
}

fn credentials(cli: &Cli) -> SshCredentials {
    SshCredentials {
        user: cli
            .ssh_user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_default(),
        password: cli.ssh_password.clone(),
        key: cli
            .ssh_key
            .as_ref()
            .map(|k| shellexpand::tilde(&k.to_string_lossy()).into_owned()),
    }
}

/// Turn service progress into status lines.
fn report(event: Progress) {
    match event {
        Progress::DiscoveringNodes { environment } => {
            output::info(&format!("Discovering nodes in {environment}..."))
        }
        Progress::Dispatching { command, count } if command == CHEF_CLIENT => {
            output::info(&format!("Running Chef Client on {count} nodes..."))
        }
        Progress::Dispatching { count, .. } => {
            output::info(&format!("Executing command on {count} nodes..."))
        }
        Progress::Upgrading {
            environment,
            version,
        } => output::info(&format!("Upgrading {environment} to {version}")),
        Progress::ApplyingLocks { environment } => {
            output::info(&format!("Applying cookbook locks to {environment}..."))
        }
        Progress::UploadingCookbook { name, version } => {
            output::info(&format!("Uploading {name} ({version})"))
        }
        Progress::UploadingAsset { file } => {
            output::info(&format!("Uploading {file} to Github..."))
        }
    }
}

/// Print the fan-out summary: "Successfully <done> on N nodes", "Failed to <failed> on N nodes".
fn report_fan_out(environment: &str, result: &FanOutResult, done: &str, failed: &str) -> i32 {
    match result {
        FanOutResult::NoNodes => output::info(&format!("No nodes in {environment}. Done.")),
        FanOutResult::Completed(summary) => {
            if summary.succeeded > 0 {
                output::success(&format!("Successfully {done} on {} nodes", summary.succeeded));
            }
            if summary.failed > 0 {
                output::error(&format!("Failed to {failed} on {} nodes", summary.failed));
            }
            output::info(&format!("Done. See {} for logs.", summary.log_dir.display()));
        }
    }
    result.exit_code()
}

#[instrument(skip(cli))]
fn cmd_execute(cli: &Cli, environment: &str, command: &str, sudo: bool) -> CliResult<i32> {
    let container = ServiceContainer::new(load_settings(cli)?);
    let service = container.deploy_service(credentials(cli))?;

    let result = service.execute(environment, command, sudo, &mut report)?;
    Ok(report_fan_out(
        environment,
        &result,
        "executed command",
        "execute command",
    ))
}

#[instrument(skip(cli))]
fn cmd_run_chef(cli: &Cli, environment: &str) -> CliResult<i32> {
    let container = ServiceContainer::new(load_settings(cli)?);
    let service = container.deploy_service(credentials(cli))?;

    let result = service.run_chef(environment, &mut report)?;
    Ok(report_fan_out(
        environment,
        &result,
        "ran Chef Client",
        "run Chef Client",
    ))
}

#[instrument(skip(cli))]
fn cmd_upgrade(
    cli: &Cli,
    environment: &str,
    application: &str,
    version: &str,
    force: bool,
) -> CliResult<i32> {
    // Reject malformed versions before any settings or network access
    let version = validate_version(version).map_err(ApplicationError::from)?;

    let container = ServiceContainer::new(load_settings(cli)?);
    let service = container.deploy_service(credentials(cli))?;

    let result = service.upgrade(environment, application, &version, force, &mut report)?;
    match &result {
        UpgradeResult::AlreadyAt(version) => {
            output::info(&format!("Environment already at {version}."));
            output::info("Done.");
        }
        UpgradeResult::Upgraded { chef_run, .. } => {
            report_fan_out(environment, chef_run, "ran Chef Client", "run Chef Client");
        }
    }
    Ok(result.exit_code())
}

#[instrument(skip(cli))]
fn cmd_install(cli: &Cli, source: &str, force: bool) -> CliResult<i32> {
    let container = ServiceContainer::new(load_settings(cli)?);
    let service = container.install_service()?;

    let uploaded = service.install(source, force, &mut report)?;
    output::info(&format!("Uploaded {uploaded} cookbooks."));
    output::info("Done.");
    Ok(exitcode::OK)
}

#[instrument(skip(cli, token))]
fn cmd_release(cli: &Cli, berksfile: &Path, token: &str) -> CliResult<i32> {
    if token.trim().is_empty() {
        return Err(CliError::InvalidArgs("GitHub token is empty".into()));
    }
    let container = ServiceContainer::new(load_settings(cli)?);
    let service = container.release_service(token)?;

    let cwd = std::env::current_dir().map_err(|e| InfraError::io("current directory", e))?;
    let released = service.release(&cwd, berksfile, &mut report)?;
    output::action(
        "Released",
        &format!(
            "{} {} ({})",
            released.repository,
            released.tag,
            released.package.display()
        ),
    );
    output::info("Done.");
    Ok(exitcode::OK)
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<i32> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            let show = |label: &str, path: Option<PathBuf>| match path {
                Some(p) => {
                    let state = if p.exists() { "" } else { " (not found)" };
                    output::detail(&format!("{label}: {}{state}", p.display()));
                }
                None => output::detail(&format!("{label}: (unavailable)")),
            };
            output::header("Config files");
            show("berkshelf", berkshelf_config_path());
            match &cli.config {
                Some(path) => show("berkflow", Some(path.clone())),
                None => show("berkflow", global_config_path()),
            }
        }
        ConfigCommands::Init { force } => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine config directory; pass --config".into())
                })?,
            };
            if path.exists() && !force {
                return Err(CliError::Usage(format!(
                    "config file already exists: {} (use --force to overwrite)",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_path_context("create config dir", parent)?;
            }
            std::fs::write(&path, Settings::template())
                .with_path_context("write config", &path)?;
            output::action("Created", &path.display());
        }
    }
    Ok(exitcode::OK)
}
