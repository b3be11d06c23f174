//! Command-line interface definitions for the `hiveden` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `hiveden` binary.
#[derive(Debug, Parser)]
#[command(
    name = "hiveden",
    about = "Create, run, and snapshot Docker containers owned by hiveden",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Manage containers.
    #[command(subcommand, name = "containers", about = "Manage containers")]
    Containers(ContainersCommand),
}

/// Subcommands under `hiveden containers`.
#[derive(Debug, Subcommand)]
pub(crate) enum ContainersCommand {
    /// List containers known to the daemon.
    #[command(about = "List containers with their owner and uptime")]
    List(ListCommand),
    /// Create a container without starting it.
    #[command(about = "Create a container labelled as managed by hiveden")]
    Create(CreateCommand),
    /// Start a container.
    #[command(about = "Start a container")]
    Start(ContainerId),
    /// Stop a container.
    #[command(about = "Stop a container")]
    Stop(ContainerId),
    /// Remove a container.
    #[command(about = "Remove a container")]
    Remove(ContainerId),
    /// Create and start every container in a manifest.
    #[command(name = "run-all", about = "Create and start every container in a manifest")]
    RunAll(RunAllCommand),
    /// Write the managed containers to a manifest.
    #[command(about = "Export managed containers to a manifest")]
    Export(ExportCommand),
}

/// Arguments for `hiveden containers list`.
#[derive(Debug, Args)]
pub(crate) struct ListCommand {
    /// Include stopped containers.
    #[arg(long, short)]
    pub(crate) all: bool,
    /// Show only containers managed by hiveden.
    #[arg(long)]
    pub(crate) managed: bool,
}

/// Arguments for `hiveden containers create`.
#[derive(Debug, Args)]
pub(crate) struct CreateCommand {
    /// Image to create the container from.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: String,
    /// Container name; the daemon picks one when omitted.
    #[arg(long, value_name = "NAME", default_value = "")]
    pub(crate) name: String,
    /// Environment variable for the container, repeatable.
    #[arg(long = "env", short = 'e', value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub(crate) env: Vec<(String, String)>,
}

/// A container identifier or name.
#[derive(Debug, Args)]
pub(crate) struct ContainerId {
    /// Container identifier, identifier prefix, or name.
    #[arg(value_name = "ID")]
    pub(crate) id: String,
}

/// Arguments for `hiveden containers run-all`.
#[derive(Debug, Args)]
pub(crate) struct RunAllCommand {
    /// Manifest to apply; defaults to the configured `manifest_path`.
    #[arg(long, short, value_name = "PATH")]
    pub(crate) file: Option<String>,
    /// Remove everything this run created as soon as one entry fails.
    #[arg(long)]
    pub(crate) all_or_nothing: bool,
}

/// Arguments for `hiveden containers export`.
#[derive(Debug, Args)]
pub(crate) struct ExportCommand {
    /// Destination manifest; replaced when it exists.
    #[arg(long, short, value_name = "PATH")]
    pub(crate) file: String,
}

/// Splits `KEY=VALUE` at the first `=`; the value may itself contain `=`.
pub(crate) fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.trim().is_empty() {
        return Err(format!("environment variable name is empty in '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}
