//! Binary entry point for the hiveden CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;

use cli::{Cli, ContainersCommand, CreateCommand, ListCommand, RunAllCommand};
use hiveden::config::{ConfigError, HivedenConfig};
use hiveden::logging::{self, LoggingError};
use hiveden::manager::{ContainerRecord, LifecycleManager, short_id};
use hiveden::provision::{BatchProvisioner, ProvisionError, ProvisionOutcome, ProvisionReport, ProvisionPolicy};
use hiveden::{ContainerRuntime, DesiredContainerSpec, DockerRuntime, DockerRuntimeError, StateExporter};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error("docker error: {0}")]
    Runtime(#[from] DockerRuntimeError),
    #[error("{0}")]
    Lifecycle(String),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("{0}")]
    Export(String),
    #[error("{failed} of {total} containers failed to provision")]
    PartialFailure { failed: usize, total: usize },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = HivedenConfig::load_without_cli_args()?;
    config.validate()?;
    logging::init(&config.log_level)?;

    let runtime = DockerRuntime::from_config(&config)?;
    let manager = LifecycleManager::new(runtime);
    let mut stdout = io::stdout();
    match cli {
        Cli::Containers(command) => dispatch(&manager, &config, command, &mut stdout).await,
    }
}

async fn dispatch<R, W>(
    manager: &LifecycleManager<R>,
    config: &HivedenConfig,
    command: ContainersCommand,
    out: &mut W,
) -> Result<(), CliError>
where
    R: ContainerRuntime,
    W: Write,
{
    match command {
        ContainersCommand::List(args) => list(manager, &args, out).await,
        ContainersCommand::Create(args) => {
            let id = manager
                .create(&desired_spec(args))
                .await
                .map_err(|err| CliError::Lifecycle(err.to_string()))?;
            writeln!(out, "{id}")?;
            Ok(())
        }
        ContainersCommand::Start(target) => {
            manager
                .start(&target.id)
                .await
                .map_err(|err| CliError::Lifecycle(err.to_string()))?;
            writeln!(out, "started {}", target.id)?;
            Ok(())
        }
        ContainersCommand::Stop(target) => {
            manager
                .stop(&target.id)
                .await
                .map_err(|err| CliError::Lifecycle(err.to_string()))?;
            writeln!(out, "stopped {}", target.id)?;
            Ok(())
        }
        ContainersCommand::Remove(target) => {
            manager
                .remove(&target.id)
                .await
                .map_err(|err| CliError::Lifecycle(err.to_string()))?;
            writeln!(out, "removed {}", target.id)?;
            Ok(())
        }
        ContainersCommand::RunAll(args) => run_all(manager, config, args, out).await,
        ContainersCommand::Export(args) => {
            let path = Utf8PathBuf::from(args.file);
            let count = StateExporter::new(manager)
                .export_to(&path)
                .await
                .map_err(|err| CliError::Export(err.to_string()))?;
            writeln!(out, "exported {count} containers to {path}")?;
            Ok(())
        }
    }
}

async fn list<R: ContainerRuntime, W: Write>(
    manager: &LifecycleManager<R>,
    args: &ListCommand,
    out: &mut W,
) -> Result<(), CliError> {
    let records = if args.managed {
        manager.list_managed(args.all).await
    } else {
        manager.list(args.all).await
    }
    .map_err(|err| CliError::Lifecycle(err.to_string()))?;

    for record in &records {
        writeln!(out, "{}", render_record(record))?;
    }
    Ok(())
}

async fn run_all<R: ContainerRuntime, W: Write>(
    manager: &LifecycleManager<R>,
    config: &HivedenConfig,
    args: RunAllCommand,
    out: &mut W,
) -> Result<(), CliError> {
    let path = Utf8PathBuf::from(args.file.unwrap_or_else(|| config.manifest_path.clone()));
    let policy = if args.all_or_nothing {
        ProvisionPolicy::AllOrNothing
    } else {
        config.provision_policy()
    };
    let report = BatchProvisioner::new(manager)
        .with_policy(policy)
        .provision_manifest(&path)
        .await?;
    write_report(out, &report)?;

    match report.failed() {
        0 => Ok(()),
        failed => Err(CliError::PartialFailure {
            failed,
            total: report.results().len(),
        }),
    }
}

fn desired_spec(args: CreateCommand) -> DesiredContainerSpec {
    args.env
        .into_iter()
        .fold(
            DesiredContainerSpec::new(args.image).with_name(args.name),
            |spec, (key, value)| spec.with_env(key, value),
        )
}

fn render_record(record: &ContainerRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        record.id, record.name, record.image, record.state, record.uptime, record.managed_by
    )
}

fn write_report(mut out: impl Write, report: &ProvisionReport) -> io::Result<()> {
    for result in report.results() {
        let label = result
            .spec
            .requested_name()
            .unwrap_or(result.spec.image.as_str());
        match &result.outcome {
            ProvisionOutcome::Started { id } => {
                writeln!(out, "{label}: started {}", short_id(id))?;
            }
            ProvisionOutcome::CreateFailed { error } => {
                writeln!(out, "{label}: create failed: {error}")?;
            }
            ProvisionOutcome::StartFailed { id, error } => {
                writeln!(out, "{label}: created {} but start failed: {error}", short_id(id))?;
            }
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
