use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, Instrument};

use azsphere_manufacturing::cli::commands::complete::CompleteCommand;
use azsphere_manufacturing::cli::commands::prepare::PrepareCommand;
use azsphere_manufacturing::cli::commands::{connect, Command, RunStatus};
use azsphere_manufacturing::cli::{Cli, Commands};
use azsphere_manufacturing::config::ToolConfig;
use azsphere_manufacturing::shutdown::ShutdownCoordinator;
use azsphere_manufacturing::telemetry::{create_run_span, generate_correlation_id, init_telemetry};
use azsphere_manufacturing::workflows::ConsoleObserver;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("❌ {e:#}");
            RunStatus::Failed.into()
        }
    }
}

fn run(cli: Cli) -> Result<RunStatus> {
    ToolConfig::load_env_file()?;
    let mut tool = ToolConfig::load(cli.tool_config.as_deref())?;
    if let Some(path) = cli.azsphere_path {
        tool.azsphere_path = path;
    }
    if cli.device.is_some() {
        tool.device = cli.device;
    }
    if cli.verbose {
        tool.log_level = "debug".to_string();
    }

    init_telemetry(&tool.log_level, tool.log_json)?;
    debug!(?tool, "Tool configuration loaded");

    tokio::runtime::Runtime::new()?.block_on(async {
        let shutdown = ShutdownCoordinator::new();
        shutdown.install_signal_handlers();

        let session = connect(&tool, shutdown.token());
        let observer = ConsoleObserver;
        let correlation_id = generate_correlation_id();
        let span = create_run_span(cli.command.name(), tool.device.as_deref(), &correlation_id);

        let status = match cli.command {
            Commands::Prepare { device_config } => {
                PrepareCommand::new(device_config)
                    .execute(&session, &observer)
                    .instrument(span)
                    .await
            }
            Commands::Complete { device_config } => {
                CompleteCommand::new(device_config)
                    .execute(&session, &observer)
                    .instrument(span)
                    .await
            }
        };

        shutdown.shutdown();
        status
    })
}
