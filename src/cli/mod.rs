use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "azsphere-manufacturing")]
#[command(about = "Prepare and complete Azure Sphere devices on the manufacturing line")]
#[command(
    long_about = "Sideloads production images to the attached device and configures it for OTA \
                  updates ('prepare'), then verifies the device is ready and moves it to its \
                  final manufacturing state ('complete')."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the azsphere CLI
    #[arg(long, global = true, help = "Vendor CLI to invoke (default: azsphere on PATH)")]
    pub azsphere_path: Option<String>,

    /// Attached device to target
    #[arg(
        long,
        global = true,
        help = "Device IP or connection path, passed to every azsphere call"
    )]
    pub device: Option<String>,

    /// Tool settings file
    #[arg(
        long,
        global = true,
        help = "Settings file (default: ./azsphere-manufacturing.toml if present)"
    )]
    pub tool_config: Option<PathBuf>,

    /// Show debug logs
    #[arg(long, short = 'v', global = true, help = "Log every device call and state transition")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sideload production images to the attached device and configure it for OTA updates
    Prepare {
        /// Expected device configuration
        #[arg(long, help = "Path to the device config JSON file")]
        device_config: PathBuf,
    },
    /// Complete the attached device after a successful check for device readiness
    Complete {
        /// Expected device configuration
        #[arg(long, help = "Path to the device config JSON file")]
        device_config: PathBuf,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Prepare { .. } => "prepare",
            Commands::Complete { .. } => "complete",
        }
    }
}
