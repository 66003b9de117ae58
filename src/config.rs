use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::device::CallTimeouts;

const DEFAULT_CONFIG_NAME: &str = "azsphere-manufacturing";
const ENV_PREFIX: &str = "AZSPHERE_MFG";

/// Settings for the tool itself, as opposed to the device being provisioned
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Vendor CLI to invoke
    pub azsphere_path: String,
    /// Attached device to target; passed as `--device` on every call
    pub device: Option<String>,
    pub timeouts: TimeoutConfig,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit logs as JSON lines instead of plain text
    pub log_json: bool,
}

/// Per-call upper bounds, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub query: u64,
    pub mutation: u64,
    pub sideload: u64,
    pub recovery: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            query: 60,
            mutation: 120,
            sideload: 300,
            recovery: 900, // recovery can take 10+ minutes
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            azsphere_path: "azsphere".to_string(),
            device: None,
            timeouts: TimeoutConfig::default(),
            log_level: "warn".to_string(),
            log_json: false,
        }
    }
}

impl ToolConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`azsphere-manufacturing.toml`, or `path` when given)
    /// 3. Environment variables (prefixed with `AZSPHERE_MFG_`, `__` between nested keys)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                // An explicitly named file must exist
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ToolConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::debug!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn call_timeouts(&self) -> CallTimeouts {
        CallTimeouts {
            query: Duration::from_secs(self.timeouts.query),
            mutation: Duration::from_secs(self.timeouts.mutation),
            sideload: Duration::from_secs(self.timeouts.sideload),
            recovery: Duration::from_secs(self.timeouts.recovery),
        }
    }
}
