use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize structured logging on stderr.
///
/// stdout is reserved for operator-facing progress lines. `RUST_LOG` wins over
/// `default_level` when set.
pub fn init_telemetry(default_level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    tracing::debug!("Telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking every log line of one run
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping a whole prepare/complete invocation
pub fn create_run_span(command: &str, device: Option<&str>, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "provisioning_run",
        command = command,
        device = device,
        correlation.id = correlation_id,
    )
}
