//! Logging bootstrap shared by the binaries.

use anyhow::anyhow;
use orcatrack_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
pub fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|err| anyhow!("invalid log level '{}': {}", settings.level, err)),
    }
}

/// Install the global tracing subscriber. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;

    let result = match settings.log_format {
        LogFormat::Pretty => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
    };
    result.map_err(|err| anyhow!("failed to install tracing subscriber: {}", err))?;

    tracing::debug!(
        target: "orcatrack-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}
