pub mod config;
pub mod error;
pub mod preferences;

pub use config::{
    Config, GeolocationConfig, GeolocationProvider, Unit, ValidationResult, WeatherConfig,
};
pub use error::{
    AppError, ConfigError, LocationError, NetworkError, ReqwestErrorExt, WeatherError,
};
pub use preferences::{FilePreferences, MemoryPreferences, PreferenceKey, PreferenceStore};

use anyhow::Result;

/// Initialize logging for the application.
///
/// Logs go to stderr so the dashboard printed on stdout stays readable.
/// Verbosity is controlled with `RUST_LOG` (default: `warn`).
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::debug!("SkyCast core initialized");
    Ok(())
}
