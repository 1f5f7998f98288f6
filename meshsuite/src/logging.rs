//! Logging bootstrap.

use std::str::FromStr;

use meshsuite_core::{MeshError, MeshResult};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Parse a log level such as `"info"` or `"DEBUG"`.
pub fn parse_log_level(level: &str) -> MeshResult<LevelFilter> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| MeshError::configuration("LOG_LEVEL", format!("unknown log level '{level}'")))
}

/// Install the global subscriber at `level`.
///
/// `RUST_LOG` directives, when set, refine the filter. Installing twice is
/// not an error; the first subscriber stays.
pub fn init_logging(level: &str) -> MeshResult<()> {
    let level = parse_log_level(level)?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
    if installed.is_err() {
        tracing::debug!("a global subscriber is already installed");
    }
    Ok(())
}
