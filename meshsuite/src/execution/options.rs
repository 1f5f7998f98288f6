//! Process options, read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::lifecycle::DEFAULT_SUITE_EXECUTION_VOLUME;

/// Default address the test suite server listens on.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:1323";

/// Options of a test suite process.
///
/// Every option can be given as a flag or through its environment variable;
/// the API container sets the variables when it launches the suite.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Test suite driven by an API container", long_about = None)]
pub struct ExecutorOptions {
    /// JSON object of suite-specific parameters
    #[arg(long, default_value = "{}", env = "CUSTOM_PARAMS_JSON")]
    pub custom_params_json: String,

    /// Address of the API container; absent means metadata-only mode
    #[arg(long, env = "API_CONTAINER_SOCKET")]
    pub api_container_socket: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Port a debugger may attach on
    #[arg(long, env = "DEBUGGER_PORT")]
    pub debugger_port: Option<u16>,

    /// Address the test suite server listens on
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR, env = "TEST_SUITE_LISTEN_ADDR")]
    pub listen_addr: SocketAddr,

    /// Where the suite execution volume is mounted in this process
    #[arg(
        long,
        default_value = DEFAULT_SUITE_EXECUTION_VOLUME,
        env = "SUITE_EXECUTION_VOLUME_MOUNTPOINT"
    )]
    pub suite_execution_volume: PathBuf,
}
