pub mod cleanup;
pub mod config;
pub mod darts;
pub mod error;
pub mod file_handler;
pub mod job;
pub mod naming;
pub mod provenance;
pub mod reducer;
pub mod stats;
pub mod timing;
pub mod worker;

pub use error::*;
pub use naming::RunLayout;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins over the verbosity default.
pub fn init_tracing(service: &str, verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mrmc={0},{1}={0}", default_level, service.replace('-', "_"))));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
