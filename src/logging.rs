//! Logging initialization
//!
//! Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
//! overrides the level picked from `-v`.

use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Default filter for a `-v` count
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "pickr=warn",
        1 => "pickr=info",
        2 => "pickr=debug",
        _ => "pickr=trace",
    }
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
    };

    let _ = tracing_subscriber::registry().with(layer).try_init();
}
