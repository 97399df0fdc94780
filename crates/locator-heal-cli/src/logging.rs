//! Log subscriber setup

use crate::config::Verbosity;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber; logs go to stderr so stdout stays parseable
///
/// `RUST_LOG` takes precedence over the verbosity default. Event targets
/// are shown from `-v` up.
pub fn init_logging(verbosity: Verbosity, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity.is_verbose()),
            )
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}
