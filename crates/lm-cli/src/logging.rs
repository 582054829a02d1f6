//! Logging setup for the CLI
//!
//! Logs go to stderr so merged tables printed on stdout stay clean.
//! `RUST_LOG` takes precedence, e.g. `RUST_LOG=lm_core=debug`.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber.
///
/// Without `RUST_LOG` the level is `warn`, or `info` with `--verbose`.
pub fn init(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(verbose)
        .init();
}
