//! Structured logging setup

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `olt=info`, or `olt=debug` when
/// `verbose`. Output goes to stderr so tree and JSON output stay clean.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "olt=debug" } else { "olt=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // try_init so double-init in tests doesn't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
