use tracing_subscriber::{fmt, EnvFilter};

/// Send logs to stderr. `RUST_LOG` wins; otherwise `warn`, or `debug` for
/// this crate when `verbose` is set.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "warn,linear_timeline=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A subscriber may already be installed, e.g. by a test harness.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
