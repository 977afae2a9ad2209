use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber. `RUST_LOG` wins over `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second call (tests, seed binary after server) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter)
        .try_init();
}
