use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins when set; otherwise
/// this crate logs at info.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("power_service=info"));

    // A second call (tests, the importer reusing the service setup) is a no-op.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
