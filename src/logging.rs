use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber for a binary. Output goes to stderr so stdout
/// stays reserved for protocol replies; `RUST_LOG` overrides `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
