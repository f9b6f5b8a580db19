use tracing::Level;
use tracing_subscriber::EnvFilter;

fn level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Logs go to stderr; stdout is reserved for records.
///
/// A valid `RUST_LOG` overrides the `-v` count.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level(verbosity).as_str().to_ascii_lowercase();
        EnvFilter::new(format!("lava_nodes={level},lavanodes={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
