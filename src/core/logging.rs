//! Logging initialization and utilities

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g.
/// `RUST_LOG=tessera::cache=trace` to watch evictions.
///
/// # Example
/// ```no_run
/// tessera::core::logging::init();
/// log::info!("Globe started");
/// ```
pub fn init() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();
}

/// Initialize logging with millisecond timestamps, ignoring a second call.
///
/// Binaries that report fetch timings use this variant.
pub fn try_init_timestamped() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .try_init();
}
