/// Installs the process-wide logger.
///
/// Log level is Debug in development builds and Info in production builds.
/// `RUST_LOG` overrides both.
pub fn init() {
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
}
