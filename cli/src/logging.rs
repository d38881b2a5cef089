use actorscope_core::LoggingConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Maps a configured level name onto a filter, defaulting to INFO.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_filter(&config.level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_target(config.include_modules)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
