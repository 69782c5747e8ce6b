//! Tracing subscriber setup.

use std::env;

use tracing::Level;

const LOG_ENV: &str = "USDMTLX_LOG";

/// Pick the log level from `USDMTLX_LOG`, falling back to the CLI verbosity.
///
/// `verbosity` is the number of `-v` flags minus the number of `-q` flags; zero means `info`.
pub fn level_for(verbosity: i8, env_value: Option<&str>) -> Level {
    if let Some(level) = env_value.and_then(|value| value.trim().parse::<Level>().ok()) {
        return level;
    }
    match verbosity {
        i8::MIN..=-2 => Level::ERROR,
        -1 => Level::WARN,
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global fmt subscriber writing to stderr. Later calls are no-ops.
pub fn init(verbosity: i8) {
    let env_value = env::var(LOG_ENV).ok();
    let level = level_for(verbosity, env_value.as_deref());
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
