//! Logging setup
//! Installs an `env_logger` backend with timestamped output on stderr.

use std::io::Write;

use chrono::Local;
use env_logger::{Builder, DEFAULT_FILTER_ENV, Env};
use log::LevelFilter;

/// Initializes the global logger at `level`. `RUST_LOG` takes precedence when set.
///
/// Calling this more than once keeps the first logger.
pub fn init(level: LevelFilter) {
    let mut builder = Builder::new();
    // The backend passes everything; verbosity is controlled through the global max level.
    builder.filter_level(LevelFilter::Trace);
    builder.parse_env(Env::default());
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{} {} {}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if builder.try_init().is_ok() {
        set_level(level);
        log::debug!("Logging initialized at {}", level);
    }
}

/// Changes the verbosity of an initialized logger. Ignored when `RUST_LOG` is set.
pub fn set_level(level: LevelFilter) {
    if std::env::var_os(DEFAULT_FILTER_ENV).is_none() {
        log::set_max_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_can_be_changed_after_init() {
        init(LevelFilter::Info);
        if std::env::var_os(DEFAULT_FILTER_ENV).is_some() {
            return;
        }
        assert_eq!(log::max_level(), LevelFilter::Info);

        set_level(LevelFilter::Debug);
        assert_eq!(log::max_level(), LevelFilter::Debug);
        set_level(LevelFilter::Warn);
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
