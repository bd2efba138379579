//! Optional logging bootstrap for consumers that have no preferred `log`
//! backend of their own. The crate itself only ever emits through the
//! `log` facade (see the module docs in [`crate::reactor`] and
//! [`crate::error`] for what gets logged at which level); nothing here is
//! required to use the crate, it just saves examples and integration
//! tests from wiring up a dispatcher by hand.

use fern::Dispatch;
use log::LevelFilter;
use thiserror::Error;

#[cfg(debug_assertions)]
use fern::colors::{Color, ColoredLevelConfig};

#[cfg(not(debug_assertions))]
use chrono::Local;

#[cfg(not(debug_assertions))]
use fern::DateBased;

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error(transparent)]
    Log(#[from] log::SetLoggerError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Installs a console logger (colored in debug builds) and, outside debug
/// builds, a dated rotating file logger under `path` as well.
pub fn init(level: LevelFilter, path: Option<&str>) -> Result<(), LoggerInitError> {
    let mut logger = Dispatch::new().level(level);

    #[cfg(debug_assertions)]
    {
        let colors = ColoredLevelConfig::new()
            .info(Color::Blue)
            .warn(Color::Yellow)
            .error(Color::Red);

        logger = logger
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "[{}] - ({}) - {}",
                    colors.color(record.level()),
                    record.file_static().unwrap_or("*"),
                    message
                ))
            })
            .chain(std::io::stdout());
    }

    #[cfg(not(debug_assertions))]
    {
        logger = logger.format(move |out, message, record| {
            out.finish(format_args!(
                "{} - [{}] - ({}) - {}",
                Local::now().format("%m-%d %H:%M:%S"),
                record.level(),
                record.file_static().unwrap_or("*"),
                message
            ))
        });

        if let Some(path) = path {
            if std::fs::metadata(path).is_err() {
                std::fs::create_dir(path)?;
            }

            logger = logger.chain(DateBased::new(path, "%Y-%m-%d-srt.log"));
        }
    }

    logger.apply()?;
    Ok(())
}
