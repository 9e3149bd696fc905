use std::path::PathBuf;

use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

pub const LOG_FILE: &str = "hpit.log";

/// Installs the global subscriber.
///
/// - `log_level` is an `EnvFilter` directive (e.g. `"info"` or `"hpit_client=debug"`).
/// - `log_dir`, when given, adds a daily rolling plain-text log next to stdout.
pub fn init_tracing(log_level: &str, log_dir: Option<PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_new(log_level)?
        .add_directive("hyper=off".parse()?)
        .add_directive("reqwest=warn".parse()?);

    let stdout_layer = fmt::layer().with_target(false);

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE);
            Some(fmt::layer().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}
