//! Log subscriber setup.
//!
//! The level comes from `--log-level`, then the `TSCMD_LOG` environment
//! variable, then `info`. Output goes to stderr, or to a file through a
//! non-blocking writer whose guard must be kept alive until exit.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the default filter directive
pub const LOG_ENV: &str = "TSCMD_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Plain,
    Compact,
    Pretty,
    Json,
}

/// Filter directive from the flag, the environment or the default
pub fn filter_directive(level: Option<&str>) -> String {
    level
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_ENV).ok())
        .unwrap_or_else(|| "info".to_string())
}

pub fn init(level: Option<&str>, format: LogFormat, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let directive = filter_directive(level);
    let filter = EnvFilter::try_new(&directive)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create log filter")?;

    let (writer, guard) = match file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let name = path.file_name().context("Log file path has no file name")?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = file.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_ansi(ansi).with_writer(writer))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_ansi(ansi).with_writer(writer))
            .try_init(),
        LogFormat::Plain => registry
            .with(fmt::layer().with_ansi(ansi).with_writer(writer))
            .try_init(),
    };
    installed.context("Failed to install log subscriber")?;
    Ok(guard)
}
