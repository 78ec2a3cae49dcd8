use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Line layout of log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Timestamp, level, target and fields on one line
    #[default]
    Full,
    /// Shorter single line
    Compact,
    /// Multi-line, for reading by eye
    Pretty,
}

fn fmt_layer(format: LogFormat, writer: BoxMakeWriter, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Full => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    }
}

/// Install the global subscriber. Keep the guard alive until exit so buffered
/// file output is flushed.
pub fn init(level: &str, format: LogFormat, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?,
    };

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(fmt_layer(format, BoxMakeWriter::new(std::io::stderr), true).with_filter(filter))
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("log file {} has no file name", path.display()))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(fmt_layer(format, BoxMakeWriter::new(writer), false).with_filter(filter))
        .init();
    Ok(Some(guard))
}
