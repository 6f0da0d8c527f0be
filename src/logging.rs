//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Pipeline components only emit events. The binary installs one subscriber
//! that fans every event out to the console (stderr) and to a dated log file
//! under the log directory. Set `RUST_LOG` to override the configured level.

use crate::structs::{PipelineError, Result};
use chrono::{Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Configuration for logging behavior
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    /// Directory receiving the `YYYYMMDD_project.log` file
    pub log_dir: PathBuf,
    /// Whether events are also printed to stderr
    pub console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_dir: PathBuf::from("logs"),
            console: true,
        }
    }
}

impl LogConfig {
    /// Map CLI verbosity onto a level
    ///
    /// - 0 (no `-v`): info
    /// - 1 (`-v`): debug
    /// - 2+ (`-vv`): trace
    #[must_use]
    pub fn from_verbosity(verbosity: u8, log_dir: &Path, quiet: bool) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            log_dir: log_dir.to_path_buf(),
            console: !quiet,
        }
    }

    /// Path of today's log file
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(log_file_name(Local::now().date_naive()))
    }
}

/// File name of the log for a given day
#[must_use]
pub fn log_file_name(date: NaiveDate) -> String {
    format!("{}_project.log", date.format("%Y%m%d"))
}

/// Install the global subscriber and return the log file path
///
/// # Errors
/// Returns error if the log file cannot be opened or a subscriber is already set
pub fn init_logging(config: &LogConfig) -> Result<PathBuf> {
    fs::create_dir_all(&config.log_dir)?;
    let path = config.log_file();
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let console = config.console.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(build_env_filter(config.level))
        .with(console)
        .with(file_layer(SharedWriter::new(file)))
        .try_init()
        .map_err(|e| PipelineError::Config(format!("Failed to install logger: {e}")))?;

    Ok(path)
}

/// Plain-text layer: timestamp, target, level and message on one line
fn file_layer<S, W>(writer: SharedWriter<W>) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: Write + Send + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
}

/// Cloneable writer handle that serializes writes through a mutex
pub struct SharedWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> SharedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }
}

pub struct SharedWriterGuard<W> {
    inner: Arc<Mutex<W>>,
}

impl<W: Write> Write for SharedWriterGuard<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log writer lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log writer lock poisoned"))?;
        guard.flush()
    }
}

impl<'a, W: Write + 'a> MakeWriter<'a> for SharedWriter<W> {
    type Writer = SharedWriterGuard<W>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Build an `EnvFilter` from the given level, respecting `RUST_LOG`
fn build_env_filter(level: Level) -> EnvFilter {
    let level_str = level.as_str().to_lowercase();

    // Dependencies stay at warn
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,sleepscore={level_str}")))
}
