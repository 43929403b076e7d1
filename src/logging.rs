//! Log subscriber setup
//!
//! Logs always go to stderr, and are also appended to a file when
//! `[logging] file` is set. `RUST_LOG` overrides the configured level.

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone)]
enum LogTarget {
    Stderr,
    File(Arc<Mutex<File>>),
}

/// Hands the fmt layer a line-buffered writer for the configured target
#[derive(Clone)]
pub struct LogWriterFactory {
    target: LogTarget,
}

impl LogWriterFactory {
    pub fn stderr() -> Self {
        Self {
            target: LogTarget::Stderr,
        }
    }

    /// Append to `path`, creating it and its parent directory if needed
    pub fn file(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            target: LogTarget::File(Arc::new(Mutex::new(file))),
        })
    }

    fn is_file(&self) -> bool {
        matches!(self.target, LogTarget::File(_))
    }

    fn flush(&self) {
        match &self.target {
            LogTarget::Stderr => {
                let _ = io::stderr().flush();
            }
            LogTarget::File(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = file.flush();
                }
            }
        }
    }
}

pub struct LogWriter {
    target: LogTarget,
    buffer: Vec<u8>,
}

impl LogWriter {
    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &self.target {
            LogTarget::Stderr => io::stderr().lock().write_all(bytes),
            LogTarget::File(file) => match file.lock() {
                Ok(mut file) => file.write_all(bytes),
                Err(_) => Err(io::Error::new(io::ErrorKind::Other, "log file lock poisoned")),
            },
        }
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        if let Some(idx) = self.buffer.iter().rposition(|b| *b == b'\n') {
            let lines: Vec<u8> = self.buffer.drain(..=idx).collect();
            self.emit(&lines)?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.emit(&rest)?;
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            target: self.target.clone(),
            buffer: Vec::new(),
        }
    }
}

/// Flushes every log target when dropped at the end of `main`
pub struct LogGuard {
    factories: Vec<LogWriterFactory>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        for factory in &self.factories {
            factory.flush();
        }
    }
}

/// Build the filter: `RUST_LOG` wins, then `--verbose`, then the config level
pub fn build_filter(config: &LoggingConfig, verbose: bool) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = if verbose { "debug" } else { config.level.as_str() };
    EnvFilter::try_new(level)
        .map_err(|e| Error::Config(format!("invalid logging.level '{}': {}", level, e)))
}

/// Build the subscriber without installing it.
///
/// `console` always receives logs; a configured `logging.file` receives the
/// same events in the same format, without ANSI colours.
pub fn build_subscriber(
    config: &LoggingConfig,
    verbose: bool,
    console: LogWriterFactory,
) -> Result<(impl Subscriber + Send + Sync + 'static, LogGuard)> {
    let filter = build_filter(config, verbose)?;
    let file = match &config.file {
        Some(path) => Some(LogWriterFactory::file(path)?),
        None => None,
    };
    let console_ansi = !console.is_file();

    let console_json = config
        .json
        .then(|| fmt::layer().json().with_writer(console.clone()));
    let console_text = (!config.json)
        .then(|| fmt::layer().with_ansi(console_ansi).with_writer(console.clone()));
    let file_json = file
        .as_ref()
        .filter(|_| config.json)
        .map(|f| fmt::layer().json().with_writer(f.clone()));
    let file_text = file
        .as_ref()
        .filter(|_| !config.json)
        .map(|f| fmt::layer().with_ansi(false).with_writer(f.clone()));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_text)
        .with(file_json)
        .with(file_text);

    let mut factories = vec![console];
    factories.extend(file);
    Ok((subscriber, LogGuard { factories }))
}

/// Install the global subscriber, logging to stderr and any configured file
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<LogGuard> {
    let (subscriber, guard) = build_subscriber(config, verbose, LogWriterFactory::stderr())?;
    subscriber
        .try_init()
        .map_err(|e| Error::Other(format!("failed to install log subscriber: {}", e)))?;
    Ok(guard)
}
