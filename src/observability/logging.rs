//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the console and file sinks
//! - Map the configured mode and level onto each sink
//! - Force every sink on for fatal errors
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Each sink has its own level filter behind a reload handle
//! - File sink rotates by size when asked to

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, Layer, Registry};

use crate::config::{LogLevel, LoggingConfig};

/// Name of the active log file inside the configured directory.
pub const LOG_FILE_NAME: &str = "forward-proxy.log";

/// Error type for logging setup.
#[derive(Debug)]
pub enum LoggingError {
    Io(io::Error),
    Init(String),
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggingError::Io(e) => write!(f, "Failed to open log file: {}", e),
            LoggingError::Init(e) => write!(f, "Failed to install subscriber: {}", e),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Filter for a sink given the configured level, or OFF when the sink is disabled.
pub fn sink_filter(enabled: bool, level: LogLevel) -> LevelFilter {
    if !enabled {
        return LevelFilter::OFF;
    }
    match level {
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

type FilterHandle = reload::Handle<LevelFilter, Registry>;

/// Runtime control over the installed sinks.
pub struct LogHandle {
    sinks: Vec<FilterHandle>,
}

impl LogHandle {
    /// Turn every sink on at info level, whatever the configured mode.
    pub fn force_enable(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.modify(|filter| *filter = LevelFilter::INFO) {
                eprintln!("failed to enable log sink: {}", e);
            }
        }
    }
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<LogHandle, LoggingError> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut sinks = Vec::new();

    let (console_filter, console_handle) = reload::Layer::new(sink_filter(config.mode.console(), config.level));
    layers.push(fmt::layer().with_target(false).with_filter(console_filter).boxed());
    sinks.push(console_handle);

    if config.mode.file() {
        let file = RotatingFile::open(config)?;
        let (file_filter, file_handle) = reload::Layer::new(sink_filter(true, config.level));
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(file_filter)
                .boxed(),
        );
        sinks.push(file_handle);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LogHandle { sinks })
}

/// Append-only log file that rotates once it would exceed `max_bytes`.
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: Option<u64>,
    max_backups: usize,
}

impl RotatingFile {
    pub fn open(config: &LoggingConfig) -> Result<Self, LoggingError> {
        let dir = Path::new(&config.dir);
        fs::create_dir_all(dir).map_err(LoggingError::Io)?;
        let path = dir.join(LOG_FILE_NAME);
        let file = append(&path).map_err(LoggingError::Io)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path,
            file,
            written,
            max_bytes: if config.rotate { config.max_bytes } else { None },
            max_backups: config.max_backup_count.unwrap_or(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup(&self, n: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.max_backups == 0 {
            self.file = File::create(&self.path)?;
        } else {
            let _ = fs::remove_file(self.backup(self.max_backups));
            for n in (1..self.max_backups).rev() {
                let from = self.backup(n);
                if from.exists() {
                    fs::rename(&from, self.backup(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup(1))?;
            self.file = append(&self.path)?;
        }
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(max) = self.max_bytes {
            if self.written > 0 && self.written + buf.len() as u64 > max {
                self.rotate()?;
            }
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
