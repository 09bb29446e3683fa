//! Process-wide logger setup.
//!
//! # Invariants
//! - One logger per process; repeating the active settings is a no-op.
//! - Different settings after startup are reported as an error, never applied.
//! - Setup never panics; failures come back as `Err`.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};

const FILE_BASENAME: &str = "participation";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_FILES: usize = 6;
const PANIC_SUMMARY_CHARS: usize = 200;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

/// Where log records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stderr,
    /// Size-rotated files under an absolute directory.
    Dir(PathBuf),
}

impl Display for LogSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stderr => f.write_str("stderr"),
            Self::Dir(dir) => write!(f, "dir:{}", dir.display()),
        }
    }
}

/// Validated logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub sink: LogSink,
}

impl LogSettings {
    /// Parses a level name and an optional absolute log directory.
    pub fn parse(level: &str, log_dir: Option<&str>) -> Result<Self, String> {
        let level = parse_level(level)?;
        let sink = match log_dir.map(str::trim) {
            None => LogSink::Stderr,
            Some("") => return Err("log directory is empty".to_string()),
            Some(dir) if !Path::new(dir).is_absolute() => {
                return Err(format!("log directory `{dir}` is not an absolute path"))
            }
            Some(dir) => LogSink::Dir(PathBuf::from(dir)),
        };
        Ok(Self { level, sink })
    }
}

impl Display for LogSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "level={} sink={}", self.level, self.sink)
    }
}

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Starts process logging, or confirms it already runs with these settings.
///
/// `log_dir = None` writes to stderr.
///
/// # Errors
/// - Unknown level names, or a blank or relative `log_dir`.
/// - The log directory cannot be created or the logger cannot start.
/// - A logger is already running with different settings.
pub fn init_logging(level: &str, log_dir: Option<&str>) -> Result<(), String> {
    let requested = LogSettings::parse(level, log_dir)?;
    let active = ACTIVE.get_or_try_init(|| start(&requested))?;

    if active.settings != requested {
        return Err(format!(
            "logger already running with {}; ignoring {}",
            active.settings, requested
        ));
    }
    Ok(())
}

/// Settings of the running logger, or `None` before [`init_logging`].
pub fn logging_status() -> Option<LogSettings> {
    ACTIVE.get().map(|active| active.settings.clone())
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(settings: &LogSettings) -> Result<ActiveLogger, String> {
    let spec = LogSpecification::builder().default(settings.level).build();
    let logger = Logger::with(spec);

    let logger = match &settings.sink {
        LogSink::Stderr => logger
            .log_to_stderr()
            .format_for_stderr(flexi_logger::detailed_format),
        LogSink::Dir(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|err| format!("cannot create log directory {}: {err}", dir.display()))?;
            logger
                .log_to_file(FileSpec::default().directory(dir).basename(FILE_BASENAME))
                .rotate(
                    Criterion::Size(ROTATE_AT_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(KEEP_FILES),
                )
                .append()
                .write_mode(WriteMode::BufferAndFlush)
                .format_for_files(flexi_logger::detailed_format)
        }
    };

    let handle = logger
        .start()
        .map_err(|err| format!("logger failed to start: {err}"))?;
    log_panics();

    info!(
        "event=logging_init module=core status=ok {} os={} version={}",
        settings,
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        settings: settings.clone(),
        _handle: handle,
    })
}

fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    let name = raw.trim().to_ascii_lowercase();
    let level = match name.as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => return Err(format!("unknown log level `{name}`")),
    };
    Ok(level)
}

/// Chains a hook that records a flattened, bounded panic summary.
///
/// Only reached from inside the `ACTIVE` initializer, so it runs once.
fn log_panics() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        error!(
            "event=panic module=core status=error location={} payload={}",
            location,
            panic_summary(info)
        );
        previous(info);
    }));
}

fn panic_summary(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string payload>");
    one_line(text, PANIC_SUMMARY_CHARS)
}

/// Collapses line breaks and caps `text` at `max_chars` characters.
fn one_line(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c });
    let mut out: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}
