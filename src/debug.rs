//! Debug logging to stderr
//!
//! A `log` backend for hosts that have none. Enabled by setting
//! `KATARIBE_DEBUG`; its value, when it names a level, sets the minimum level.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Debug log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-token bookkeeping
    Trace,
    /// Lifecycle transitions
    Debug,
    Info,
    /// Recovered misuse
    Warn,
    Error,
}

impl LogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    pub enabled: bool,
    /// Minimum level; warnings and errors are always shown
    pub level: LogLevel,
}

impl Default for DebugConfig {
    fn default() -> Self {
        let env = std::env::var("KATARIBE_DEBUG").ok();
        Self {
            enabled: env.is_some(),
            level: env.as_deref().and_then(LogLevel::parse).unwrap_or(LogLevel::Debug),
        }
    }
}

impl DebugConfig {
    /// The level filter this configuration installs
    pub fn max_level(&self) -> log::LevelFilter {
        if self.enabled {
            self.level.filter().max(log::LevelFilter::Warn)
        } else {
            log::LevelFilter::Warn
        }
    }
}

/// Writes `[LEVEL] category message` lines to stderr
#[derive(Debug)]
pub struct StderrLogger {
    level: log::LevelFilter,
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

impl StderrLogger {
    /// Install as the global logger. Fails if a logger is already set.
    pub fn init(config: &DebugConfig) -> Result<(), log::SetLoggerError> {
        let level = config.max_level();
        let logger = LOGGER.get_or_init(|| StderrLogger { level });
        log::set_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    pub fn format(record: &log::Record<'_>) -> String {
        format!("[{}] {:10} {}", record.level(), category(record.target()), record.args())
    }
}

/// Last path segment of a log target, e.g. `orchestrator` for
/// `kataribe::orchestrator`
fn category(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", Self::format(record));
        }
    }

    fn flush(&self) {}
}
