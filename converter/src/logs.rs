//! Pipeline progress and warning log.
//!
//! Entries are printed to stderr as they arrive. Quiet mode keeps only
//! warnings, so `--json` output and scripted runs stay readable.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
}

/// A single log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting level for sub-steps
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Line as printed to the terminal.
    pub fn render(&self) -> String {
        let prefix = match self.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
        };
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, prefix, self.message)
    }
}

/// Global log sink
pub static LOG_SINK: Lazy<LogSink> = Lazy::new(LogSink::new);

/// Prints entries to stderr.
pub struct LogSink {
    quiet: AtomicBool,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            quiet: AtomicBool::new(false),
        }
    }

    /// Whether an entry is printed in the current mode.
    pub fn shows(&self, level: LogLevel) -> bool {
        level == LogLevel::Warning || !self.is_quiet()
    }

    pub fn log(&self, entry: LogEntry) {
        if self.shows(entry.level) {
            eprintln!("{}", entry.render());
        }
    }

    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::Relaxed)
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::warning(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_SINK.log(LogEntry::info(msg).with_indent(indent));
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    LOG_SINK.log(LogEntry::warning(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prefixes() {
        assert_eq!(LogEntry::info("reading").render(), "    reading");
        assert!(LogEntry::warning("skipped").render().contains("⚠️ skipped"));
        assert!(LogEntry::success("done").with_indent(1).render().starts_with("      ✓"));
    }

    #[test]
    fn test_quiet_keeps_warnings() {
        let sink = LogSink::new();
        assert!(sink.shows(LogLevel::Info));

        sink.set_quiet(true);
        assert!(!sink.shows(LogLevel::Info));
        assert!(!sink.shows(LogLevel::Success));
        assert!(sink.shows(LogLevel::Warning));
    }
}
