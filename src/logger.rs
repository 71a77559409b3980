//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro, printed only under `--verbose`
//! - `PreviewStatus` for the single-block status shown by `watch`
//!
//! # Example
//!
//! ```ignore
//! log!("watch"; "previewing {} files", count);
//! debug!("sync"; "discarded stale seq {}", seq);
//!
//! status_painted("nextjs 12ms");
//! status_error("compile failed", "app/page.tsx: unterminated string");
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::LazyLock,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::utils::time::clock;

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    {
        let mut stdout = stdout().lock();
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
        writeln!(stdout, "{prefix} {message}").ok();
        stdout.flush().ok();
    }

    // a log line breaks the status block; start a fresh one below it
    STATUS.lock().last_lines = 0;
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" | "room" => prefix.bright_blue().bold().to_string(),
        "watch" | "engine" => prefix.bright_green().bold().to_string(),
        "sync" => prefix.bright_magenta().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Preview Status (single-block status with overwrite)
// ============================================================================

/// Single-block status display for watch mode
///
/// Each message overwrites the previous block, so the terminal always shows
/// the latest paint, skip, failure or connection change.
///
/// # Example
///
/// ```ignore
/// let mut status = PreviewStatus::new();
/// status.painted("nextjs in 12ms");
/// status.unchanged("same output, skipped");
/// status.error("compile failed", "unterminated string");
/// ```
pub struct PreviewStatus {
    /// Lines of previous output to clear
    last_lines: usize,
}

/// Global status block shared by the engine frame and the watcher.
static STATUS: LazyLock<Mutex<PreviewStatus>> = LazyLock::new(|| Mutex::new(PreviewStatus::new()));

impl PreviewStatus {
    pub const fn new() -> Self {
        Self { last_lines: 0 }
    }

    /// Display paint message (✓ prefix, green).
    pub fn painted(&mut self, message: &str) {
        self.display(format!("{}", "✓".green()), message);
    }

    /// Display unchanged message (dimmed, no symbol).
    pub fn unchanged(&mut self, message: &str) {
        self.display(String::new(), &format!("{}", message.dimmed()));
    }

    /// Display error message (✗ prefix, red) with optional detail.
    pub fn error(&mut self, summary: &str, detail: &str) {
        self.display(format!("{}", "✗".red()), &block(summary, detail));
    }

    /// Display warning message (⚠ prefix, yellow).
    pub fn warning(&mut self, message: &str) {
        self.display(format!("{}", "⚠".yellow()), message);
    }

    fn display(&mut self, symbol: String, message: &str) {
        let mut stdout = stdout().lock();

        if self.last_lines > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let lines = self.last_lines as u16;
            execute!(stdout, cursor::MoveUp(lines)).ok();
            execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
        }

        let timestamp = format!("[{}]", clock()).dimmed().to_string();
        let line = if symbol.is_empty() {
            format!("{timestamp} {message}")
        } else {
            format!("{timestamp} {symbol} {message}")
        };

        writeln!(stdout, "{line}").ok();
        stdout.flush().ok();

        self.last_lines = line_count(message);
    }
}

fn block(summary: &str, detail: &str) -> String {
    if detail.is_empty() {
        summary.to_string()
    } else {
        format!("{summary}\n{detail}")
    }
}

fn line_count(message: &str) -> usize {
    message.matches('\n').count() + 1
}

/// Global status: document painted
pub fn status_painted(message: &str) {
    STATUS.lock().painted(message);
}

/// Global status: output unchanged
pub fn status_unchanged(message: &str) {
    STATUS.lock().unchanged(message);
}

/// Global status: error
pub fn status_error(summary: &str, detail: &str) {
    STATUS.lock().error(summary, detail);
}

/// Global status: warning
pub fn status_warning(message: &str) {
    STATUS.lock().warning(message);
}

// ============================================================================
// Tests
// ============================================================================
