//! Centralized shell output.
//!
//! The Shell is passed explicitly into every pipeline stage and decides,
//! based on its verbosity, which status lines reach the user:
//! - `Quiet`: nothing (errors are reported by the caller)
//! - `Normal`: progress of each stage (unpacking, building, stripping, skips)
//! - `Verbose`: also per-file details such as added or stripped artifacts
//!
//! Internal diagnostics go through `tracing`, not the Shell.

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// --quiet: no status lines
    Quiet,
    /// Default: one line per pipeline stage
    #[default]
    Normal,
    /// --verbose: per-file details
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Status types for output messages.
///
/// Shell handles all formatting - callers just specify the semantic status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // Success statuses (green)
    Finished,
    Adding,
    Stripped,

    // In-progress statuses (cyan)
    Unpacking,
    Compiling,
    Stripping,
    Packaging,
    Running,

    // Warning statuses (yellow)
    Skipped,
}

impl Status {
    /// Get the display text for this status.
    fn as_str(&self) -> &'static str {
        match self {
            Status::Finished => "Finished",
            Status::Adding => "Adding",
            Status::Stripped => "Stripped",
            Status::Unpacking => "Unpacking",
            Status::Compiling => "Compiling",
            Status::Stripping => "Stripping",
            Status::Packaging => "Packaging",
            Status::Running => "Running",
            Status::Skipped => "Skipped",
        }
    }

    /// Get the ANSI color code for this status.
    fn color_code(&self) -> &'static str {
        match self {
            Status::Finished | Status::Adding | Status::Stripped => "\x1b[1;32m",
            Status::Unpacking
            | Status::Compiling
            | Status::Stripping
            | Status::Packaging
            | Status::Running => "\x1b[1;36m",
            Status::Skipped => "\x1b[1;33m",
        }
    }

    /// Get the width for alignment (12 characters).
    fn width(&self) -> usize {
        12
    }
}

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
    /// When set, lines are recorded here instead of written to stderr.
    captured: Option<Mutex<Vec<String>>>,
}

impl Shell {
    /// Create a new shell writing to stderr.
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };

        Shell {
            verbosity,
            use_color,
            captured: None,
        }
    }

    /// Create a shell from CLI flags with proper precedence.
    ///
    /// Quiet takes precedence over verbose.
    pub fn from_flags(quiet: bool, verbose: u8, color: ColorChoice) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose > 0 {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Shell::new(verbosity, color)
    }

    /// Create a shell that records uncolored lines in memory.
    pub fn capture(verbosity: Verbosity) -> Self {
        Shell {
            verbosity,
            use_color: false,
            captured: Some(Mutex::new(Vec::new())),
        }
    }

    /// Lines recorded by a capturing shell.
    pub fn captured(&self) -> Vec<String> {
        self.captured
            .as_ref()
            .and_then(|lines| lines.lock().ok().map(|lines| lines.clone()))
            .unwrap_or_default()
    }

    /// Check if shell is in quiet mode.
    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    /// Check if shell is in verbose mode.
    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Print a status message.
    ///
    /// Format: `{status:>12} {message}`
    ///
    /// Nothing is printed in quiet mode.
    pub fn status(&self, status: Status, msg: impl Display) {
        if !self.is_quiet() {
            self.emit(status, msg);
        }
    }

    /// Print a status message in verbose mode only.
    pub fn verbose(&self, status: Status, msg: impl Display) {
        if self.is_verbose() {
            self.emit(status, msg);
        }
    }

    fn emit(&self, status: Status, msg: impl Display) {
        let line = format!("{} {}", self.format_status(status), msg);
        match &self.captured {
            Some(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
            None => eprintln!("{}", line),
        }
    }

    /// Format a status prefix with optional color.
    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();
        let width = status.width();

        if self.use_color {
            let color = status.color_code();
            format!("{}{:>width$}\x1b[0m", color, text, width = width)
        } else {
            format!("{:>width$}", text, width = width)
        }
    }

    /// Create a scoped span for timing an operation.
    ///
    /// The start message is printed immediately; the caller finishes the span
    /// with a message that gets the elapsed time appended.
    pub fn span(self: &Arc<Self>, status: Status, msg: impl Display) -> Span {
        Span::new(Arc::clone(self), status, msg.to_string())
    }
}

/// A scoped timing span.
pub struct Span {
    shell: Arc<Shell>,
    start: Instant,
}

impl Span {
    fn new(shell: Arc<Shell>, status: Status, message: String) -> Self {
        shell.status(status, &message);
        Span {
            shell,
            start: Instant::now(),
        }
    }

    /// Finish the span with a message and the elapsed time.
    pub fn finish_with_message(self, msg: impl Display) {
        let elapsed = self.start.elapsed();
        self.shell.status(
            Status::Finished,
            format!("{} in {}", msg, format_duration(elapsed)),
        );
    }
}

/// Format a duration in a human-readable way.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}
