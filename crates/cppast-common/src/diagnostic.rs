//! Diagnostic reporting for parsers.
//!
//! Parsers never print directly. Everything the front-end has to say is
//! turned into a [`Diagnostic`] and handed to a [`DiagnosticLogger`].

use crate::ast::SourceLocation;
use miette::Diagnostic as MietteDiagnostic;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
#[error("{message}")]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// A sink for diagnostics.
///
/// `source` names the component that produced the diagnostic
/// (e.g. `"preprocessor"` or `"libclang"`).
pub trait DiagnosticLogger: Send + Sync {
    /// Logs a diagnostic, returns whether it was actually emitted.
    fn log(&self, source: &str, diagnostic: &Diagnostic) -> bool;
}

/// Logger writing to stderr.
///
/// Debug diagnostics are only printed in verbose mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger {
    verbose: bool,
}

impl StderrLogger {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn format(source: &str, diagnostic: &Diagnostic) -> String {
        match &diagnostic.location {
            Some(loc) => format!(
                "[{source}] [{}] {}: {}",
                diagnostic.severity, loc, diagnostic.message
            ),
            None => format!(
                "[{source}] [{}] {}",
                diagnostic.severity, diagnostic.message
            ),
        }
    }
}

impl DiagnosticLogger for StderrLogger {
    fn log(&self, source: &str, diagnostic: &Diagnostic) -> bool {
        if diagnostic.severity == Severity::Debug && !self.verbose {
            return false;
        }
        eprintln!("{}", Self::format(source, diagnostic));
        true
    }
}

/// The logger used by parsers constructed without an explicit one.
pub fn default_logger() -> &'static StderrLogger {
    static LOGGER: StderrLogger = StderrLogger::new(false);
    &LOGGER
}
