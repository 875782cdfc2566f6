//! Error types shared by every cppast backend.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for cppast operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DatabaseLoad,
    ConfigNotFound,
    InvalidArgument,
    PreprocessFailed,
    ParseFailed,
    Io,
}

/// Errors that can occur while configuring or running a parser.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// The compilation database could not be found or loaded.
    #[error("unable to load compilation database from '{directory}': {reason}")]
    #[diagnostic(
        code(cppast::database_load),
        help("the directory must contain a compile_commands.json file")
    )]
    DatabaseLoad { directory: PathBuf, reason: String },

    /// The compilation database has no entry for a file.
    #[error("unable to find configuration for file '{file}'")]
    #[diagnostic(code(cppast::config_not_found))]
    ConfigNotFound { file: String },

    /// Wrong configuration kind or malformed configuration value.
    #[error("invalid argument: {0}")]
    #[diagnostic(code(cppast::invalid_argument))]
    InvalidArgument(String),

    /// The external compiler could not preprocess the file.
    #[error("preprocessing of '{file}' failed: {reason}")]
    #[diagnostic(code(cppast::preprocess_failed))]
    PreprocessFailed { file: String, reason: String },

    /// The front-end reported a fatal diagnostic or the AST could not be built.
    #[error("parsing of '{file}' failed: {reason}")]
    #[diagnostic(code(cppast::parse_failed))]
    ParseFailed { file: String, reason: String },

    /// Reading a source or writing a preprocessed file failed.
    #[error("I/O error on '{}': {source}", path.display())]
    #[diagnostic(code(cppast::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DatabaseLoad { .. } => ErrorKind::DatabaseLoad,
            Error::ConfigNotFound { .. } => ErrorKind::ConfigNotFound,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::PreprocessFailed { .. } => ErrorKind::PreprocessFailed,
            Error::ParseFailed { .. } => ErrorKind::ParseFailed,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
