//! Backend-independent contracts of the cppast C++ parsing facade.
//!
//! This crate provides:
//! - The compile configuration interface ([`CompileConfig`])
//! - The parser interfaces ([`Parser`], [`FileParser`]) and the batch entry point
//! - Diagnostic reporting ([`DiagnosticLogger`])
//! - The AST a parser produces ([`CppFile`]) and the cross-file [`EntityIndex`]

mod ast;
mod config;
mod diagnostic;
mod error;
mod index;
mod parser;

pub use ast::{
    CppEntity, CppEntityKind, CppFile, EntityId, IncludeDirective, IncludeKind, MacroDefinition,
    NodeId, SourceLocation,
};
pub use config::{CompileConfig, CompileFlags, CppStandard, NamedConfig};
pub use diagnostic::{default_logger, Diagnostic, DiagnosticLogger, Severity, StderrLogger};
pub use error::{Error, ErrorKind, Result};
pub use index::{EntityIndex, IndexEntry};
pub use parser::{check_config_name, parse_files_with, FileParser, Parser, SimpleFileParser};
