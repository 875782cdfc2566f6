//! libclang backend for cppast.
//!
//! This crate provides:
//! - compile configurations, built by hand or from a compilation database
//! - `compile_commands.json` access, with a header-to-source fallback lookup
//! - a parser driving `clang++` for preprocessing and libclang for parsing
//!
//! # Architecture
//!
//! ```text
//! C++ source → clang++ -E → processed text → libclang → CppFile + EntityIndex
//! ```

mod config;
mod cx;
mod database;
mod lookup;
mod parse;
mod preprocess;

pub use config::{ClangCompileConfig, DEFAULT_CLANG_BINARY, DEFAULT_CLANG_VERSION, DEFAULT_STANDARD};
pub use database::{CompilationDatabase, CompileCommand};
pub use lookup::{find_config_for, FALLBACK_EXTENSIONS};
pub use parse::ClangParser;
pub use preprocess::preprocessed_path;

use cppast_common::{parse_files_with, Error, FileParser, Result};

/// Parses `file_names` with configurations looked up in `database`.
///
/// Each file uses the configuration [`find_config_for`] finds; a file with
/// none fails with [`Error::ConfigNotFound`].
pub fn parse_files<FP, I, S>(parser: &mut FP, file_names: I, database: &CompilationDatabase) -> Result<()>
where
    FP: FileParser + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parse_files_with(parser, file_names, |file| {
        find_config_for(database, file)?.ok_or_else(|| Error::ConfigNotFound {
            file: file.to_string(),
        })
    })
}

/// Parses every file recorded in `database` with its own configuration.
pub fn parse_database<FP>(parser: &mut FP, database: &CompilationDatabase) -> Result<()>
where
    FP: FileParser + ?Sized,
{
    parse_files_with(parser, database.files(), |file| {
        ClangCompileConfig::from_database(database, file)
    })
}
