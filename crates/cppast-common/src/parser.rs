//! Parser contracts and the batch entry point built on them.

use crate::ast::CppFile;
use crate::config::{CompileConfig, NamedConfig};
use crate::error::{Error, Result};
use crate::index::EntityIndex;
use log::debug;

/// A parser turning one file into a [`CppFile`].
pub trait Parser {
    /// Name tag of the configuration kind this parser accepts.
    fn config_name(&self) -> &'static str;

    /// Parses `path`, registering its entities in `index`.
    ///
    /// Fails with [`Error::InvalidArgument`] if `config` is not of the kind
    /// named by [`Parser::config_name`].
    fn parse(&self, index: &EntityIndex, path: &str, config: &dyn CompileConfig)
        -> Result<CppFile>;
}

/// Something that parses many files, one at a time.
///
/// Implementors decide what happens with the results and with failures.
pub trait FileParser {
    fn config_name(&self) -> &'static str;

    fn parse(&mut self, path: &str, config: &dyn CompileConfig) -> Result<()>;
}

/// Parses each of `files` with the configuration `resolve` returns for it.
///
/// Checks up front that `parser` accepts configurations of type `C`. Stops
/// at the first failure and returns it.
pub fn parse_files_with<FP, C, I, S, F>(parser: &mut FP, files: I, mut resolve: F) -> Result<()>
where
    FP: FileParser + ?Sized,
    C: NamedConfig,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(&str) -> Result<C>,
{
    check_config_name(parser.config_name(), C::NAME)?;
    for file in files {
        let file = file.as_ref();
        let config = resolve(file)?;
        parser.parse(file, &config)?;
    }
    Ok(())
}

/// Fails with [`Error::InvalidArgument`] unless both name tags match.
pub fn check_config_name(parser: &str, config: &str) -> Result<()> {
    if parser != config {
        return Err(Error::invalid_argument(format!(
            "parser expects '{parser}' configurations, got '{config}'"
        )));
    }
    Ok(())
}

/// Minimal [`FileParser`]: keeps every parsed file, fails on the first error.
pub struct SimpleFileParser<'i, P> {
    parser: P,
    index: &'i EntityIndex,
    files: Vec<CppFile>,
}

impl<'i, P: Parser> SimpleFileParser<'i, P> {
    pub fn new(parser: P, index: &'i EntityIndex) -> Self {
        Self {
            parser,
            index,
            files: Vec::new(),
        }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn index(&self) -> &EntityIndex {
        self.index
    }

    pub fn files(&self) -> &[CppFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<CppFile> {
        self.files
    }
}

impl<P: Parser> FileParser for SimpleFileParser<'_, P> {
    fn config_name(&self) -> &'static str {
        self.parser.config_name()
    }

    fn parse(&mut self, path: &str, config: &dyn CompileConfig) -> Result<()> {
        let file = self.parser.parse(self.index, path, config)?;
        debug!(
            "parsed {}: {} entities, had_errors={}",
            path,
            file.len(),
            file.had_errors()
        );
        self.files.push(file);
        Ok(())
    }
}
