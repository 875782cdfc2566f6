//! compile_commands.json access through libclang.
//!
//! CMake can generate a compile_commands.json file (`CMAKE_EXPORT_COMPILE_COMMANDS`)
//! that contains the exact compilation commands for each source file.

use crate::cx::{cx_string_to_string, CompileCommands};
use cppast_common::{Error, Result};
use log::debug;
use rustc_hash::FxHashSet;
use std::ffi::CString;
use std::path::{Path, PathBuf};

/// A single compile command of the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    /// The working directory for compilation.
    pub directory: PathBuf,

    /// The source file path, as stored.
    pub file: PathBuf,

    /// The full invocation, program name first.
    pub arguments: Vec<String>,
}

impl CompileCommand {
    /// The key the database files this command under: `file`, prefixed by
    /// `directory` if relative.
    pub fn key(&self) -> String {
        full_path(&self.directory, &self.file)
    }

    fn from_raw(raw: clang_sys::CXCompileCommand) -> Self {
        unsafe {
            let directory = cx_string_to_string(clang_sys::clang_CompileCommand_getDirectory(raw));
            let file = cx_string_to_string(clang_sys::clang_CompileCommand_getFilename(raw));
            let num_args = clang_sys::clang_CompileCommand_getNumArgs(raw);
            let arguments = (0..num_args)
                .map(|i| cx_string_to_string(clang_sys::clang_CompileCommand_getArg(raw, i)))
                .collect();
            Self {
                directory: PathBuf::from(directory),
                file: PathBuf::from(file),
                arguments,
            }
        }
    }
}

fn full_path(directory: &Path, file: &Path) -> String {
    directory.join(file).to_string_lossy().into_owned()
}

/// A loaded compilation database.
///
/// Owns the libclang handle; it is released when the database is dropped.
/// File keys handed out are owned strings and stay valid afterwards.
pub struct CompilationDatabase {
    handle: clang_sys::CXCompilationDatabase,
    keys: FxHashSet<String>,
}

// The handle is only read after construction.
unsafe impl Send for CompilationDatabase {}

impl CompilationDatabase {
    /// Loads the `compile_commands.json` located in `build_directory`.
    pub fn open(build_directory: impl AsRef<Path>) -> Result<Self> {
        let directory = build_directory.as_ref();
        let load_error = |reason: &str| Error::DatabaseLoad {
            directory: directory.to_path_buf(),
            reason: reason.to_string(),
        };

        let c_directory = CString::new(directory.to_string_lossy().as_ref())
            .map_err(|_| load_error("path contains a NUL byte"))?;

        let mut error = clang_sys::CXCompilationDatabase_NoError;
        let handle = unsafe {
            clang_sys::clang_CompilationDatabase_fromDirectory(c_directory.as_ptr(), &mut error)
        };
        if handle.is_null() || error != clang_sys::CXCompilationDatabase_NoError {
            if !handle.is_null() {
                unsafe { clang_sys::clang_CompilationDatabase_dispose(handle) };
            }
            return Err(load_error("no readable compile_commands.json"));
        }

        let mut database = Self {
            handle,
            keys: FxHashSet::default(),
        };
        let commands = database.all_commands();
        debug!(
            "loaded compilation database {} with {} commands",
            directory.display(),
            commands.len()
        );
        database.keys = commands.iter().map(CompileCommand::key).collect();
        Ok(database)
    }

    /// Whether the database has an entry keyed exactly `file_name`.
    pub fn has_record(&self, file_name: &str) -> bool {
        self.keys.contains(file_name)
    }

    /// Visits the key of every entry, in the order the loader yields them.
    pub fn for_each_file(&self, mut visitor: impl FnMut(String)) {
        for command in self.all_commands() {
            visitor(command.key());
        }
    }

    /// The keys of every entry.
    pub fn files(&self) -> Vec<String> {
        let mut files = Vec::new();
        self.for_each_file(|file| files.push(file));
        files
    }

    /// The commands recorded for `file_name`.
    pub fn commands_for(&self, file_name: &str) -> Result<Vec<CompileCommand>> {
        if !self.has_record(file_name) {
            return Err(Error::ConfigNotFound {
                file: file_name.to_string(),
            });
        }
        Ok(self
            .all_commands()
            .into_iter()
            .filter(|command| command.key() == file_name)
            .collect())
    }

    fn all_commands(&self) -> Vec<CompileCommand> {
        let raw = unsafe { clang_sys::clang_CompilationDatabase_getAllCompileCommands(self.handle) };
        let Some(commands) = CompileCommands::from_raw(raw) else {
            return Vec::new();
        };
        (0..commands.len())
            .map(|i| CompileCommand::from_raw(commands.get(i)))
            .collect()
    }
}

impl Drop for CompilationDatabase {
    fn drop(&mut self) {
        unsafe { clang_sys::clang_CompilationDatabase_dispose(self.handle) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_relative_file() {
        let cmd = CompileCommand {
            directory: PathBuf::from("/home/user/project/build"),
            file: PathBuf::from("../src/main.cc"),
            arguments: vec!["g++".to_string(), "-c".to_string(), "../src/main.cc".to_string()],
        };
        assert_eq!(cmd.key(), "/home/user/project/build/../src/main.cc");
    }

    #[test]
    fn test_key_absolute_file() {
        let cmd = CompileCommand {
            directory: PathBuf::from("/build"),
            file: PathBuf::from("/src/a.cpp"),
            arguments: Vec::new(),
        };
        assert_eq!(cmd.key(), "/src/a.cpp");
    }
}
