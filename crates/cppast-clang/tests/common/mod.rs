#![allow(dead_code, unused_macros)]

use cppast_clang::DEFAULT_CLANG_BINARY;
use cppast_common::{Diagnostic, DiagnosticLogger};
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

/// Writes a `compile_commands.json` with one entry per `(file, arguments)`.
pub fn write_database(dir: &Path, entries: &[(&str, &[&str])]) {
    let directory = dir.to_string_lossy();
    let records: Vec<String> = entries
        .iter()
        .map(|(file, args)| {
            let args: Vec<String> = args.iter().map(|a| json_string(a)).collect();
            format!(
                "  {{\n    \"directory\": {},\n    \"file\": {},\n    \"arguments\": [{}]\n  }}",
                json_string(&directory),
                json_string(file),
                args.join(", ")
            )
        })
        .collect();
    let json = format!("[\n{}\n]\n", records.join(",\n"));
    std::fs::write(dir.join("compile_commands.json"), json).unwrap();
}

fn json_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Whether the preprocessor binary can be launched.
pub fn clang_available() -> bool {
    Command::new(DEFAULT_CLANG_BINARY)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Returns early from a test when no preprocessor is installed.
macro_rules! require_clang {
    () => {
        if !common::clang_available() {
            eprintln!("Skipping test: {} not found", cppast_clang::DEFAULT_CLANG_BINARY);
            return;
        }
    };
}

/// Logger keeping everything it receives.
#[derive(Default)]
pub struct RecordingLogger {
    pub entries: Mutex<Vec<(String, Diagnostic)>>,
}

impl RecordingLogger {
    pub fn from_source(&self, source: &str) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == source)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

impl DiagnosticLogger for RecordingLogger {
    fn log(&self, source: &str, diagnostic: &Diagnostic) -> bool {
        self.entries
            .lock()
            .unwrap()
            .push((source.to_string(), diagnostic.clone()));
        true
    }
}
