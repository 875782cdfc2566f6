use crate::config::ClangCompileConfig;
use crate::database::CompilationDatabase;
use cppast_common::Result;
use log::trace;

/// Extensions tried, in order, when a file has no record of its own.
pub const FALLBACK_EXTENSIONS: [&str; 12] = [
    ".cpp", ".cc", ".cxx", ".c++", ".C", ".c", ".hpp", ".hh", ".hxx", ".h++", ".H", ".h",
];

/// Finds a configuration for `file_name`.
///
/// Uses the record of `file_name` itself if there is one. Otherwise the
/// extension is replaced by each of [`FALLBACK_EXTENSIONS`] in turn and the
/// first recorded candidate wins, so a header picks up the configuration of
/// its source file. Returns `Ok(None)` if nothing matches.
pub fn find_config_for(
    database: &CompilationDatabase,
    file_name: &str,
) -> Result<Option<ClangCompileConfig>> {
    if database.has_record(file_name) {
        return ClangCompileConfig::from_database(database, file_name).map(Some);
    }

    let stem = strip_extension(file_name);
    for ext in FALLBACK_EXTENSIONS {
        let candidate = format!("{stem}{ext}");
        if database.has_record(&candidate) {
            trace!("using configuration of {candidate} for {file_name}");
            return ClangCompileConfig::from_database(database, &candidate).map(Some);
        }
    }

    Ok(None)
}

/// Removes the extension of the last path component, if any.
fn strip_extension(file_name: &str) -> &str {
    let name_start = file_name.rfind(['/', '\\']).map_or(0, |i| i + 1);
    match file_name[name_start..].rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..name_start + dot],
    }
}
