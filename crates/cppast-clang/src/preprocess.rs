//! Preprocessing with the external `clang++` binary.
//!
//! The preprocessed text is handed to libclang instead of the original
//! file. Directives are harvested on the way (includes, macro definitions)
//! and blanked out, keeping line numbers and line markers intact.

use crate::config::{pack_version, ConfigView};
use cppast_common::{
    Diagnostic, DiagnosticLogger, Error, IncludeDirective, IncludeKind, MacroDefinition, Result,
};
use indexmap::IndexMap;
use log::{debug, trace};
use std::io::Write;
use std::process::{Command, Stdio};

const LOG_SOURCE: &str = "preprocessor";

/// Main-file name clang reports when reading from stdin.
const STDIN_FILE: &str = "<stdin>";

/// Macros clang defines itself; pass 2 predefines them already.
const RESERVED_MACROS: &[&str] = &[
    "__cplusplus",
    "__STDC__",
    "__STDC_HOSTED__",
    "__STDC_VERSION__",
    "__FILE__",
    "__LINE__",
    "__DATE__",
    "__TIME__",
    "__TIMESTAMP__",
    "__COUNTER__",
    "__INCLUDE_LEVEL__",
    "__BASE_FILE__",
    "__FLT_EVAL_METHOD__",
    "__has_include",
    "__has_include_next",
];

/// Result of preprocessing one file.
#[derive(Debug, Default)]
pub(crate) struct Preprocessed {
    /// Text to hand to the front-end.
    pub source: String,
    pub includes: Vec<IncludeDirective>,
    pub macros: Vec<MacroDefinition>,
}

/// Preprocesses `path` as configured.
pub(crate) fn preprocess(
    config: &ConfigView<'_>,
    path: &str,
    logger: &dyn DiagnosticLogger,
) -> Result<Preprocessed> {
    let preprocessed = if config.fast_preprocessing() {
        preprocess_fast(config, path, logger)?
    } else {
        let mut cmd = Command::new(config.compiler_binary());
        cmd.args(preprocess_args(config))
            .args(config.arguments())
            .arg(path);
        let output = run(cmd, None, path, logger)?;
        process_output(&output, path, path)
    };

    if config.write_preprocessed() {
        let target = preprocessed_path(path);
        debug!("writing preprocessed output to {target}");
        std::fs::write(&target, &preprocessed.source).map_err(|e| Error::io(&target, e))?;
    }

    Ok(preprocessed)
}

/// Where the preprocessed form of `path` is written.
pub fn preprocessed_path(path: &str) -> String {
    format!("{path}.pp")
}

fn preprocess_args(config: &ConfigView<'_>) -> Vec<&'static str> {
    let mut args = vec!["-x", "c++", "-E", "-dD", "-Wno-pragma-once-outside-header"];
    args.push(if config.keep_macro_comments() { "-CC" } else { "-C" });
    // -dI is only understood since clang 4.0
    if config.compiler_version() >= pack_version(4, 0, 0) {
        args.extend(["-Xclang", "-dI"]);
    }
    args
}

/// Harvests the macros of the translation unit, then preprocesses the file
/// alone with those macros forced.
fn preprocess_fast(
    config: &ConfigView<'_>,
    path: &str,
    logger: &dyn DiagnosticLogger,
) -> Result<Preprocessed> {
    let mut cmd = Command::new(config.compiler_binary());
    cmd.args(["-x", "c++", "-dM", "-E"])
        .args(config.arguments())
        .arg(path);
    let macro_dump = run(cmd, None, path, logger)?;
    let macros = harvest_macros(&macro_dump);
    trace!("harvested {} macros for {}", macros.len(), path);

    let source = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let (source, includes) = blank_includes(&source);

    let mut cmd = Command::new(config.compiler_binary());
    cmd.args(preprocess_args(config))
        .args(fast_pass_args(config.arguments(), &macros))
        .arg("-");
    let output = run(cmd, Some(&source), path, logger)?;

    let mut preprocessed = process_output(&output, STDIN_FILE, path);
    preprocessed.includes = includes;
    Ok(preprocessed)
}

/// Arguments of the second fast pass, without the input.
///
/// Include directories and macro options are replaced by the harvested
/// macros. A `-U` of a macro that was not harvested is repeated after them,
/// so builtins the configuration removes stay removed.
fn fast_pass_args(
    arguments: &[String],
    macros: &IndexMap<String, (String, String)>,
) -> Vec<String> {
    let mut args = vec!["-nostdinc".to_string(), "-nostdinc++".to_string()];
    args.extend(
        arguments
            .iter()
            .filter(|arg| !arg.starts_with("-I") && !arg.starts_with("-D") && !arg.starts_with("-U"))
            .cloned(),
    );
    args.extend(macros.values().map(|(head, body)| format!("-D{head}={body}")));
    args.extend(
        arguments
            .iter()
            .filter(|arg| arg.strip_prefix("-U").is_some_and(|name| !macros.contains_key(name)))
            .cloned(),
    );
    args
}

/// Runs a preprocessor invocation and returns its stdout.
fn run(
    mut cmd: Command,
    stdin: Option<&str>,
    path: &str,
    logger: &dyn DiagnosticLogger,
) -> Result<String> {
    debug!("running {:?} {:?}", cmd.get_program(), cmd.get_args().collect::<Vec<_>>());

    let failed = |reason: String| Error::PreprocessFailed {
        file: path.to_string(),
        reason,
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });
    let mut child = cmd.spawn().map_err(|e| {
        failed(format!(
            "unable to launch {}: {}",
            cmd.get_program().to_string_lossy(),
            e
        ))
    })?;

    let output = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => std::thread::scope(|s| {
            let writer = s.spawn(move || pipe.write_all(input.as_bytes()));
            let output = child.wait_with_output();
            if let Ok(Err(e)) = writer.join() {
                debug!("writing stdin of preprocessor failed: {e}");
            }
            output
        }),
        _ => child.wait_with_output(),
    }
    .map_err(|e| failed(format!("unable to wait for preprocessor: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        if !stderr.trim().is_empty() {
            logger.log(LOG_SOURCE, &Diagnostic::error(stderr.trim()));
        }
        return Err(failed(format!(
            "{} exited with {}",
            cmd.get_program().to_string_lossy(),
            output.status
        )));
    }
    if !stderr.trim().is_empty() {
        logger.log(LOG_SOURCE, &Diagnostic::warning(stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses the output of `-dM -E`, later definitions superseding earlier ones.
/// Keys are the macro names, values the heads (`NAME` or `NAME(a,b)`) and
/// bodies.
fn harvest_macros(dump: &str) -> IndexMap<String, (String, String)> {
    let mut by_name: IndexMap<String, (String, String)> = IndexMap::new();
    for line in dump.lines() {
        let Some(rest) = directive(line, "define") else {
            continue;
        };
        let definition = parse_define(rest, 0);
        if RESERVED_MACROS.contains(&definition.name.as_str()) {
            continue;
        }
        let head = match &definition.parameters {
            Some(params) => format!("{}({})", definition.name, params.join(",")),
            None => definition.name.clone(),
        };
        by_name.insert(definition.name, (head, definition.replacement));
    }
    by_name
}

/// Blanks every `#include` line of `source`, recording the directives.
///
/// Lines inside block comments and `#if 0` groups are left alone.
fn blank_includes(source: &str) -> (String, Vec<IncludeDirective>) {
    let mut text = String::with_capacity(source.len());
    let mut includes = Vec::new();
    let mut in_comment = false;
    // nesting depth inside an `#if 0` group
    let mut disabled = 0usize;
    for (i, line) in source.lines().enumerate() {
        let commented = in_comment;
        in_comment = ends_in_comment(line, in_comment);

        if commented {
            text.push_str(line);
        } else if disabled > 0 {
            if ["if", "ifdef", "ifndef"].iter().any(|name| directive(line, name).is_some()) {
                disabled += 1;
            } else if directive(line, "endif").is_some() {
                disabled -= 1;
            } else if disabled == 1 {
                if directive(line, "else").is_some() {
                    disabled = 0;
                } else if let Some(rest) = directive(line, "elif") {
                    if !is_zero_condition(rest) {
                        disabled = 0;
                    }
                }
            }
            text.push_str(line);
        } else if let Some((name, kind)) = include_directive(line) {
            includes.push(IncludeDirective {
                name,
                kind,
                full_path: None,
                line: i as u32 + 1,
            });
        } else {
            if directive(line, "if").is_some_and(is_zero_condition) {
                disabled = 1;
            }
            text.push_str(line);
        }
        text.push('\n');
    }
    (text, includes)
}

fn is_zero_condition(condition: &str) -> bool {
    let end = [condition.find("//"), condition.find("/*")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(condition.len());
    condition[..end].trim() == "0"
}

/// Whether a block comment is open at the end of `line`, given whether one
/// was open at its start. String and character literals are skipped.
fn ends_in_comment(line: &str, mut in_comment: bool) -> bool {
    let mut chars = line.chars().peekable();
    let mut quote = None;
    while let Some(c) = chars.next() {
        if in_comment {
            if c == '*' && chars.next_if_eq(&'/').is_some() {
                in_comment = false;
            }
        } else if let Some(open) = quote {
            if c == '\\' {
                chars.next();
            } else if c == open {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '/' => match chars.peek() {
                    Some('*') => {
                        chars.next();
                        in_comment = true;
                    }
                    Some('/') => break,
                    _ => {}
                },
                _ => {}
            }
        }
    }
    in_comment
}

/// A GNU line marker: `# <line> "<file>" <flags>...`.
#[derive(Debug, PartialEq, Eq)]
struct LineMarker {
    line: u32,
    file: String,
    flags: Vec<u32>,
}

impl LineMarker {
    fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix("# ")?;
        let (number, rest) = rest.split_once(' ')?;
        let line = number.parse().ok()?;
        let (file, rest) = parse_quoted(rest)?;
        let flags = rest
            .split_whitespace()
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .ok()?;
        Some(Self { line, file, flags })
    }

    fn enters_file(&self) -> bool {
        self.flags.contains(&1)
    }

    fn render(&self, file: &str) -> String {
        let mut out = format!("# {} \"{}\"", self.line, escape(file));
        for flag in &self.flags {
            out.push_str(&format!(" {flag}"));
        }
        out
    }
}

fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let s = s.strip_prefix('"')?;
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?.1),
            '"' => return Some((out, &s[i + 1..])),
            c => out.push(c),
        }
    }
    None
}

fn escape(file: &str) -> String {
    file.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Returns the text after `#<name>` if `line` is that directive.
fn directive<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix(name)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn include_directive(line: &str) -> Option<(String, IncludeKind)> {
    let rest = ["include", "include_next", "import"]
        .iter()
        .find_map(|name| directive(line, name))?;
    let (close, kind) = match rest.chars().next()? {
        '<' => ('>', IncludeKind::System),
        '"' => ('"', IncludeKind::Local),
        _ => return None,
    };
    let name = &rest[1..];
    let end = name.find(close)?;
    Some((name[..end].to_string(), kind))
}

fn parse_define(rest: &str, line: u32) -> MacroDefinition {
    let name_end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(rest.len());
    let name = rest[..name_end].to_string();
    let after = &rest[name_end..];

    let (parameters, replacement) = match after.strip_prefix('(') {
        Some(params) => match params.split_once(')') {
            Some((params, body)) => (
                Some(
                    params
                        .split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect(),
                ),
                body,
            ),
            None => (None, after),
        },
        None => (None, after),
    };

    MacroDefinition {
        name,
        parameters,
        replacement: replacement.trim().to_string(),
        line,
    }
}

/// Post-processes preprocessor output.
///
/// `main_file` is the name the output uses for the parsed file, `path` the
/// name it is reported under afterwards.
fn process_output(output: &str, main_file: &str, path: &str) -> Preprocessed {
    let mut result = Preprocessed {
        source: String::with_capacity(output.len()),
        ..Preprocessed::default()
    };
    let mut current_file = String::new();
    let mut current_line = 1u32;
    let mut pending: Option<IncludeDirective> = None;
    let mut in_comment = false;

    for line in output.lines() {
        let marker = if in_comment { None } else { LineMarker::parse(line) };
        if let Some(marker) = marker {
            if let Some(mut include) = pending.take() {
                if marker.enters_file() {
                    include.full_path = Some(marker.file.clone());
                }
                result.includes.push(include);
            }
            let rendered = if marker.file == main_file {
                marker.render(path)
            } else {
                line.to_string()
            };
            result.source.push_str(&rendered);
            result.source.push('\n');
            current_line = marker.line;
            current_file = marker.file;
            continue;
        }

        result.includes.extend(pending.take());
        let in_main = current_file == main_file;
        let commented = in_comment;
        in_comment = ends_in_comment(line, in_comment);

        if commented {
            result.source.push_str(line);
        } else if let Some((name, kind)) = include_directive(line) {
            if in_main {
                pending = Some(IncludeDirective {
                    name,
                    kind,
                    full_path: None,
                    line: current_line,
                });
            }
        } else if let Some(rest) = directive(line, "define") {
            if in_main {
                result.macros.push(parse_define(rest, current_line));
            }
        } else if directive(line, "undef").is_none() {
            result.source.push_str(line);
        }
        result.source.push('\n');
        current_line += 1;
    }
    result.includes.extend(pending);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_marker_parse() {
        let marker = LineMarker::parse(r#"# 12 "/usr/include/stdio.h" 1 3 4"#).unwrap();
        assert_eq!(marker.line, 12);
        assert_eq!(marker.file, "/usr/include/stdio.h");
        assert_eq!(marker.flags, vec![1, 3, 4]);
        assert!(marker.enters_file());

        let marker = LineMarker::parse(r#"# 1 "C:\\src\\a.cpp""#).unwrap();
        assert_eq!(marker.file, r"C:\src\a.cpp");
        assert_eq!(marker.render("b.cpp"), r#"# 1 "b.cpp""#);

        assert!(LineMarker::parse("#define X 1").is_none());
        assert!(LineMarker::parse("# pragma once").is_none());
    }

    #[test]
    fn test_include_directive() {
        assert_eq!(
            include_directive(r#"#include "foo.h" /* clang -E -dI */"#),
            Some(("foo.h".to_string(), IncludeKind::Local))
        );
        assert_eq!(
            include_directive("  #  include <vector>"),
            Some(("vector".to_string(), IncludeKind::System))
        );
        assert_eq!(include_directive("#includex <vector>"), None);
        assert_eq!(include_directive("int include;"), None);
    }

    #[test]
    fn test_parse_define() {
        let def = parse_define("MAX(a, b) ((a) > (b) ? (a) : (b))", 3);
        assert_eq!(def.name, "MAX");
        assert_eq!(def.parameters, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(def.replacement, "((a) > (b) ? (a) : (b))");
        assert_eq!(def.line, 3);

        let def = parse_define("VALUE (1 + 2)", 0);
        assert_eq!(def.name, "VALUE");
        assert_eq!(def.parameters, None);
        assert_eq!(def.replacement, "(1 + 2)");

        let def = parse_define("EMPTY", 0);
        assert_eq!(def.replacement, "");
    }

    #[test]
    fn test_process_output_keeps_line_numbers() {
        let output = "\
# 1 \"a.cpp\"
# 1 \"<built-in>\" 1
#define __clang__ 1
# 1 \"a.cpp\" 2
#include \"b.h\" /* clang -E -dI */
# 1 \"/src/b.h\" 1
#define IN_HEADER 1
int b;
# 2 \"a.cpp\" 2
#define ANSWER 42
#undef ANSWER
int a = 42;
";
        let pp = process_output(output, "a.cpp", "a.cpp");

        assert_eq!(pp.includes.len(), 1);
        assert_eq!(pp.includes[0].name, "b.h");
        assert_eq!(pp.includes[0].full_path.as_deref(), Some("/src/b.h"));
        assert_eq!(pp.includes[0].line, 1);

        assert_eq!(pp.macros.len(), 1);
        assert_eq!(pp.macros[0].name, "ANSWER");
        assert_eq!(pp.macros[0].line, 2);

        assert_eq!(pp.source.lines().count(), output.lines().count());
        assert!(!pp.source.contains("#define"));
        assert!(!pp.source.contains("#include"));
        assert!(!pp.source.contains("#undef"));
        assert!(pp.source.contains("int a = 42;"));
        assert!(pp.source.contains("int b;"));
    }

    #[test]
    fn test_process_output_guarded_include_has_no_path() {
        let output = "\
# 1 \"a.cpp\"
#include \"b.h\" /* clang -E -dI */
#include \"b.h\" /* clang -E -dI */
# 1 \"/src/b.h\" 1
# 3 \"a.cpp\" 2
";
        let pp = process_output(output, "a.cpp", "a.cpp");
        assert_eq!(pp.includes.len(), 2);
        assert_eq!(pp.includes[0].full_path, None);
        assert_eq!(pp.includes[1].full_path.as_deref(), Some("/src/b.h"));
        assert_eq!(pp.includes[1].line, 2);
    }

    #[test]
    fn test_process_output_renames_stdin() {
        let output = "# 1 \"<stdin>\"\nint x;\n# 1 \"<command line>\" 1\n";
        let pp = process_output(output, STDIN_FILE, "/src/a.cpp");
        assert!(pp.source.starts_with("# 1 \"/src/a.cpp\"\n"));
        assert!(pp.source.contains("# 1 \"<command line>\" 1"));
    }

    #[test]
    fn test_harvest_macros_supersedes_and_skips_reserved() {
        let dump = "\
#define __cplusplus 201703L
#define FOO 1
#define MAX(a,b) ((a)>(b)?(a):(b))
#define FOO 2
";
        let macros = harvest_macros(dump);
        let pairs: Vec<_> = macros
            .iter()
            .map(|(name, (head, body))| (name.as_str(), head.as_str(), body.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("FOO", "FOO", "2"), ("MAX", "MAX(a,b)", "((a)>(b)?(a):(b))")]
        );
    }

    #[test]
    fn test_fast_pass_args_reapply_removed_macros() {
        let arguments: Vec<String> = [
            "-std=c++17",
            "-I/inc",
            "-DFOO=1",
            "-U__GNUC__",
            "-UBAR",
            "-fms-extensions",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let macros = harvest_macros("#define FOO 1\n#define BAR 2\n");

        let args = fast_pass_args(&arguments, &macros);
        assert_eq!(
            args,
            vec![
                "-nostdinc",
                "-nostdinc++",
                "-std=c++17",
                "-fms-extensions",
                "-DFOO=1",
                "-DBAR=2",
                "-U__GNUC__",
            ]
        );
    }

    #[test]
    fn test_process_output_skips_block_comments() {
        let output = "\
# 1 \"a.cpp\"
/*
#include \"old.h\"
#define OLD 1
*/
int a; /* trailing
# 3 \"not a marker\"
*/ int b;
#define NEW 1
";
        let pp = process_output(output, "a.cpp", "a.cpp");
        assert!(pp.includes.is_empty());
        assert_eq!(pp.macros.len(), 1);
        assert_eq!(pp.macros[0].name, "NEW");
        assert_eq!(pp.macros[0].line, 8);
        assert!(pp.source.contains("#include \"old.h\""));
        assert!(pp.source.contains("# 3 \"not a marker\""));
        assert_eq!(pp.source.lines().count(), output.lines().count());
    }

    #[test]
    fn test_ends_in_comment() {
        assert!(ends_in_comment("int a; /* open", false));
        assert!(!ends_in_comment("/* closed */ int a;", false));
        assert!(!ends_in_comment("still */ int a;", true));
        assert!(!ends_in_comment("// not /* a block", false));
        assert!(!ends_in_comment(r#"const char* s = "/*";"#, false));
        assert!(!ends_in_comment("char c = '\\''; int x;", false));
    }

    #[test]
    fn test_blank_includes() {
        let source = "#include <vector>\n#include \"a.h\"\nint x;\n";
        let (text, includes) = blank_includes(source);
        assert_eq!(text, "\n\nint x;\n");
        assert_eq!(includes.len(), 2);
        assert_eq!(includes[0].kind, IncludeKind::System);
        assert_eq!(includes[1].name, "a.h");
        assert_eq!(includes[1].line, 2);
        assert!(includes.iter().all(|i| i.full_path.is_none()));
    }

    #[test]
    fn test_blank_includes_skips_comments_and_disabled_groups() {
        let source = "\
/*
#include \"commented.h\"
*/
#if 0
#ifdef X
#include \"nested.h\"
#endif
#include \"disabled.h\"
#else
#include \"enabled.h\"
#endif
#if 0 // off
#include \"off.h\"
#elif 1
#include \"elif.h\"
#endif
";
        let (text, includes) = blank_includes(source);
        let names: Vec<_> = includes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["enabled.h", "elif.h"]);
        assert_eq!(includes[0].line, 10);
        assert!(text.contains("#include \"commented.h\""));
        assert!(text.contains("#include \"disabled.h\""));
        assert!(!text.contains("enabled.h"));
        assert_eq!(text.lines().count(), source.lines().count());
    }
}
