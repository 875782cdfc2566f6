//! Compile configuration for the libclang parser.

use crate::database::{CompilationDatabase, CompileCommand};
use cppast_common::{CompileConfig, CompileFlags, CppStandard, NamedConfig, Result};
use log::warn;
use std::any::Any;

/// Binary used for preprocessing unless configured otherwise.
pub const DEFAULT_CLANG_BINARY: &str = match option_env!("CPPAST_CLANG_BINARY") {
    Some(binary) => binary,
    None => "clang++",
};

/// Version assumed for [`DEFAULT_CLANG_BINARY`].
pub const DEFAULT_CLANG_VERSION: &str = match option_env!("CPPAST_CLANG_VERSION") {
    Some(version) => version,
    None => "17.0.0",
};

const SYSTEM_INCLUDE_DIR: Option<&str> = option_env!("CPPAST_LIBCLANG_SYSTEM_INCLUDE_DIR");

pub const DEFAULT_STANDARD: CppStandard = CppStandard::Cpp17;

/// Options taking their value as the next argument; the value is skipped
/// together with the option when lifting a database command.
const OPTIONS_WITH_VALUE: &[&str] = &[
    "-o",
    "-x",
    "-MF",
    "-MT",
    "-MQ",
    "-include",
    "-imacros",
    "-isystem",
    "-iquote",
    "-idirafter",
    "-isysroot",
    "-target",
    "-arch",
    "-Xclang",
    "-Xlinker",
    "-Xpreprocessor",
    "--serialize-diagnostics",
];

/// Compilation config for the [`crate::ClangParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClangCompileConfig {
    compiler_binary: String,
    compiler_version: u32,
    arguments: Vec<String>,
    standard: CppStandard,
    flags: CompileFlags,
    write_preprocessed: bool,
    fast_preprocessing: bool,
    keep_macro_comments: bool,
}

impl Default for ClangCompileConfig {
    /// The binary, version and system include directory come from the build
    /// environment. `__cppast__`, `__cppast_major__` and `__cppast_minor__`
    /// are predefined.
    fn default() -> Self {
        let mut config = Self::bare();
        config.apply_defaults();
        config
    }
}

impl ClangCompileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    fn bare() -> Self {
        let (major, minor, patch) = parse_version(DEFAULT_CLANG_VERSION);
        Self {
            compiler_binary: DEFAULT_CLANG_BINARY.to_string(),
            compiler_version: pack_version(major, minor, patch),
            arguments: vec![format!("-std={}", DEFAULT_STANDARD.flag_value(false))],
            standard: DEFAULT_STANDARD,
            flags: CompileFlags::empty(),
            write_preprocessed: false,
            fast_preprocessing: false,
            keep_macro_comments: true,
        }
    }

    fn apply_defaults(&mut self) {
        if let Some(dir) = SYSTEM_INCLUDE_DIR {
            self.add_include_dir(dir);
        }
        self.define_macro("__cppast__", "\"libclang\"");
        self.define_macro("__cppast_major__", env!("CARGO_PKG_VERSION_MAJOR"));
        self.define_macro("__cppast_minor__", env!("CARGO_PKG_VERSION_MINOR"));
    }

    /// Creates the configuration recorded in `database` for `file`.
    ///
    /// Only options that could also be set through [`CompileConfig`] are
    /// taken over: include directories, macro definitions and removals, the
    /// standard and the MS extension flags. Relative include directories are
    /// resolved against the command's directory. A `-std=` value naming no
    /// known standard is skipped with a warning. The default configuration is
    /// applied on top.
    ///
    /// Header files are usually not recorded; see [`crate::find_config_for`].
    pub fn from_database(database: &CompilationDatabase, file: &str) -> Result<Self> {
        let commands = database.commands_for(file)?;

        let mut config = Self::bare();
        let mut standard = None;
        let mut flags = CompileFlags::empty();
        for command in &commands {
            for flag in lift_flags(command) {
                match flag {
                    LiftedFlag::Include(dir) => {
                        let dir = command.directory.join(dir);
                        config.add_include_dir(&dir.to_string_lossy());
                    }
                    LiftedFlag::Define(definition) => config.define_macro_flag(definition),
                    LiftedFlag::Undefine(name) => config.undefine_macro(name),
                    LiftedFlag::Standard(value) => match CppStandard::from_flag_value(value) {
                        Ok((std, gnu)) => {
                            standard = Some(std);
                            if gnu {
                                flags.insert(CompileFlags::GNU_EXTENSIONS);
                            }
                        }
                        Err(e) => warn!("{file}: ignoring -std={value}: {e}"),
                    },
                    LiftedFlag::Extension(flag) => flags.insert(flag),
                }
            }
        }
        config.set_flags(standard.unwrap_or(DEFAULT_STANDARD), flags);
        config.apply_defaults();
        Ok(config)
    }

    /// The arguments passed to the front-end, in order.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn standard(&self) -> CppStandard {
        self.standard
    }

    pub fn flags(&self) -> CompileFlags {
        self.flags
    }

    /// Sets the `clang++` binary used for preprocessing and its version.
    pub fn set_compiler_binary(&mut self, binary: impl Into<String>, major: u32, minor: u32, patch: u32) {
        self.compiler_binary = binary.into();
        self.compiler_version = pack_version(major, minor, patch);
    }

    /// Whether the preprocessed file is written next to the source as
    /// `<file>.pp`. Default `false`.
    pub fn set_write_preprocessed(&mut self, enabled: bool) {
        self.write_preprocessed = enabled;
    }

    /// Enables two-pass preprocessing that does not resolve includes.
    /// Default `false`.
    ///
    /// The macros of the whole translation unit are collected first, then the
    /// file is preprocessed with its includes removed and those macros forced.
    /// This breaks if the parsed file defines the same macro more than once
    /// or relies on the order of macro directives. Include directives of
    /// files parsed this way carry no resolved path.
    pub fn set_fast_preprocessing(&mut self, enabled: bool) {
        self.fast_preprocessing = enabled;
    }

    /// Whether comments in macro expansions are kept (`-CC`) or dropped
    /// (`-C`). Default `true`.
    pub fn set_keep_macro_comments(&mut self, enabled: bool) {
        self.keep_macro_comments = enabled;
    }

    /// Defines a macro from the operand of `-D`: `NAME`, `NAME=VALUE` or
    /// `NAME=`.
    ///
    /// Unlike `define_macro(name, "")`, which defines `NAME` as `1`, the
    /// `NAME=` form defines it with an empty replacement.
    pub fn define_macro_flag(&mut self, definition: &str) {
        match definition.split_once('=') {
            Some((name, "")) => {
                self.remove_macro_args(name);
                self.arguments.push(format!("-D{name}="));
            }
            Some((name, value)) => self.define_macro(name, value),
            None => self.define_macro(definition, ""),
        }
    }

    pub(crate) fn view(&self) -> ConfigView<'_> {
        ConfigView { config: self }
    }

    fn remove_macro_args(&mut self, name: &str) {
        self.arguments
            .retain(|arg| !is_macro_arg(arg, "-D", name) && !is_macro_arg(arg, "-U", name));
    }
}

impl CompileConfig for ClangCompileConfig {
    fn set_flags(&mut self, standard: CppStandard, flags: CompileFlags) {
        let std_arg = format!(
            "-std={}",
            standard.flag_value(flags.contains(CompileFlags::GNU_EXTENSIONS))
        );
        self.arguments.retain(|arg| !arg.starts_with("-std="));
        self.arguments.insert(0, std_arg);

        self.arguments
            .retain(|arg| arg != "-fms-extensions" && arg != "-fms-compatibility");
        if flags.contains(CompileFlags::MS_EXTENSIONS) {
            self.arguments.push("-fms-extensions".to_string());
        }
        if flags.contains(CompileFlags::MS_COMPATIBILITY) {
            self.arguments.push("-fms-compatibility".to_string());
        }

        self.standard = standard;
        self.flags = flags;
    }

    fn add_include_dir(&mut self, path: &str) {
        let arg = format!("-I{path}");
        if !self.arguments.contains(&arg) {
            self.arguments.push(arg);
        }
    }

    fn define_macro(&mut self, name: &str, value: &str) {
        self.remove_macro_args(name);
        if value.is_empty() {
            self.arguments.push(format!("-D{name}"));
        } else {
            self.arguments.push(format!("-D{name}={value}"));
        }
    }

    fn undefine_macro(&mut self, name: &str) {
        self.remove_macro_args(name);
        self.arguments.push(format!("-U{name}"));
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl NamedConfig for ClangCompileConfig {
    const NAME: &'static str = "libclang";
}

/// Read-only access to the knobs only the parser driver needs.
pub(crate) struct ConfigView<'a> {
    config: &'a ClangCompileConfig,
}

impl ConfigView<'_> {
    pub fn compiler_binary(&self) -> &str {
        &self.config.compiler_binary
    }

    pub fn compiler_version(&self) -> u32 {
        self.config.compiler_version
    }

    pub fn arguments(&self) -> &[String] {
        &self.config.arguments
    }

    pub fn write_preprocessed(&self) -> bool {
        self.config.write_preprocessed
    }

    pub fn fast_preprocessing(&self) -> bool {
        self.config.fast_preprocessing
    }

    pub fn keep_macro_comments(&self) -> bool {
        self.config.keep_macro_comments
    }
}

/// An option of a database command that survives lifting.
#[derive(Debug, PartialEq, Eq)]
enum LiftedFlag<'a> {
    Include(&'a str),
    Define(&'a str),
    Undefine(&'a str),
    Standard(&'a str),
    Extension(CompileFlags),
}

/// Extracts the liftable options of `command`, dropping the program name,
/// the input file and everything else.
fn lift_flags(command: &CompileCommand) -> Vec<LiftedFlag<'_>> {
    let mut lifted = Vec::new();
    let mut args = command.arguments.iter().skip(1).map(String::as_str);

    while let Some(arg) = args.next() {
        let flag = if let Some(rest) = arg.strip_prefix("-I") {
            separate_or_joined(rest, &mut args).map(LiftedFlag::Include)
        } else if let Some(rest) = arg.strip_prefix("-D") {
            separate_or_joined(rest, &mut args).map(LiftedFlag::Define)
        } else if let Some(rest) = arg.strip_prefix("-U") {
            separate_or_joined(rest, &mut args).map(LiftedFlag::Undefine)
        } else if let Some(value) = arg
            .strip_prefix("-std=")
            .or_else(|| arg.strip_prefix("--std="))
        {
            Some(LiftedFlag::Standard(value))
        } else if arg == "-fms-extensions" {
            Some(LiftedFlag::Extension(CompileFlags::MS_EXTENSIONS))
        } else if arg == "-fms-compatibility" {
            Some(LiftedFlag::Extension(CompileFlags::MS_COMPATIBILITY))
        } else {
            if OPTIONS_WITH_VALUE.contains(&arg) {
                args.next();
            }
            None
        };
        lifted.extend(flag);
    }

    lifted
}

fn separate_or_joined<'a>(
    rest: &'a str,
    args: &mut impl Iterator<Item = &'a str>,
) -> Option<&'a str> {
    if rest.is_empty() {
        args.next()
    } else {
        Some(rest)
    }
}

fn is_macro_arg(arg: &str, prefix: &str, name: &str) -> bool {
    match arg.strip_prefix(prefix).and_then(|rest| rest.strip_prefix(name)) {
        Some(rest) => rest.is_empty() || rest.starts_with('='),
        None => false,
    }
}

pub(crate) fn pack_version(major: u32, minor: u32, patch: u32) -> u32 {
    major * 10000 + minor * 100 + patch
}

fn parse_version(version: &str) -> (u32, u32, u32) {
    let mut parts = version
        .split('.')
        .map(|part| part.trim().parse::<u32>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn count_std(config: &ClangCompileConfig) -> usize {
        config
            .arguments()
            .iter()
            .filter(|arg| arg.starts_with("-std="))
            .count()
    }

    fn command(args: &[&str]) -> CompileCommand {
        CompileCommand {
            directory: PathBuf::from("/build"),
            file: PathBuf::from("/src/a.cpp"),
            arguments: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_default_predefines_cppast_macros() {
        let config = ClangCompileConfig::default();
        let args = config.arguments();
        assert!(args.contains(&"-D__cppast__=\"libclang\"".to_string()));
        assert!(args.iter().any(|a| a.starts_with("-D__cppast_major__=")));
        assert!(args.iter().any(|a| a.starts_with("-D__cppast_minor__=")));
        assert_eq!(count_std(&config), 1);
        assert!(!config.view().compiler_binary().is_empty());
        assert_eq!(config.name(), "libclang");
    }

    #[test]
    fn test_set_standard_replaces_previous() {
        let mut config = ClangCompileConfig::default();
        config
            .set_standard("c++17", CompileFlags::GNU_EXTENSIONS | CompileFlags::MS_EXTENSIONS)
            .unwrap();
        assert!(config.arguments().contains(&"-std=gnu++17".to_string()));
        assert!(config.arguments().contains(&"-fms-extensions".to_string()));

        config.set_standard("c++20", CompileFlags::empty()).unwrap();
        assert_eq!(count_std(&config), 1);
        assert!(config.arguments().contains(&"-std=c++20".to_string()));
        assert!(!config.arguments().iter().any(|a| a.contains("gnu++")));
        assert!(!config.arguments().contains(&"-fms-extensions".to_string()));
        assert_eq!(config.standard(), CppStandard::Cpp20);
    }

    #[test]
    fn test_set_standard_rejects_unknown() {
        let mut config = ClangCompileConfig::default();
        let before = config.clone();
        let err = config.set_standard("c++99", CompileFlags::empty()).unwrap_err();
        assert_eq!(err.kind(), cppast_common::ErrorKind::InvalidArgument);
        assert_eq!(config, before);
    }

    #[test]
    fn test_include_dirs_deduplicated() {
        let mut config = ClangCompileConfig::default();
        config.add_include_dir("/a");
        config.add_include_dir("/b");
        config.add_include_dir("/a");
        let includes: Vec<_> = config
            .arguments()
            .iter()
            .filter(|a| *a == "-I/a" || *a == "-I/b")
            .collect();
        assert_eq!(includes, vec!["-I/a", "-I/b"]);
    }

    #[test]
    fn test_define_undefine_define() {
        let mut config = ClangCompileConfig::default();
        config.define_macro("X", "1");
        config.undefine_macro("X");
        config.define_macro("X", "2");

        let x_args: Vec<_> = config
            .arguments()
            .iter()
            .filter(|a| is_macro_arg(a, "-D", "X") || is_macro_arg(a, "-U", "X"))
            .collect();
        assert_eq!(x_args, vec!["-DX=2"]);
    }

    #[test]
    fn test_undefine_removes_definition() {
        let mut config = ClangCompileConfig::default();
        config.define_macro("FOO", "");
        config.define_macro("FOOBAR", "1");
        config.undefine_macro("FOO");
        assert!(!config.arguments().contains(&"-DFOO".to_string()));
        assert!(config.arguments().contains(&"-DFOOBAR=1".to_string()));
        assert_eq!(config.arguments().last().unwrap(), "-UFOO");
    }

    #[test]
    fn test_define_macro_flag_keeps_empty_value() {
        let mut config = ClangCompileConfig::default();
        config.define_macro_flag("EMPTY=");
        config.define_macro_flag("ONE");
        config.define_macro_flag("TWO=2");
        let args = config.arguments();
        assert!(args.contains(&"-DEMPTY=".to_string()));
        assert!(!args.contains(&"-DEMPTY".to_string()));
        assert!(args.contains(&"-DONE".to_string()));
        assert!(args.contains(&"-DTWO=2".to_string()));

        config.define_macro_flag("EMPTY=3");
        assert!(!config.arguments().contains(&"-DEMPTY=".to_string()));
        assert!(config.arguments().contains(&"-DEMPTY=3".to_string()));
    }

    #[test]
    fn test_compiler_binary_version_packed() {
        let mut config = ClangCompileConfig::default();
        config.set_compiler_binary("/usr/bin/clang++-15", 15, 0, 7);
        assert_eq!(config.view().compiler_binary(), "/usr/bin/clang++-15");
        assert_eq!(config.view().compiler_version(), 150007);
    }

    #[test]
    fn test_boolean_knobs() {
        let mut config = ClangCompileConfig::default();
        assert!(!config.view().write_preprocessed());
        assert!(!config.view().fast_preprocessing());
        assert!(config.view().keep_macro_comments());

        config.set_write_preprocessed(true);
        config.set_fast_preprocessing(true);
        config.set_keep_macro_comments(false);
        assert!(config.view().write_preprocessed());
        assert!(config.view().fast_preprocessing());
        assert!(!config.view().keep_macro_comments());
    }

    #[test]
    fn test_lift_flags_filters_unknown() {
        let cmd = command(&[
            "clang++",
            "-std=c++14",
            "-I/src/inc",
            "-I",
            "rel/inc",
            "-DFOO=1",
            "-D",
            "BAR",
            "-UBAZ",
            "-O2",
            "-isystem",
            "/opt/include",
            "-fms-compatibility",
            "-o",
            "a.o",
            "-c",
            "/src/a.cpp",
        ]);
        assert_eq!(
            lift_flags(&cmd),
            vec![
                LiftedFlag::Standard("c++14"),
                LiftedFlag::Include("/src/inc"),
                LiftedFlag::Include("rel/inc"),
                LiftedFlag::Define("FOO=1"),
                LiftedFlag::Define("BAR"),
                LiftedFlag::Undefine("BAZ"),
                LiftedFlag::Extension(CompileFlags::MS_COMPATIBILITY),
            ]
        );
    }

    #[test]
    fn test_lift_flags_skips_program_name() {
        let cmd = command(&["-DNOT_A_FLAG", "-c", "/src/a.cpp"]);
        assert!(lift_flags(&cmd).is_empty());
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("17.0.6"), (17, 0, 6));
        assert_eq!(parse_version("4"), (4, 0, 0));
        assert_eq!(pack_version(4, 0, 0), 40000);
    }

    #[test]
    fn test_is_macro_arg() {
        assert!(is_macro_arg("-DX", "-D", "X"));
        assert!(is_macro_arg("-DX=1", "-D", "X"));
        assert!(!is_macro_arg("-DXY=1", "-D", "X"));
        assert!(!is_macro_arg("-UX", "-D", "X"));
    }
}
