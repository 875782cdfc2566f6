use clap::Parser as _;
use cppast_clang::{find_config_for, ClangCompileConfig, ClangParser, CompilationDatabase};
use cppast_common::{
    parse_files_with, CompileConfig, CompileFlags, CppStandard, EntityIndex, Error, FileParser,
    Parser, Result as ParseResult, StderrLogger,
};
use miette::Result;
use std::io::Write;
use std::path::PathBuf;

mod dump;

#[derive(clap::Parser)]
#[command(name = "cppast")]
#[command(author, version, about = "Parse C++ files with libclang and print their entities")]
struct Cli {
    /// Directory containing compile_commands.json
    #[arg(long, value_name = "DIR")]
    database: Option<PathBuf>,

    /// C++ standard, e.g. c++17
    #[arg(long = "std", value_name = "STANDARD")]
    standard: Option<CppStandard>,

    /// Add an include directory
    #[arg(short = 'I', value_name = "DIR")]
    include_dirs: Vec<String>,

    /// Define a macro
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Undefine a macro
    #[arg(short = 'U', value_name = "NAME")]
    undefines: Vec<String>,

    /// Enable GNU extensions
    #[arg(long)]
    gnu_extensions: bool,

    /// Preprocess without resolving includes
    #[arg(long)]
    fast_preprocessing: bool,

    /// Keep the preprocessed output next to each file
    #[arg(long)]
    write_preprocessed: bool,

    /// Drop comments inside macro expansions
    #[arg(long)]
    remove_comments_in_macro: bool,

    /// Print debug diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Files to parse; all files of the database if omitted
    files: Vec<String>,
}

impl Cli {
    /// Applies the command line options on top of `config`.
    fn configure(&self, config: &mut ClangCompileConfig) {
        if self.standard.is_some() || self.gnu_extensions {
            let mut flags = config.flags();
            if self.gnu_extensions {
                flags |= CompileFlags::GNU_EXTENSIONS;
            }
            config.set_flags(self.standard.unwrap_or(config.standard()), flags);
        }
        for dir in &self.include_dirs {
            config.add_include_dir(dir);
        }
        for define in &self.defines {
            config.define_macro_flag(define);
        }
        for name in &self.undefines {
            config.undefine_macro(name);
        }
        config.set_fast_preprocessing(self.fast_preprocessing);
        config.set_write_preprocessed(self.write_preprocessed);
        config.set_keep_macro_comments(!self.remove_comments_in_macro);
    }
}

/// Prints every file as soon as it is parsed.
struct DumpingParser<'l, W> {
    parser: ClangParser<'l>,
    index: EntityIndex,
    out: W,
}

impl<W: Write> FileParser for DumpingParser<'_, W> {
    fn config_name(&self) -> &'static str {
        self.parser.config_name()
    }

    fn parse(&mut self, path: &str, config: &dyn CompileConfig) -> ParseResult<()> {
        let file = self.parser.parse(&self.index, path, config)?;
        dump::write_file(&mut self.out, &file).map_err(|e| Error::io(path, e))
    }
}

fn run(cli: &Cli, parser: &mut DumpingParser<'_, impl Write>) -> ParseResult<()> {
    let Some(dir) = &cli.database else {
        if cli.files.is_empty() {
            return Err(Error::invalid_argument(
                "no input files; pass files or --database",
            ));
        }
        return parse_files_with(parser, &cli.files, |_| {
            let mut config = ClangCompileConfig::new();
            cli.configure(&mut config);
            Ok(config)
        });
    };

    let database = CompilationDatabase::open(dir)?;
    if cli.files.is_empty() {
        parse_files_with(parser, database.files(), |file| {
            let mut config = ClangCompileConfig::from_database(&database, file)?;
            cli.configure(&mut config);
            Ok(config)
        })
    } else {
        parse_files_with(parser, &cli.files, |file| {
            let mut config = find_config_for(&database, file)?.ok_or_else(|| {
                Error::ConfigNotFound {
                    file: file.to_string(),
                }
            })?;
            cli.configure(&mut config);
            Ok(config)
        })
    }
}

struct StderrLog;

impl log::Log for StderrLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static STDERR_LOG: StderrLog = StderrLog;

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))?;

    let cli = Cli::parse();

    if log::set_logger(&STDERR_LOG).is_ok() {
        log::set_max_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        });
    }

    let logger = StderrLogger::new(cli.verbose);
    let mut parser = DumpingParser {
        parser: ClangParser::with_logger(&logger)?,
        index: EntityIndex::new(),
        out: std::io::stdout().lock(),
    };
    run(&cli, &mut parser)?;

    log::debug!("{} entities registered", parser.index.registrations());
    Ok(())
}
