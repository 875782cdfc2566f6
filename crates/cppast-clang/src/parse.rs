//! Parsing with libclang.

use crate::config::ClangCompileConfig;
use crate::cx::{cx_string_to_string, presumed_location, CxDiagnostic, TranslationUnit};
use crate::preprocess::{preprocess, Preprocessed};
use cppast_common::{
    check_config_name, default_logger, CompileConfig, CppEntity, CppEntityKind, CppFile,
    Diagnostic, DiagnosticLogger, EntityId, EntityIndex, Error, IndexEntry, NamedConfig, NodeId,
    Parser, Result, Severity,
};
use log::debug;
use std::ffi::{c_char, c_ulong, CString};
use std::fmt;
use std::ptr;

const LOG_SOURCE: &str = "libclang";

/// Parser that preprocesses with `clang++` and parses with libclang.
///
/// Not `Sync`: a libclang index must not be used from two threads at once.
pub struct ClangParser<'l> {
    index: clang_sys::CXIndex,
    logger: &'l dyn DiagnosticLogger,
}

unsafe impl Send for ClangParser<'_> {}

impl ClangParser<'static> {
    /// Create a parser reporting to the default stderr logger.
    pub fn new() -> Result<Self> {
        ClangParser::with_logger(default_logger())
    }
}

impl<'l> ClangParser<'l> {
    pub fn with_logger(logger: &'l dyn DiagnosticLogger) -> Result<Self> {
        let index = unsafe { clang_sys::clang_createIndex(0, 0) };
        if index.is_null() {
            return Err(index_creation_failed());
        }
        Ok(Self { index, logger })
    }

    pub fn logger(&self) -> &dyn DiagnosticLogger {
        self.logger
    }

    fn parse_clang(
        &self,
        index: &EntityIndex,
        path: &str,
        config: &ClangCompileConfig,
        phase: &mut PhaseTracker<'_>,
    ) -> Result<CppFile> {
        let view = config.view();

        phase.enter(Phase::Preprocessing);
        let Preprocessed {
            source,
            includes,
            macros,
        } = preprocess(&view, path, self.logger)?;

        phase.enter(Phase::Parsing);
        let tu = self.parse_source(path, &source, view.arguments())?;
        let errors = self.drain_diagnostics(path, &tu)?;

        phase.enter(Phase::Lifting);
        let mut file = CppFile::new(path);
        let mut lift = Lift {
            file: &mut file,
            index,
            path,
            parent: None,
        };
        unsafe {
            clang_sys::clang_visitChildren(
                tu.cursor(),
                visit,
                &mut lift as *mut Lift as clang_sys::CXClientData,
            );
        }

        for include in includes {
            file.add_include(include);
        }
        for definition in macros {
            file.add_macro(definition);
        }
        file.set_full_include_paths(!view.fast_preprocessing());
        file.set_had_errors(errors > 0);

        phase.enter(Phase::Done);
        Ok(file)
    }

    fn parse_source(&self, path: &str, source: &str, arguments: &[String]) -> Result<TranslationUnit> {
        let c_path = CString::new(path)
            .map_err(|_| Error::invalid_argument(format!("invalid path: {path}")))?;

        let args = ["-x", "c++", "-Wno-pragma-once-outside-header"]
            .into_iter()
            .chain(arguments.iter().map(String::as_str))
            .map(|arg| {
                CString::new(arg)
                    .map_err(|_| Error::invalid_argument(format!("invalid argument: {arg}")))
            })
            .collect::<Result<Vec<_>>>()?;
        let c_args: Vec<*const c_char> = args.iter().map(|s| s.as_ptr()).collect();

        let mut unsaved_file = clang_sys::CXUnsavedFile {
            Filename: c_path.as_ptr(),
            Contents: source.as_ptr() as *const c_char,
            Length: source.len() as c_ulong,
        };

        let mut raw = ptr::null_mut();
        let code = unsafe {
            clang_sys::clang_parseTranslationUnit2(
                self.index,
                c_path.as_ptr(),
                c_args.as_ptr(),
                c_args.len() as i32,
                &mut unsaved_file,
                1,
                clang_sys::CXTranslationUnit_Incomplete | clang_sys::CXTranslationUnit_KeepGoing,
                &mut raw,
            )
        };

        match TranslationUnit::from_raw(raw) {
            Some(tu) if code == clang_sys::CXError_Success => Ok(tu),
            _ => Err(Error::ParseFailed {
                file: path.to_string(),
                reason: format!("libclang returned error code {code}"),
            }),
        }
    }

    /// Forwards the diagnostics of `tu` to the logger and returns the number
    /// of errors. A fatal diagnostic fails the parse.
    fn drain_diagnostics(&self, path: &str, tu: &TranslationUnit) -> Result<usize> {
        let mut errors = 0;
        let count = unsafe { clang_sys::clang_getNumDiagnostics(tu.as_raw()) };
        for i in 0..count {
            let diag = CxDiagnostic::get(tu, i);
            let severity = match diag.severity() {
                clang_sys::CXDiagnostic_Note => Severity::Info,
                clang_sys::CXDiagnostic_Warning => Severity::Warning,
                clang_sys::CXDiagnostic_Error => Severity::Error,
                clang_sys::CXDiagnostic_Fatal => Severity::Critical,
                _ => continue,
            };
            let message = diag.spelling();
            self.logger.log(
                LOG_SOURCE,
                &Diagnostic::new(severity, message.clone()).with_location(diag.location()),
            );

            match severity {
                Severity::Critical => {
                    return Err(Error::ParseFailed {
                        file: path.to_string(),
                        reason: message,
                    })
                }
                Severity::Error => errors += 1,
                _ => {}
            }
        }
        Ok(errors)
    }
}

impl Parser for ClangParser<'_> {
    fn config_name(&self) -> &'static str {
        ClangCompileConfig::NAME
    }

    fn parse(&self, index: &EntityIndex, path: &str, config: &dyn CompileConfig) -> Result<CppFile> {
        check_config_name(self.config_name(), config.name())?;
        let config = config
            .as_any()
            .downcast_ref::<ClangCompileConfig>()
            .ok_or_else(|| Error::invalid_argument("configuration is not a ClangCompileConfig"))?;

        let mut phase = PhaseTracker::new(path);
        let result = self.parse_clang(index, path, config, &mut phase);
        if let Err(e) = &result {
            phase.enter(Phase::Failed);
            self.logger.log(LOG_SOURCE, &Diagnostic::error(e.to_string()));
        }
        result
    }
}

impl Drop for ClangParser<'_> {
    fn drop(&mut self) {
        unsafe {
            clang_sys::clang_disposeIndex(self.index);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Preprocessing,
    Parsing,
    Lifting,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Preprocessing => "preprocessing",
            Phase::Parsing => "parsing",
            Phase::Lifting => "lifting",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct PhaseTracker<'a> {
    path: &'a str,
    phase: Phase,
}

impl<'a> PhaseTracker<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            phase: Phase::Idle,
        }
    }

    fn enter(&mut self, next: Phase) {
        debug!("{}: {} -> {}", self.path, self.phase, next);
        self.phase = next;
    }
}

/// State of the AST walk.
struct Lift<'a> {
    file: &'a mut CppFile,
    index: &'a EntityIndex,
    path: &'a str,
    parent: Option<NodeId>,
}

extern "C" fn visit(
    cursor: clang_sys::CXCursor,
    _parent: clang_sys::CXCursor,
    data: clang_sys::CXClientData,
) -> clang_sys::CXChildVisitResult {
    unsafe {
        let lift = &mut *(data as *mut Lift);

        let location = presumed_location(clang_sys::clang_getCursorLocation(cursor));
        if location.file.as_deref() != Some(lift.path) {
            return clang_sys::CXChildVisit_Continue;
        }
        let Some(kind) = entity_kind(clang_sys::clang_getCursorKind(cursor)) else {
            return clang_sys::CXChildVisit_Continue;
        };

        let name = match kind {
            CppEntityKind::AccessSpecifier => access_name(cursor).to_string(),
            _ => cx_string_to_string(clang_sys::clang_getCursorSpelling(cursor)),
        };
        let mut entity = CppEntity::new(kind, name, location);
        let usr = cx_string_to_string(clang_sys::clang_getCursorUSR(cursor));
        if !usr.is_empty() {
            entity = entity.with_id(EntityId::new(usr));
        }
        let comment = cx_string_to_string(clang_sys::clang_Cursor_getRawCommentText(cursor));
        if !comment.is_empty() {
            entity = entity.with_comment(comment);
        }

        let id = entity.id.clone();
        let node = lift.file.add_entity(entity, lift.parent);
        if let Some(id) = id {
            lift.index.register(
                id,
                IndexEntry {
                    file: lift.path.into(),
                    node,
                    kind,
                },
            );
        }

        if kind.is_scope() {
            let outer = lift.parent.replace(node);
            clang_sys::clang_visitChildren(cursor, visit, data);
            (*(data as *mut Lift)).parent = outer;
        }

        clang_sys::CXChildVisit_Continue
    }
}

fn entity_kind(kind: clang_sys::CXCursorKind) -> Option<CppEntityKind> {
    let kind = match kind {
        clang_sys::CXCursor_Namespace => CppEntityKind::Namespace,
        clang_sys::CXCursor_NamespaceAlias => CppEntityKind::NamespaceAlias,
        clang_sys::CXCursor_UsingDirective => CppEntityKind::UsingDirective,
        clang_sys::CXCursor_UsingDeclaration => CppEntityKind::UsingDeclaration,
        clang_sys::CXCursor_LinkageSpec => CppEntityKind::LanguageLinkage,
        clang_sys::CXCursor_TypeAliasDecl => CppEntityKind::TypeAlias,
        clang_sys::CXCursor_TypedefDecl => CppEntityKind::Typedef,
        clang_sys::CXCursor_EnumDecl => CppEntityKind::Enum,
        clang_sys::CXCursor_EnumConstantDecl => CppEntityKind::EnumValue,
        clang_sys::CXCursor_ClassDecl => CppEntityKind::Class,
        clang_sys::CXCursor_StructDecl => CppEntityKind::Struct,
        clang_sys::CXCursor_UnionDecl => CppEntityKind::Union,
        clang_sys::CXCursor_CXXBaseSpecifier => CppEntityKind::BaseClass,
        clang_sys::CXCursor_CXXAccessSpecifier => CppEntityKind::AccessSpecifier,
        clang_sys::CXCursor_FriendDecl => CppEntityKind::Friend,
        clang_sys::CXCursor_FieldDecl => CppEntityKind::MemberVariable,
        clang_sys::CXCursor_VarDecl => CppEntityKind::Variable,
        clang_sys::CXCursor_FunctionDecl => CppEntityKind::Function,
        clang_sys::CXCursor_CXXMethod => CppEntityKind::MemberFunction,
        clang_sys::CXCursor_ConversionFunction => CppEntityKind::ConversionOperator,
        clang_sys::CXCursor_Constructor => CppEntityKind::Constructor,
        clang_sys::CXCursor_Destructor => CppEntityKind::Destructor,
        clang_sys::CXCursor_ParmDecl => CppEntityKind::FunctionParameter,
        clang_sys::CXCursor_TemplateTypeParameter => CppEntityKind::TemplateTypeParameter,
        clang_sys::CXCursor_NonTypeTemplateParameter => CppEntityKind::NonTypeTemplateParameter,
        clang_sys::CXCursor_TemplateTemplateParameter => CppEntityKind::TemplateTemplateParameter,
        clang_sys::CXCursor_FunctionTemplate => CppEntityKind::FunctionTemplate,
        clang_sys::CXCursor_ClassTemplate => CppEntityKind::ClassTemplate,
        clang_sys::CXCursor_ClassTemplatePartialSpecialization => {
            CppEntityKind::ClassTemplatePartialSpecialization
        }
        clang_sys::CXCursor_TypeAliasTemplateDecl => CppEntityKind::AliasTemplate,
        clang_sys::CXCursor_StaticAssert => CppEntityKind::StaticAssert,
        clang_sys::CXCursor_UnexposedDecl => CppEntityKind::Unexposed,
        _ => return None,
    };
    Some(kind)
}

fn access_name(cursor: clang_sys::CXCursor) -> &'static str {
    match unsafe { clang_sys::clang_getCXXAccessSpecifier(cursor) } {
        clang_sys::CX_CXXPublic => "public",
        clang_sys::CX_CXXProtected => "protected",
        clang_sys::CX_CXXPrivate => "private",
        _ => "",
    }
}

/// libclang declined to create an index; no file is involved yet.
fn index_creation_failed() -> Error {
    Error::ParseFailed {
        file: "libclang".to_string(),
        reason: "clang_createIndex returned no index".to_string(),
    }
}
