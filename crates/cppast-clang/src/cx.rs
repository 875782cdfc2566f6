//! Scoped owners for libclang handles.

use cppast_common::SourceLocation;
use std::ffi::CStr;
use std::mem::MaybeUninit;

/// Convert a CXString to a Rust String, disposing the CXString.
pub(crate) fn cx_string_to_string(cx_string: clang_sys::CXString) -> String {
    unsafe {
        let c_str = clang_sys::clang_getCString(cx_string);
        let result = if c_str.is_null() {
            String::new()
        } else {
            CStr::from_ptr(c_str).to_string_lossy().into_owned()
        };
        clang_sys::clang_disposeString(cx_string);
        result
    }
}

/// The location a `#line`-aware reader would report.
///
/// Preprocessed input carries line markers, so presumed locations point
/// back into the original files.
pub(crate) fn presumed_location(location: clang_sys::CXSourceLocation) -> SourceLocation {
    let mut file = MaybeUninit::<clang_sys::CXString>::uninit();
    let mut line = 0;
    let mut column = 0;
    let file = unsafe {
        clang_sys::clang_getPresumedLocation(location, file.as_mut_ptr(), &mut line, &mut column);
        cx_string_to_string(file.assume_init())
    };
    SourceLocation {
        file: if file.is_empty() { None } else { Some(file) },
        line,
        column,
    }
}

/// Owned list of compile commands.
pub(crate) struct CompileCommands(clang_sys::CXCompileCommands);

impl CompileCommands {
    /// Takes ownership of `raw`, `None` if it is null.
    pub fn from_raw(raw: clang_sys::CXCompileCommands) -> Option<Self> {
        if raw.is_null() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn len(&self) -> u32 {
        unsafe { clang_sys::clang_CompileCommands_getSize(self.0) }
    }

    pub fn get(&self, i: u32) -> clang_sys::CXCompileCommand {
        unsafe { clang_sys::clang_CompileCommands_getCommand(self.0, i) }
    }
}

impl Drop for CompileCommands {
    fn drop(&mut self) {
        unsafe { clang_sys::clang_CompileCommands_dispose(self.0) }
    }
}

/// Owned translation unit.
pub(crate) struct TranslationUnit(clang_sys::CXTranslationUnit);

impl TranslationUnit {
    pub fn from_raw(raw: clang_sys::CXTranslationUnit) -> Option<Self> {
        if raw.is_null() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_raw(&self) -> clang_sys::CXTranslationUnit {
        self.0
    }

    pub fn cursor(&self) -> clang_sys::CXCursor {
        unsafe { clang_sys::clang_getTranslationUnitCursor(self.0) }
    }
}

impl Drop for TranslationUnit {
    fn drop(&mut self) {
        unsafe { clang_sys::clang_disposeTranslationUnit(self.0) }
    }
}

/// Owned diagnostic of a translation unit.
pub(crate) struct CxDiagnostic(clang_sys::CXDiagnostic);

impl CxDiagnostic {
    pub fn get(tu: &TranslationUnit, i: u32) -> Self {
        Self(unsafe { clang_sys::clang_getDiagnostic(tu.as_raw(), i) })
    }

    pub fn severity(&self) -> clang_sys::CXDiagnosticSeverity {
        unsafe { clang_sys::clang_getDiagnosticSeverity(self.0) }
    }

    pub fn spelling(&self) -> String {
        cx_string_to_string(unsafe { clang_sys::clang_getDiagnosticSpelling(self.0) })
    }

    pub fn location(&self) -> SourceLocation {
        presumed_location(unsafe { clang_sys::clang_getDiagnosticLocation(self.0) })
    }
}

impl Drop for CxDiagnostic {
    fn drop(&mut self) {
        unsafe { clang_sys::clang_disposeDiagnostic(self.0) }
    }
}
