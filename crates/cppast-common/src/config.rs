//! Backend-independent compile configuration.

use crate::error::{Error, Result};
use std::any::Any;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// A C++ language standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CppStandard {
    Cpp98,
    Cpp03,
    Cpp11,
    Cpp14,
    Cpp1z,
    Cpp17,
    Cpp2a,
    Cpp20,
    Cpp2b,
    Cpp23,
    Cpp2c,
    Cpp26,
}

impl CppStandard {
    pub const ALL: [CppStandard; 12] = [
        CppStandard::Cpp98,
        CppStandard::Cpp03,
        CppStandard::Cpp11,
        CppStandard::Cpp14,
        CppStandard::Cpp1z,
        CppStandard::Cpp17,
        CppStandard::Cpp2a,
        CppStandard::Cpp20,
        CppStandard::Cpp2b,
        CppStandard::Cpp23,
        CppStandard::Cpp2c,
        CppStandard::Cpp26,
    ];

    /// The version suffix shared by `c++XX` and `gnu++XX`.
    fn version(self) -> &'static str {
        match self {
            CppStandard::Cpp98 => "98",
            CppStandard::Cpp03 => "03",
            CppStandard::Cpp11 => "11",
            CppStandard::Cpp14 => "14",
            CppStandard::Cpp1z => "1z",
            CppStandard::Cpp17 => "17",
            CppStandard::Cpp2a => "2a",
            CppStandard::Cpp20 => "20",
            CppStandard::Cpp2b => "2b",
            CppStandard::Cpp23 => "23",
            CppStandard::Cpp2c => "2c",
            CppStandard::Cpp26 => "26",
        }
    }

    /// The value of `-std=` for this standard.
    pub fn flag_value(self, gnu_extensions: bool) -> String {
        let dialect = if gnu_extensions { "gnu++" } else { "c++" };
        format!("{}{}", dialect, self.version())
    }

    /// Parses a `-std=` value, reporting whether it names a GNU dialect.
    ///
    /// The draft names `0x` and `1y` are accepted as C++11 and C++14.
    pub fn from_flag_value(value: &str) -> Result<(Self, bool)> {
        let (version, gnu) = if let Some(v) = value.strip_prefix("gnu++") {
            (v, true)
        } else if let Some(v) = value.strip_prefix("c++") {
            (v, false)
        } else {
            return Err(Error::invalid_argument(format!(
                "unrecognized C++ standard '{value}'"
            )));
        };
        let std = match version {
            "0x" => Some(CppStandard::Cpp11),
            "1y" => Some(CppStandard::Cpp14),
            _ => Self::ALL.into_iter().find(|std| std.version() == version),
        };
        std.map(|std| (std, gnu))
            .ok_or_else(|| Error::invalid_argument(format!("unrecognized C++ standard '{value}'")))
    }
}

impl fmt::Display for CppStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flag_value(false))
    }
}

impl FromStr for CppStandard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match Self::from_flag_value(s)? {
            (std, false) => Ok(std),
            (_, true) => Err(Error::invalid_argument(format!(
                "'{s}' is a GNU dialect, pass CompileFlags::GNU_EXTENSIONS instead"
            ))),
        }
    }
}

/// Compiler extension toggles.
///
/// The toggles are independent of each other; the bit packing is only storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CompileFlags(u8);

impl CompileFlags {
    pub const GNU_EXTENSIONS: CompileFlags = CompileFlags(1 << 0);
    pub const MS_EXTENSIONS: CompileFlags = CompileFlags(1 << 1);
    pub const MS_COMPATIBILITY: CompileFlags = CompileFlags(1 << 2);

    pub const fn empty() -> Self {
        CompileFlags(0)
    }

    pub const fn contains(self, other: CompileFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: CompileFlags) {
        self.0 |= other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CompileFlags {
    type Output = CompileFlags;

    fn bitor(self, rhs: CompileFlags) -> CompileFlags {
        CompileFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for CompileFlags {
    fn bitor_assign(&mut self, rhs: CompileFlags) {
        self.0 |= rhs.0;
    }
}

/// Configuration of one translation unit, as accepted by a [`crate::Parser`].
///
/// Backends store the effective argument set; this trait is the only way
/// to mutate it.
pub trait CompileConfig: Any {
    /// Replaces the language standard and the extension flags.
    fn set_flags(&mut self, standard: CppStandard, flags: CompileFlags);

    /// Adds an include search directory, ignoring duplicates.
    fn add_include_dir(&mut self, path: &str);

    /// Defines `name`, replacing any earlier definition or removal of it.
    /// An empty `value` defines the macro without a replacement.
    fn define_macro(&mut self, name: &str, value: &str);

    /// Undefines `name`, erasing any earlier definition of it.
    fn undefine_macro(&mut self, name: &str);

    /// The name tag identifying the parser this configuration belongs to.
    fn name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// Like [`CompileConfig::set_flags`], parsing the standard from a token
    /// such as `c++17`.
    fn set_standard(&mut self, standard: &str, flags: CompileFlags) -> Result<()> {
        let standard = standard.parse()?;
        self.set_flags(standard, flags);
        Ok(())
    }
}

/// Statically known name tag of a configuration type.
pub trait NamedConfig: CompileConfig {
    const NAME: &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_standard_round_trip() {
        for std in CppStandard::ALL {
            assert_eq!(std.to_string().parse::<CppStandard>().unwrap(), std);
        }
    }

    #[test]
    fn test_gnu_flag_value() {
        assert_eq!(CppStandard::Cpp17.flag_value(true), "gnu++17");
        assert_eq!(
            CppStandard::from_flag_value("gnu++14").unwrap(),
            (CppStandard::Cpp14, true)
        );
    }

    #[test]
    fn test_draft_standard_names() {
        assert_eq!(
            CppStandard::from_flag_value("c++0x").unwrap(),
            (CppStandard::Cpp11, false)
        );
        assert_eq!(
            CppStandard::from_flag_value("gnu++0x").unwrap(),
            (CppStandard::Cpp11, true)
        );
        assert_eq!("c++1y".parse::<CppStandard>().unwrap(), CppStandard::Cpp14);
        assert_eq!(
            CppStandard::from_flag_value("gnu++2c").unwrap(),
            (CppStandard::Cpp2c, true)
        );
        assert_eq!("c++26".parse::<CppStandard>().unwrap(), CppStandard::Cpp26);
        assert_eq!(CppStandard::Cpp26.flag_value(true), "gnu++26");
    }

    #[test]
    fn test_unknown_standard() {
        let err = "c++42".parse::<CppStandard>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = "c17".parse::<CppStandard>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_flags_are_independent() {
        let mut flags = CompileFlags::GNU_EXTENSIONS | CompileFlags::MS_COMPATIBILITY;
        assert!(flags.contains(CompileFlags::GNU_EXTENSIONS));
        assert!(!flags.contains(CompileFlags::MS_EXTENSIONS));
        flags.insert(CompileFlags::MS_EXTENSIONS);
        assert!(flags.contains(CompileFlags::MS_EXTENSIONS | CompileFlags::MS_COMPATIBILITY));
        assert!(CompileFlags::empty().is_empty());
    }
}
