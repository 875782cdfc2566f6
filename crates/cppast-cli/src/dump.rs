//! Plain-text rendering of parsed files.

use cppast_common::{CppFile, IncludeKind, NodeId};
use std::io::{self, Write};

pub fn write_file(out: &mut impl Write, file: &CppFile) -> io::Result<()> {
    write!(out, "{}", file.name())?;
    if file.had_errors() {
        write!(out, " (with errors)")?;
    }
    writeln!(out)?;

    for include in file.includes() {
        let (open, close) = match include.kind {
            IncludeKind::System => ('<', '>'),
            IncludeKind::Local => ('"', '"'),
        };
        write!(out, "  #include {open}{}{close}", include.name)?;
        if let Some(path) = &include.full_path {
            write!(out, " -> {path}")?;
        }
        writeln!(out)?;
    }
    for definition in file.macros() {
        write!(out, "  #define {}", definition.name)?;
        if let Some(params) = &definition.parameters {
            write!(out, "({})", params.join(", "))?;
        }
        if !definition.replacement.is_empty() {
            write!(out, " {}", definition.replacement)?;
        }
        writeln!(out)?;
    }

    for &root in file.roots() {
        write_entity(out, file, root, 1)?;
    }
    Ok(())
}

fn write_entity(out: &mut impl Write, file: &CppFile, id: NodeId, depth: usize) -> io::Result<()> {
    let entity = file.entity(id);
    write!(out, "{:indent$}{:?}", "", entity.kind, indent = depth * 2)?;
    if !entity.name.is_empty() {
        write!(out, " {}", entity.name)?;
    }
    writeln!(out, " [{}:{}]", entity.location.line, entity.location.column)?;

    for &child in entity.children() {
        write_entity(out, file, child, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cppast_common::{CppEntity, CppEntityKind, IncludeDirective, MacroDefinition, SourceLocation};

    fn at(line: u32, column: u32) -> SourceLocation {
        SourceLocation {
            file: Some("a.cpp".to_string()),
            line,
            column,
        }
    }

    #[test]
    fn test_write_file() {
        let mut file = CppFile::new("a.cpp");
        file.add_include(IncludeDirective {
            name: "vector".to_string(),
            kind: IncludeKind::System,
            full_path: Some("/usr/include/c++/vector".to_string()),
            line: 1,
        });
        file.add_macro(MacroDefinition {
            name: "MAX".to_string(),
            parameters: Some(vec!["a".to_string(), "b".to_string()]),
            replacement: "((a) > (b) ? (a) : (b))".to_string(),
            line: 2,
        });
        let ns = file.add_entity(CppEntity::new(CppEntityKind::Namespace, "geo", at(4, 11)), None);
        let point = file.add_entity(CppEntity::new(CppEntityKind::Struct, "Point", at(5, 8)), Some(ns));
        file.add_entity(
            CppEntity::new(CppEntityKind::MemberVariable, "x", at(6, 9)),
            Some(point),
        );
        file.add_entity(CppEntity::new(CppEntityKind::AccessSpecifier, "", at(7, 1)), Some(point));

        let mut out = Vec::new();
        write_file(&mut out, &file).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "a.cpp\n\
             \x20 #include <vector> -> /usr/include/c++/vector\n\
             \x20 #define MAX(a, b) ((a) > (b) ? (a) : (b))\n\
             \x20 Namespace geo [4:11]\n\
             \x20   Struct Point [5:8]\n\
             \x20     MemberVariable x [6:9]\n\
             \x20     AccessSpecifier [7:1]\n"
        );
    }

    #[test]
    fn test_write_file_marks_errors() {
        let mut file = CppFile::new("broken.cpp");
        file.set_had_errors(true);

        let mut out = Vec::new();
        write_file(&mut out, &file).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "broken.cpp (with errors)\n");
    }
}
