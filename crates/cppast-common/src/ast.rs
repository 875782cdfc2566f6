//! The AST a parser hands back for one file.
//!
//! Entities live in an arena owned by [`CppFile`], in source order.
//! Parent and child links are [`NodeId`]s into that arena.

use smol_str::SmolStr;
use std::fmt;

/// Source location for diagnostics and entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.file.as_deref().unwrap_or("<unknown>");
        write!(f, "{}:{}:{}", file, self.line, self.column)
    }
}

/// Stable cross-file identifier of an entity (the front-end's USR).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(SmolStr);

impl EntityId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of an entity inside its [`CppFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kinds of C++ entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CppEntityKind {
    Namespace,
    NamespaceAlias,
    UsingDirective,
    UsingDeclaration,
    LanguageLinkage,
    TypeAlias,
    Typedef,
    Enum,
    EnumValue,
    Class,
    Struct,
    Union,
    BaseClass,
    AccessSpecifier,
    Friend,
    MemberVariable,
    Variable,
    Function,
    MemberFunction,
    ConversionOperator,
    Constructor,
    Destructor,
    FunctionParameter,
    TemplateTypeParameter,
    NonTypeTemplateParameter,
    TemplateTemplateParameter,
    FunctionTemplate,
    ClassTemplate,
    ClassTemplatePartialSpecialization,
    AliasTemplate,
    StaticAssert,
    Unexposed,
}

impl CppEntityKind {
    /// Whether entities of this kind can contain other entities.
    pub fn is_scope(self) -> bool {
        matches!(
            self,
            CppEntityKind::Namespace
                | CppEntityKind::LanguageLinkage
                | CppEntityKind::Enum
                | CppEntityKind::Class
                | CppEntityKind::Struct
                | CppEntityKind::Union
                | CppEntityKind::Function
                | CppEntityKind::MemberFunction
                | CppEntityKind::ConversionOperator
                | CppEntityKind::Constructor
                | CppEntityKind::Destructor
                | CppEntityKind::FunctionTemplate
                | CppEntityKind::ClassTemplate
                | CppEntityKind::ClassTemplatePartialSpecialization
                | CppEntityKind::AliasTemplate
        )
    }
}

/// A single entity of a parsed file.
#[derive(Debug, Clone)]
pub struct CppEntity {
    pub kind: CppEntityKind,
    pub name: SmolStr,
    /// `None` for entities the front-end gives no stable identity.
    pub id: Option<EntityId>,
    pub location: SourceLocation,
    /// Raw documentation comment attached to the entity.
    pub comment: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl CppEntity {
    pub fn new(kind: CppEntityKind, name: impl Into<SmolStr>, location: SourceLocation) -> Self {
        Self {
            kind,
            name: name.into(),
            id: None,
            location,
            comment: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `#include <...>`
    System,
    /// `#include "..."`
    Local,
}

/// An `#include` directive of the parsed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// The name as written between the delimiters.
    pub name: String,
    pub kind: IncludeKind,
    /// Resolved path, unavailable with fast preprocessing.
    pub full_path: Option<String>,
    pub line: u32,
}

/// A `#define` of the parsed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    pub name: String,
    /// `Some` for function-like macros.
    pub parameters: Option<Vec<String>>,
    pub replacement: String,
    pub line: u32,
}

/// The root of one parsed file.
#[derive(Debug, Clone)]
pub struct CppFile {
    name: String,
    entities: Vec<CppEntity>,
    roots: Vec<NodeId>,
    includes: Vec<IncludeDirective>,
    macros: Vec<MacroDefinition>,
    had_errors: bool,
    full_include_paths: bool,
}

impl CppFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
            roots: Vec::new(),
            includes: Vec::new(),
            macros: Vec::new(),
            had_errors: false,
            full_include_paths: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends an entity below `parent` (or at file scope) and returns its id.
    pub fn add_entity(&mut self, mut entity: CppEntity, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.entities.len() as u32);
        entity.parent = parent;
        entity.children.clear();
        match parent {
            Some(p) => self.entities[p.index()].children.push(id),
            None => self.roots.push(id),
        }
        self.entities.push(entity);
        id
    }

    pub fn entity(&self, id: NodeId) -> &CppEntity {
        &self.entities[id.index()]
    }

    /// All entities in source order.
    pub fn entities(&self) -> impl Iterator<Item = (NodeId, &CppEntity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (NodeId(i as u32), e))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// File-scope entities.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn parent(&self, id: NodeId) -> Option<&CppEntity> {
        self.entity(id).parent.map(|p| self.entity(p))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &CppEntity> {
        self.entity(id).children.iter().map(|&c| self.entity(c))
    }

    /// Fully qualified name, scopes joined with `::`.
    pub fn qualified_name(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let entity = self.entity(node);
            if !entity.name.is_empty() {
                parts.push(entity.name.as_str());
            }
            current = entity.parent;
        }
        parts.reverse();
        parts.join("::")
    }

    pub fn find(&self, kind: CppEntityKind, name: &str) -> Option<NodeId> {
        self.entities()
            .find(|(_, e)| e.kind == kind && e.name == name)
            .map(|(id, _)| id)
    }

    pub fn includes(&self) -> &[IncludeDirective] {
        &self.includes
    }

    pub fn add_include(&mut self, include: IncludeDirective) {
        self.includes.push(include);
    }

    pub fn macros(&self) -> &[MacroDefinition] {
        &self.macros
    }

    pub fn add_macro(&mut self, definition: MacroDefinition) {
        self.macros.push(definition);
    }

    /// Whether the front-end reported non-fatal errors for this file.
    pub fn had_errors(&self) -> bool {
        self.had_errors
    }

    pub fn set_had_errors(&mut self, had_errors: bool) {
        self.had_errors = had_errors;
    }

    /// Whether include directives carry their resolved path.
    pub fn has_full_include_paths(&self) -> bool {
        self.full_include_paths
    }

    pub fn set_full_include_paths(&mut self, available: bool) {
        self.full_include_paths = available;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation {
            file: Some("a.cpp".to_string()),
            line,
            column: 1,
        }
    }

    #[test]
    fn test_parent_links() {
        let mut file = CppFile::new("a.cpp");
        let ns = file.add_entity(CppEntity::new(CppEntityKind::Namespace, "ns", loc(1)), None);
        let class = file.add_entity(CppEntity::new(CppEntityKind::Class, "Foo", loc(2)), Some(ns));
        let method = file.add_entity(
            CppEntity::new(CppEntityKind::MemberFunction, "bar", loc(3)),
            Some(class),
        );

        assert_eq!(file.roots(), &[ns]);
        assert_eq!(file.parent(method).map(|e| e.name.as_str()), Some("Foo"));
        assert_eq!(file.children(ns).count(), 1);
        assert_eq!(file.qualified_name(method), "ns::Foo::bar");
        assert_eq!(file.find(CppEntityKind::Class, "Foo"), Some(class));
    }

    #[test]
    fn test_anonymous_scope_skipped_in_qualified_name() {
        let mut file = CppFile::new("a.cpp");
        let anon = file.add_entity(CppEntity::new(CppEntityKind::Namespace, "", loc(1)), None);
        let var = file.add_entity(CppEntity::new(CppEntityKind::Variable, "x", loc(2)), Some(anon));
        assert_eq!(file.qualified_name(var), "x");
    }

    #[test]
    fn test_location_display() {
        assert_eq!(loc(4).to_string(), "a.cpp:4:1");
        assert_eq!(SourceLocation::default().to_string(), "<unknown>:0:0");
    }
}
