pub mod positions;
mod tree_builder;

pub use positions::{LineIndex, Position, Span};
pub use tree_builder::unquote;
use tree_builder::TreeBuilder;

use crate::ast::File;
use crate::error::{Location, ParseError, ParseErrorKind};
use std::collections::HashSet;
use std::sync::Arc;

/// Raw bytes of one Go file plus the name used in diagnostics.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub name: Arc<str>,
    pub bytes: Vec<u8>,
}

impl SourceUnit {
    pub fn new(name: impl Into<Arc<str>>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A parsed file: the syntax tree plus everything needed to report
/// positions inside it.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub name: Arc<str>,
    pub source: Arc<str>,
    pub file: File,
    pub lines: LineIndex,
    /// Identifiers used as package qualifiers (`fmt` in `fmt.Println`).
    pub mentions: HashSet<String>,
}

impl SyntaxTree {
    pub fn package_name(&self) -> &str {
        &self.file.package.name
    }

    pub fn location(&self, span: Span) -> Location {
        locate(&self.name, &self.lines, span)
    }
}

pub(crate) fn locate(name: &Arc<str>, lines: &LineIndex, span: Span) -> Location {
    let position = lines.position(span.start);
    Location {
        file: name.clone(),
        line: position.line + 1,
        column: position.col + 1,
        offset: position.byte,
        len: span.len(),
    }
}

/// Parser trait - converts a source unit to a syntax tree
pub trait Parser {
    fn parse(&self, unit: &SourceUnit) -> Result<SyntaxTree, ParseError>;
}

/// Go parser backed by tree-sitter-go
pub struct GoParser {
    // Configuration only, no state
}

impl GoParser {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for GoParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for GoParser {
    fn parse(&self, unit: &SourceUnit) -> Result<SyntaxTree, ParseError> {
        let source = std::str::from_utf8(&unit.bytes).map_err(|err| {
            let offset = err.valid_up_to();
            // The prefix up to `offset` is valid by construction
            let prefix = String::from_utf8_lossy(&unit.bytes[..offset]);
            let lines = LineIndex::new(&prefix);
            ParseError::new(
                ParseErrorKind::Encoding,
                "invalid UTF-8 encoding",
                locate(&unit.name, &lines, Span::new(offset, offset + 1)),
            )
        })?;
        let lines = LineIndex::new(source);

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|err| {
                ParseError::new(
                    ParseErrorKind::Syntax,
                    format!("failed to load Go grammar: {}", err),
                    locate(&unit.name, &lines, Span::at(0)),
                )
            })?;
        let tree = parser.parse(source, None).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::Syntax,
                "parser produced no tree",
                locate(&unit.name, &lines, Span::at(0)),
            )
        })?;

        let builder = TreeBuilder::new(source, unit.name.clone(), &lines);
        let (file, mentions) = builder.build(tree.root_node())?;
        tracing::debug!(
            file = %unit.name,
            package = %file.package.name,
            decls = file.decls.len(),
            "parsed"
        );

        Ok(SyntaxTree {
            name: unit.name.clone(),
            source: Arc::from(source),
            file,
            lines,
            mentions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decl, ImportName, Stmt, TypeExprKind};

    fn parse(source: &str) -> Result<SyntaxTree, ParseError> {
        GoParser::new().parse(&SourceUnit::new("demo.go", source))
    }

    #[test]
    fn test_package_and_imports() {
        let tree = parse("package demo\n\nimport (\n\t\"fmt\"\n\tstr \"strings\"\n\t_ \"embed\"\n)\n").unwrap();
        assert_eq!(tree.package_name(), "demo");
        let imports = &tree.file.imports;
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].path, "fmt");
        assert!(imports[0].name.is_none());
        assert!(matches!(&imports[1].name, Some(ImportName::Named(id)) if id.name == "str"));
        assert!(matches!(imports[2].name, Some(ImportName::Blank(_))));
    }

    #[test]
    fn test_empty_input() {
        let err = parse("").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingPackage);
        assert_eq!(err.message, "expected 'package', found 'EOF'");
    }

    #[test]
    fn test_missing_package_clause() {
        let err = parse("func main() {}\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingPackage);
        assert_eq!(err.message, "expected 'package', found 'func'");
        assert_eq!(err.location.line, 1);
    }

    #[test]
    fn test_syntax_error_location() {
        let err = parse("package demo\n\nfunc main() {\n\tx := \n}\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Syntax);
        assert!(err.message.starts_with("syntax error"));
        assert_eq!(err.location.file.as_ref(), "demo.go");
    }

    #[test]
    fn test_top_level_statement() {
        let err = parse("package demo\n\nx := 1\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Misplaced);
        assert_eq!(err.message, "non-declaration statement outside function body");
        assert_eq!(err.location.line, 3);
    }

    #[test]
    fn test_late_import() {
        let err = parse("package demo\n\ntype S []int\n\nimport \"fmt\"\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Misplaced);
        assert_eq!(err.message, "imports must appear before other declarations");
    }

    #[test]
    fn test_invalid_utf8() {
        let mut bytes = b"package demo\n// ".to_vec();
        bytes.push(0xff);
        let err = GoParser::new()
            .parse(&SourceUnit::new("bad.go", bytes))
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Encoding);
        assert_eq!(err.location.line, 2);
        assert_eq!(err.location.column, 4);
    }

    #[test]
    fn test_slice_type_decl() {
        let tree = parse("package demo\n\ntype Names []string\n").unwrap();
        let Decl::Type(specs) = &tree.file.decls[0] else {
            panic!("expected type decl");
        };
        assert_eq!(specs[0].name.name, "Names");
        assert!(!specs[0].alias);
        let TypeExprKind::Slice(elem) = &specs[0].ty.kind else {
            panic!("expected slice type");
        };
        assert_eq!(elem.as_name().map(|i| i.name.as_str()), Some("string"));
        assert_eq!(tree.location(specs[0].name.span).to_string(), "demo.go:3:6");
    }

    #[test]
    fn test_qualified_mentions() {
        let source = "package demo\n\nimport (\n\t\"fmt\"\n\t\"time\"\n)\n\ntype Stamps []time.Time\n\nfunc show() { fmt.Println(1) }\n";
        let tree = parse(source).unwrap();
        assert!(tree.mentions.contains("fmt"));
        assert!(tree.mentions.contains("time"));
        assert!(!tree.mentions.contains("Println"));
    }

    #[test]
    fn test_generic_receiver() {
        let source = "package demo\n\ntype List[T any] []T\n\nfunc (l *List[T]) Len() int { return len(l) }\n";
        let tree = parse(source).unwrap();
        let Decl::Func(func) = &tree.file.decls[1] else {
            panic!("expected func decl");
        };
        let recv = func.recv.as_ref().unwrap();
        assert!(recv.pointer);
        assert_eq!(recv.base.name, "List");
        assert_eq!(recv.type_params.len(), 1);
        assert_eq!(recv.type_params[0].name, "T");
        assert_eq!(func.sig.results.len(), 1);
        let body = func.body.as_ref().unwrap();
        assert!(matches!(body.stmts[0], Stmt::Return(ref values) if values.len() == 1));
    }

    #[test]
    fn test_const_group_iota() {
        let source = "package demo\n\nconst (\n\tA = iota\n\tB\n\tC\n)\n";
        let tree = parse(source).unwrap();
        let Decl::Const(specs) = &tree.file.decls[0] else {
            panic!("expected const decl");
        };
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[2].iota, 2);
        assert!(!specs[0].implicit);
        assert!(specs[1].implicit);
    }

    #[test]
    fn test_struct_fields() {
        let source = "package demo\n\ntype Point struct {\n\tX, Y int `json:\"x\"`\n\t*Base\n}\n";
        let tree = parse(source).unwrap();
        let Decl::Type(specs) = &tree.file.decls[0] else {
            panic!("expected type decl");
        };
        let TypeExprKind::Struct(fields) = &specs[0].ty.kind else {
            panic!("expected struct");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].names.len(), 2);
        assert_eq!(fields[0].tag.as_deref(), Some("json:\"x\""));
        assert!(fields[1].names.is_empty());
        assert!(fields[1].embedded_pointer);
    }

    #[test]
    fn test_type_switch_case_with_several_types() {
        let source = "package demo\n\nfunc kind(v any) int {\n\tswitch x := v.(type) {\n\tcase int, string:\n\t\t_ = x\n\t\treturn 1\n\tdefault:\n\t}\n\treturn 0\n}\n";
        let tree = parse(source).unwrap();
        let Decl::Func(func) = &tree.file.decls[0] else {
            panic!("expected func decl");
        };
        let body = func.body.as_ref().unwrap();
        let Stmt::TypeSwitch { binding, clauses, .. } = &body.stmts[0] else {
            panic!("expected type switch");
        };
        assert_eq!(binding.as_ref().map(|b| b.name.as_str()), Some("x"));
        assert_eq!(clauses.len(), 2);
        let names: Vec<_> = clauses[0]
            .types
            .iter()
            .filter_map(|ty| ty.as_name().map(|i| i.name.as_str()))
            .collect();
        assert_eq!(names, ["int", "string"]);
        assert_eq!(clauses[0].body.len(), 2);
        assert!(clauses[1].types.is_empty());
    }
}
