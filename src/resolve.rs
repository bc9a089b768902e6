//! Target resolution: from a checked package and a type name to the
//! bindings of one generation job.

use crate::error::{ResolveError, ResolveErrorKind};
use crate::types::{is_exported, PackageId, Symbol, SymbolKind, Type, TypedPackage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Import needed by a generated file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Import {
    pub path: String,
    /// Name the generated code uses for the package
    pub name: String,
    /// Emit `name "path"` instead of `"path"`
    pub alias: bool,
}

impl Import {
    /// The import spec line without indentation.
    pub fn spec(&self) -> String {
        if self.alias {
            format!("{} \"{}\"", self.name, self.path)
        } else {
            format!("\"{}\"", self.path)
        }
    }
}

/// A type spelled as code inside the target package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeRef {
    pub text: String,
    /// Sorted by path
    pub imports: Vec<Import>,
}

/// Everything the templates need for one target.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub package: Arc<TypedPackage>,
    pub symbol: Symbol,
    pub element: TypeRef,
    pub target: String,
    pub recv: String,
    pub type_params: Vec<String>,
}

impl GenerationJob {
    /// Receiver type as written in a method declaration: `List[T]`.
    pub fn receiver_type(&self) -> String {
        if self.type_params.is_empty() {
            self.target.clone()
        } else {
            format!("{}{}", self.target, self.type_params_text())
        }
    }

    /// `[T, U]`, or empty for non-generic targets.
    pub fn type_params_text(&self) -> String {
        if self.type_params.is_empty() {
            String::new()
        } else {
            format!("[{}]", self.type_params.join(", "))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetResolver;

impl TargetResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, package: &Arc<TypedPackage>, target: &str) -> Result<GenerationJob, ResolveError> {
        let Some(first) = target.chars().next() else {
            return Err(ResolveError::new(
                ResolveErrorKind::Invalid,
                target,
                "empty target type name",
            ));
        };
        let Some(symbol) = package.lookup(target) else {
            return Err(ResolveError::new(
                ResolveErrorKind::NotFound,
                target,
                format!("type {} not found in package {}", target, package.name),
            ));
        };
        if symbol.kind != SymbolKind::Type {
            return Err(ResolveError::new(
                ResolveErrorKind::NotAType,
                target,
                format!("{} is not a type", target),
            )
            .at(symbol.location.clone()));
        }
        if !is_defined_in(&symbol.ty, package, target) {
            return Err(ResolveError::new(
                ResolveErrorKind::Invalid,
                target,
                format!("{} is an alias, not a defined type", target),
            )
            .at(symbol.location.clone()));
        }
        let Type::Slice(elem) = &symbol.underlying else {
            return Err(ResolveError::new(
                ResolveErrorKind::NotASlice,
                target,
                format!(
                    "{} is not a slice type (underlying type {})",
                    target,
                    describe(&symbol.underlying)
                ),
            )
            .at(symbol.location.clone()));
        };

        let element = type_ref(package, elem).map_err(|message| {
            ResolveError::new(ResolveErrorKind::Invalid, target, message).at(symbol.location.clone())
        })?;
        let recv = receiver_name(first, target, &symbol.type_params);

        Ok(GenerationJob {
            package: package.clone(),
            symbol: symbol.clone(),
            element,
            target: target.to_string(),
            recv,
            type_params: symbol.type_params.clone(),
        })
    }
}

/// A defined type declared at package level under `name`, as opposed to an
/// alias naming some other type.
fn is_defined_in(ty: &Type, package: &TypedPackage, name: &str) -> bool {
    match ty {
        Type::Named(named) => {
            named.local.is_none()
                && named.name == name
                && named.package.as_ref().is_some_and(|id| id.path == package.path)
        }
        _ => false,
    }
}

/// Lowercased first letter of the target, or `recv` when that letter would
/// be `_` or would shadow the target or one of its type parameters.
fn receiver_name(first: char, target: &str, type_params: &[String]) -> String {
    let mut lower = first.to_lowercase();
    let letter = match (lower.next(), lower.next()) {
        (Some(c), None) => c.to_string(),
        _ => first.to_string(),
    };
    let taken = |name: &str| name == "_" || name == target || type_params.iter().any(|p| p == name);
    if !taken(&letter) {
        return letter;
    }
    let mut name = "recv".to_string();
    let mut n = 2;
    while taken(&name) {
        name = format!("recv{}", n);
        n += 1;
    }
    name
}

fn describe(ty: &Type) -> String {
    match ty {
        Type::Invalid => "unknown".to_string(),
        other => other.to_string(),
    }
}

/// Spell `ty` as seen from `package`, collecting the imports it needs.
/// Fails on types that cannot be named from `package`.
pub fn type_ref(package: &TypedPackage, ty: &Type) -> Result<TypeRef, String> {
    let mut problem = None;
    ty.walk(&mut |inner| {
        if problem.is_some() {
            return;
        }
        match inner {
            Type::Invalid => problem = Some("element type could not be determined".to_string()),
            Type::Named(named) if named.local.is_some() => {
                problem = Some(format!("element type {} is local to a function", named.name))
            }
            Type::Named(named) => {
                let foreign = named
                    .package
                    .as_ref()
                    .is_some_and(|id| id.path != package.path);
                if foreign && !is_exported(&named.name) {
                    let qualifier = named.package.as_ref().map(|id| id.name.as_str()).unwrap_or("");
                    problem = Some(format!(
                        "element type refers to unexported type {}.{}",
                        qualifier, named.name
                    ));
                }
            }
            _ => {}
        }
    });
    if let Some(problem) = problem {
        return Err(problem);
    }

    let mut names = ImportNames::new(package);
    let mut text = String::new();
    ty.write(&mut text, &mut |id| names.qualify(id));
    Ok(TypeRef {
        text,
        imports: names.finish(),
    })
}

/// Local names of the packages a type mentions.
struct ImportNames<'p> {
    package: &'p TypedPackage,
    by_path: BTreeMap<String, Import>,
}

impl<'p> ImportNames<'p> {
    fn new(package: &'p TypedPackage) -> Self {
        Self {
            package,
            by_path: BTreeMap::new(),
        }
    }

    fn taken(&self, name: &str) -> bool {
        self.package.scope.contains(name) || self.by_path.values().any(|import| import.name == name)
    }

    fn qualify(&mut self, id: &PackageId) -> Option<String> {
        if id.path == self.package.path {
            return None;
        }
        if let Some(import) = self.by_path.get(&id.path) {
            return Some(import.name.clone());
        }
        let mut name = id.name.clone();
        let mut suffix = 2;
        while self.taken(&name) {
            name = format!("{}{}", id.name, suffix);
            suffix += 1;
        }
        let last = id.path.rsplit('/').next().unwrap_or(&id.path);
        let import = Import {
            path: id.path.clone(),
            alias: name != last,
            name: name.clone(),
        };
        self.by_path.insert(id.path.clone(), import);
        Some(name)
    }

    fn finish(self) -> Vec<Import> {
        self.by_path.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::TypeChecker;
    use crate::importer::MapImporter;
    use crate::parser::{GoParser, Parser, SourceUnit};

    fn importer() -> MapImporter {
        MapImporter::new()
            .with_source("io/fs", "fs.go", "package fs\n\ntype Path string\n\ntype entry struct{}\n")
            .with_source("example.com/other/fs", "fs.go", "package fs\n\ntype Mode uint32\n")
            .with_source("gopkg.in/yaml.v3", "yaml.go", "package yaml\n\ntype Node struct{ Value string }\n")
            .with_source("example.com/list", "list.go", "package list\n\ntype Names []string\n")
            .with_source("example.com/hidden", "h.go", "package hidden\n\ntype secret int\n\ntype Alias = secret\n")
    }

    fn package(source: &str) -> Arc<TypedPackage> {
        let tree = GoParser::new()
            .parse(&SourceUnit::new("demo.go", source))
            .unwrap();
        let importer = importer();
        Arc::new(TypeChecker::new("example.com/demo", &importer).check(&[tree]).unwrap())
    }

    fn resolve(source: &str, target: &str) -> Result<GenerationJob, ResolveError> {
        TargetResolver::new().resolve(&package(source), target)
    }

    #[test]
    fn test_basic_element() {
        let job = resolve("package demo\n\ntype Strings []string\n", "Strings").unwrap();
        assert_eq!(job.element.text, "string");
        assert!(job.element.imports.is_empty());
        assert_eq!(job.recv, "s");
        assert_eq!(job.receiver_type(), "Strings");
    }

    #[test]
    fn test_local_pointer_element() {
        let job = resolve(
            "package demo\n\ntype User struct{ Name string }\n\ntype Users []*User\n",
            "Users",
        )
        .unwrap();
        assert_eq!(job.element.text, "*User");
    }

    #[test]
    fn test_foreign_element_records_import() {
        let job = resolve("package demo\n\nimport \"io/fs\"\n\ntype Paths []fs.Path\n", "Paths").unwrap();
        assert_eq!(job.element.text, "fs.Path");
        assert_eq!(
            job.element.imports,
            vec![Import {
                path: "io/fs".into(),
                name: "fs".into(),
                alias: false
            }]
        );
    }

    #[test]
    fn test_colliding_package_names() {
        let source = "package demo\n\nimport (\n\t\"io/fs\"\n\tofs \"example.com/other/fs\"\n)\n\ntype Pairs []map[fs.Path]ofs.Mode\n";
        let job = resolve(source, "Pairs").unwrap();
        assert_eq!(job.element.text, "map[fs.Path]fs2.Mode");
        let names: Vec<(&str, bool)> = job
            .element
            .imports
            .iter()
            .map(|import| (import.name.as_str(), import.alias))
            .collect();
        assert_eq!(names, vec![("fs2", true), ("fs", false)]);
    }

    #[test]
    fn test_import_name_colliding_with_local_declaration() {
        let source = "package demo\n\nimport y \"gopkg.in/yaml.v3\"\n\nvar yaml = 1\n\ntype Nodes []*y.Node\n";
        let job = resolve(source, "Nodes").unwrap();
        assert_eq!(job.element.text, "*yaml2.Node");
        assert!(job.element.imports[0].alias);
        assert_eq!(job.element.imports[0].spec(), "yaml2 \"gopkg.in/yaml.v3\"");
    }

    #[test]
    fn test_version_suffixed_path_gets_alias() {
        let job = resolve("package demo\n\nimport \"gopkg.in/yaml.v3\"\n\ntype Nodes []yaml.Node\n", "Nodes").unwrap();
        assert_eq!(job.element.imports[0].spec(), "yaml \"gopkg.in/yaml.v3\"");
    }

    #[test]
    fn test_composite_elements() {
        let job = resolve("package demo\n\ntype Handlers []func(int) (string, error)\n", "Handlers").unwrap();
        assert_eq!(job.element.text, "func(int) (string, error)");
        let job = resolve("package demo\n\ntype Bytes [][]byte\n", "Bytes").unwrap();
        assert_eq!(job.element.text, "[]byte");
        let job = resolve("package demo\n\ntype Things []any\n", "Things").unwrap();
        assert_eq!(job.element.text, "any");
        let job = resolve("package demo\n\ntype Queue []chan<- int\n", "Queue").unwrap();
        assert_eq!(job.element.text, "chan<- int");
    }

    #[test]
    fn test_generic_target() {
        let job = resolve("package demo\n\ntype List[T any] []T\n", "List").unwrap();
        assert_eq!(job.element.text, "T");
        assert_eq!(job.type_params_text(), "[T]");
        assert_eq!(job.receiver_type(), "List[T]");
        assert_eq!(job.recv, "l");
    }

    #[test]
    fn test_not_a_slice() {
        let err = resolve("package demo\n\ntype Table map[string]int\n", "Table").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::NotASlice);
        let err = resolve("package demo\n\ntype Buf [16]byte\n", "Buf").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::NotASlice);
        let err = resolve("package demo\n\ntype P *[]int\n", "P").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::NotASlice);
    }

    #[test]
    fn test_lookup_failures() {
        let err = resolve("package demo\n\ntype Strings []string\n", "").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::Invalid);
        let err = resolve("package demo\n\ntype Strings []string\n", "Missing").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::NotFound);
        let err = resolve("package demo\n\nvar Strings = []string{}\n", "Strings").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::NotAType);
    }

    #[test]
    fn test_unexported_foreign_element() {
        let source = "package demo\n\nimport \"example.com/hidden\"\n\ntype Secrets []hidden.Alias\n";
        let err = resolve(source, "Secrets").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::Invalid);
    }

    #[test]
    fn test_aliases_are_not_targets() {
        let err = resolve("package demo\n\ntype Strings = []string\n", "Strings").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::Invalid);
        assert_eq!(err.message, "Strings is an alias, not a defined type");
        assert!(err.location.is_some());

        let source = "package demo\n\nimport \"io/fs\"\n\ntype Paths []fs.Path\n\ntype Same = Paths\n";
        let err = resolve(source, "Same").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::Invalid);

        let source = "package demo\n\nimport \"example.com/list\"\n\ntype Names = list.Names\n";
        let err = resolve(source, "Names").unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::Invalid);
    }

    #[test]
    fn test_receiver_avoids_unusable_names() {
        let job = resolve("package demo\n\ntype _xs []int\n", "_xs").unwrap();
        assert_eq!(job.recv, "recv");
        let job = resolve("package demo\n\ntype s []int\n", "s").unwrap();
        assert_eq!(job.recv, "recv");
        let job = resolve("package demo\n\ntype Box[b any] []b\n", "Box").unwrap();
        assert_eq!(job.recv, "recv");
        assert_eq!(receiver_name('R', "recv", &["r".into(), "recv".into()]), "recv2");
    }

    #[test]
    fn test_receiver_letter_is_a_single_char() {
        // 'İ' lowercases to two chars
        assert_eq!(receiver_name('İ', "İtems", &[]), "İ");
        assert_eq!(receiver_name('Ä', "Äpfel", &[]), "ä");
        assert_eq!(receiver_name('U', "Users", &[]), "u");
    }
}
