//! End-to-end tests of the generation pipeline with in-memory imports.

use funcup::error::{GenerateError, Phase, ResolveErrorKind, TypeErrorKind};
use funcup::generate::Template;
use funcup::importer::MapImporter;
use funcup::parser::{GoParser, Parser, SourceUnit};
use funcup::{Options, Pipeline};
use std::sync::Arc;

fn pipeline() -> Pipeline {
    let importer = MapImporter::new()
        .with_source("io/fs", "fs.go", "package fs\n\ntype Path string\n")
        .with_source(
            "example.com/geo",
            "geo.go",
            "package geo\n\ntype Point struct{ X, Y float64 }\n\ntype Grid[T any] [][]T\n",
        );
    Pipeline::with_importer(Arc::new(importer))
}

fn generate(source: &str, target: &str) -> Result<String, GenerateError> {
    generate_with(source, target, &Options::default())
}

fn generate_with(source: &str, target: &str, options: &Options) -> Result<String, GenerateError> {
    pipeline()
        .generate(source.as_bytes(), "input.go", "example.com/demo", target, options)
        .map(|bytes| String::from_utf8(bytes).unwrap())
}

fn resolve_kind(err: GenerateError) -> ResolveErrorKind {
    match err {
        GenerateError::Resolve(err) => err.kind,
        other => panic!("expected a resolve error, got {other}"),
    }
}

#[test]
fn test_strings_receiver_and_element() {
    let code = generate("package demo\n\ntype Strings []string\n", "Strings").unwrap();
    assert!(code.contains("\npackage demo\n"));
    assert!(code.contains("func (s Strings) ForEach(cb func(element string, index int, slice Strings) error) {"));
}

#[test]
fn test_pointer_to_local_type() {
    let source = "package demo\n\ntype User struct{ Name string }\n\ntype Users []*User\n";
    let code = generate(source, "Users").unwrap();
    assert!(code.contains("cb func(element *User, index int, slice Users) error"));
    assert!(!code.contains("import"));
}

#[test]
fn test_foreign_element_imports_its_package() {
    let source = "package demo\n\nimport \"io/fs\"\n\ntype Paths []fs.Path\n";
    let code = generate(source, "Paths").unwrap();
    assert!(code.contains("import (\n\t\"io/fs\"\n)\n"));
    assert!(code.contains("element fs.Path"));
}

#[test]
fn test_renamed_import_uses_package_name() {
    let source = "package demo\n\nimport g \"example.com/geo\"\n\ntype Points []g.Point\n";
    let code = generate(source, "Points").unwrap();
    assert!(code.contains("import (\n\t\"example.com/geo\"\n)\n"));
    assert!(code.contains("element geo.Point"));
}

#[test]
fn test_foreign_generic_element() {
    let source = "package demo\n\nimport \"example.com/geo\"\n\ntype Grids []geo.Grid[int]\n";
    let code = generate(source, "Grids").unwrap();
    assert!(code.contains("element geo.Grid[int]"));
}

#[test]
fn test_map_is_not_a_slice() {
    let err = generate("package demo\n\ntype Table map[string]int\n", "Table").unwrap_err();
    assert_eq!(err.phase(), Phase::Resolve);
    assert_eq!(resolve_kind(err), ResolveErrorKind::NotASlice);
}

#[test]
fn test_array_is_not_a_slice() {
    let err = generate("package demo\n\ntype Buf [16]byte\n", "Buf").unwrap_err();
    assert_eq!(resolve_kind(err), ResolveErrorKind::NotASlice);
}

#[test]
fn test_alias_is_not_a_target() {
    let source = "package demo\n\nimport \"example.com/geo\"\n\ntype Points = []geo.Point\n";
    let err = generate(source, "Points").unwrap_err();
    assert_eq!(err.phase(), Phase::Resolve);
    assert_eq!(resolve_kind(err), ResolveErrorKind::Invalid);
}

#[test]
fn test_receiver_does_not_shadow_lowercase_target() {
    let options = Options {
        methods: vec![Template::Map, Template::Filter],
        ..Options::default()
    };
    let code = generate_with("package demo\n\ntype s []int\n", "s", &options).unwrap();
    assert!(code.contains("func (recv s) Map(fn func(element int, index int, slice s) int) s {"));
    assert!(code.contains("\tout := make(s, 0, len(recv))\n"));
    assert!(code.contains("for i, element := range recv {"));
    assert!(!code.contains("(s s)"));
}

#[test]
fn test_empty_target() {
    let err = generate("package demo\n\ntype Strings []string\n", "").unwrap_err();
    assert_eq!(resolve_kind(err), ResolveErrorKind::Invalid);
}

#[test]
fn test_missing_target() {
    let err = generate("package demo\n\ntype Strings []string\n", "Nope").unwrap_err();
    assert_eq!(resolve_kind(err), ResolveErrorKind::NotFound);
    assert_eq!(err_text("package demo\n", "Nope"), "resolve: type Nope not found in package demo");
}

fn err_text(source: &str, target: &str) -> String {
    generate(source, target).unwrap_err().to_string()
}

#[test]
fn test_slice_through_named_layers() {
    let source = "package demo\n\ntype base []int\n\ntype middle base\n\ntype Top middle\n";
    let code = generate(source, "Top").unwrap();
    assert!(code.contains("func (t Top) ForEach(cb func(element int, index int, slice Top) error) {"));
}

#[test]
fn test_check_errors_stop_generation() {
    let err = generate("package demo\n\nimport \"io/fs\"\n\ntype Xs []int\n", "Xs").unwrap_err();
    match err {
        GenerateError::Check(err) => assert_eq!(err.kind, TypeErrorKind::UnusedImport),
        other => panic!("expected a check error, got {other}"),
    }

    let err = generate("package demo\n\nimport \"example.com/absent\"\n\ntype Xs []absent.X\n", "Xs").unwrap_err();
    match err {
        GenerateError::Check(err) => {
            assert_eq!(err.kind, TypeErrorKind::Import);
            assert!(err.cause.is_some());
        }
        other => panic!("expected a check error, got {other}"),
    }
}

#[test]
fn test_parse_error_phase() {
    let err = generate("type Xs []int\n", "Xs").unwrap_err();
    assert_eq!(err.phase(), Phase::Parse);
}

#[test]
fn test_output_is_deterministic() {
    let source = "package demo\n\nimport \"example.com/geo\"\n\ntype Points []*geo.Point\n";
    let options = Options {
        methods: Template::ALL.to_vec(),
        ..Options::default()
    };
    let first = generate_with(source, "Points", &options).unwrap();
    let second = generate_with(source, "Points", &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_output_parses_in_the_same_package() {
    let options = Options {
        methods: Template::ALL.to_vec(),
        accumulator: Some("float64".into()),
        ..Options::default()
    };
    let source = "package demo\n\nimport \"example.com/geo\"\n\ntype Points []geo.Point\n";
    let code = generate_with(source, "Points", &options).unwrap();
    let tree = GoParser::new()
        .parse(&SourceUnit::new("points_funcup.go", code.as_bytes()))
        .unwrap();
    assert_eq!(tree.package_name(), "demo");
}

#[test]
fn test_generated_file_checks_with_its_package() {
    let source = "package demo\n\ntype User struct{ Name string }\n\ntype Users []User\n";
    let options = Options {
        methods: Template::ALL.to_vec(),
        ..Options::default()
    };
    let code = generate_with(source, "Users", &options).unwrap();

    // The input plus its companion file still form a valid package
    let units = [
        SourceUnit::new("input.go", source),
        SourceUnit::new("users_funcup.go", code.as_bytes()),
    ];
    let generated = pipeline()
        .run(&units, "example.com/demo", "Users", &Options::default())
        .unwrap();
    assert_eq!(generated.element, "User");
}

#[test]
fn test_package_of_several_files() {
    let units = [
        SourceUnit::new("a.go", "package demo\n\ntype Items []Item\n"),
        SourceUnit::new("b.go", "package demo\n\ntype Item struct{ ID int }\n"),
    ];
    let code = pipeline()
        .generate_package(&units, "example.com/demo", "Items", &Options::default())
        .unwrap();
    let code = String::from_utf8(code).unwrap();
    assert!(code.contains("for j, element := range i {"));
}
