mod output;
mod templates;

pub use output::Output;

use crate::error::RenderError;
use crate::resolve::{GenerationJob, Import};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Header of every generated file, following Go's generated-code convention.
pub const HEADER: &str = "// Code generated by funcup. DO NOT EDIT.";

/// A method template. Sections are emitted in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Template {
    ForEach,
    Map,
    Filter,
    Reduce,
}

impl Template {
    pub const ALL: [Template; 4] = [Template::ForEach, Template::Map, Template::Filter, Template::Reduce];

    /// Method name in the generated code
    pub fn method(&self) -> &'static str {
        match self {
            Template::ForEach => "ForEach",
            Template::Map => "Map",
            Template::Filter => "Filter",
            Template::Reduce => "Reduce",
        }
    }

    /// Parse a comma-separated list such as `foreach,map`.
    pub fn parse_list(list: &str) -> Result<Vec<Template>, String> {
        let mut templates = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Template>, String>>()?;
        templates.sort();
        templates.dedup();
        Ok(templates)
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "foreach" => Ok(Template::ForEach),
            "map" => Ok(Template::Map),
            "filter" => Ok(Template::Filter),
            "reduce" => Ok(Template::Reduce),
            _ => Err(format!(
                "unknown method template {:?} (expected foreach, map, filter or reduce)",
                s
            )),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// Generator options
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub templates: Vec<Template>,
    /// Reduce accumulator type; the element type when unset
    pub accumulator: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            templates: vec![Template::ForEach],
            accumulator: None,
        }
    }
}

/// Generator trait - turns a generation job into the bytes of a Go file
pub trait Generator {
    fn generate(&self, job: &GenerationJob, options: &GenerateOptions) -> Result<Vec<u8>, RenderError>;
}

/// Values substituted into the templates.
#[derive(Debug, Clone)]
pub struct Bindings {
    pub package: String,
    pub recv: String,
    /// Receiver type, with type parameters for generic targets
    pub ty: String,
    pub type_params: String,
    pub slice_of: String,
    pub accumulator: String,
    pub imports: Vec<Import>,
    /// Loop index name, never equal to the receiver
    pub index: &'static str,
}

impl Bindings {
    pub fn new(job: &GenerationJob, options: &GenerateOptions) -> Result<Self, RenderError> {
        if options.templates.is_empty() {
            return Err(RenderError::NoTemplates);
        }
        identifier("Package", &job.package.name)?;
        identifier("Type", &job.target)?;
        if job.recv.is_empty() {
            return Err(RenderError::EmptyBinding { binding: "Recv" });
        }
        if job.element.text.trim().is_empty() {
            return Err(RenderError::EmptyBinding { binding: "SliceOf" });
        }
        let accumulator = match &options.accumulator {
            Some(ty) if ty.trim().is_empty() => {
                return Err(RenderError::EmptyBinding {
                    binding: "Accumulator",
                });
            }
            Some(ty) => ty.trim().to_string(),
            None => job.element.text.clone(),
        };

        Ok(Self {
            package: job.package.name.clone(),
            recv: job.recv.clone(),
            ty: job.receiver_type(),
            type_params: job.type_params_text(),
            slice_of: job.element.text.clone(),
            accumulator,
            imports: job.element.imports.clone(),
            index: if job.recv == "i" { "j" } else { "i" },
        })
    }
}

fn identifier(binding: &'static str, value: &str) -> Result<(), RenderError> {
    if value.is_empty() {
        return Err(RenderError::EmptyBinding { binding });
    }
    if !is_identifier(value) {
        return Err(RenderError::InvalidIdentifier {
            binding,
            value: value.to_string(),
        });
    }
    Ok(())
}

const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// A Go identifier that is not a keyword.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
        && !KEYWORDS.contains(&s)
}

/// Renders the companion file for a job.
#[derive(Debug, Clone, Default)]
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, job: &GenerationJob, options: &GenerateOptions) -> Result<Vec<u8>, RenderError> {
        let bindings = Bindings::new(job, options)?;
        let mut templates = options.templates.clone();
        templates.sort();
        templates.dedup();

        let mut output = Output::new();
        output.line(0, HEADER);
        output.blank();
        output.line(0, &format!("package {}", bindings.package));
        if !bindings.imports.is_empty() {
            output.blank();
            output.line(0, "import (");
            for import in &bindings.imports {
                output.line(1, &import.spec());
            }
            output.line(0, ")");
        }
        for template in templates {
            output.blank();
            templates::emit(template, &bindings, &mut output);
        }
        Ok(output.finish().into_bytes())
    }
}

impl Generator for Renderer {
    fn generate(&self, job: &GenerationJob, options: &GenerateOptions) -> Result<Vec<u8>, RenderError> {
        self.render(job, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::TypeRef;
    use crate::types::{Symbol, SymbolKind, Type, TypedPackage};
    use std::sync::Arc;

    fn job(package: &str, target: &str, element: &str, imports: Vec<Import>) -> GenerationJob {
        GenerationJob {
            package: Arc::new(TypedPackage::opaque("example.com/demo", package)),
            symbol: Symbol::new(target, SymbolKind::Type, Type::Invalid, Type::Invalid),
            element: TypeRef {
                text: element.to_string(),
                imports,
            },
            target: target.to_string(),
            recv: target.chars().next().map(|c| c.to_lowercase().collect()).unwrap_or_default(),
            type_params: Vec::new(),
        }
    }

    fn render(job: &GenerationJob, templates: Vec<Template>) -> Result<String, RenderError> {
        let options = GenerateOptions {
            templates,
            accumulator: None,
        };
        Renderer::new()
            .render(job, &options)
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_foreach_layout() {
        let code = render(&job("demo", "Strings", "string", Vec::new()), vec![Template::ForEach]).unwrap();
        assert_eq!(
            code,
            "// Code generated by funcup. DO NOT EDIT.\n\
             \n\
             package demo\n\
             \n\
             func (s Strings) ForEach(cb func(element string, index int, slice Strings) error) {\n\
             \tfor i, element := range s {\n\
             \t\tif err := cb(element, i, s); err != nil {\n\
             \t\t\treturn\n\
             \t\t}\n\
             \t}\n\
             }\n"
        );
    }

    #[test]
    fn test_import_block() {
        let imports = vec![
            Import {
                path: "io/fs".into(),
                name: "fs".into(),
                alias: false,
            },
            Import {
                path: "example.com/other/fs".into(),
                name: "fs2".into(),
                alias: true,
            },
        ];
        let code = render(&job("demo", "Modes", "map[fs.Path]fs2.Mode", imports), vec![Template::ForEach]).unwrap();
        assert!(code.contains("package demo\n\nimport (\n\t\"io/fs\"\n\tfs2 \"example.com/other/fs\"\n)\n\nfunc"));
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let code = render(
            &job("demo", "Ints", "int", Vec::new()),
            vec![Template::Reduce, Template::ForEach, Template::Filter, Template::Map, Template::Map],
        )
        .unwrap();
        let positions: Vec<usize> = ["ForEach(", "Map(", "Filter(", "Reduce("]
            .iter()
            .map(|name| code.find(name).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(code.matches(") Map(").count(), 1);
        assert_eq!(code.matches("package ").count(), 1);
        assert!(!code.contains("\n\n\n"));
    }

    #[test]
    fn test_index_avoids_receiver() {
        let code = render(&job("demo", "Items", "int", Vec::new()), vec![Template::ForEach]).unwrap();
        assert!(code.contains("for j, element := range i {"));
        assert!(code.contains("cb(element, j, i)"));
    }

    #[test]
    fn test_reduce_accumulator() {
        let options = GenerateOptions {
            templates: vec![Template::Reduce],
            accumulator: Some("float64".into()),
        };
        let bytes = Renderer::new().render(&job("demo", "Ints", "int", Vec::new()), &options).unwrap();
        let code = String::from_utf8(bytes).unwrap();
        assert!(code.contains(
            "func (i Ints) Reduce(fn func(acc float64, element int, index int, slice Ints) float64, initial float64) float64 {"
        ));

        let default = render(&job("demo", "Ints", "int", Vec::new()), vec![Template::Reduce]).unwrap();
        assert!(default.contains("fn func(acc int, element int, index int, slice Ints) int, initial int) int {"));
    }

    #[test]
    fn test_generic_receiver() {
        let mut job = job("demo", "List", "T", Vec::new());
        job.type_params = vec!["T".into()];
        let code = render(&job, vec![Template::Map]).unwrap();
        assert!(code.contains("func (l List[T]) Map(fn func(element T, index int, slice List[T]) T) List[T] {"));
        assert!(code.contains("out := make(List[T], 0, len(l))"));
    }

    #[test]
    fn test_binding_errors() {
        assert_eq!(
            render(&job("demo", "Ints", "int", Vec::new()), Vec::new()).unwrap_err(),
            RenderError::NoTemplates
        );
        assert_eq!(
            render(&job("", "Ints", "int", Vec::new()), vec![Template::ForEach]).unwrap_err(),
            RenderError::EmptyBinding { binding: "Package" }
        );
        assert_eq!(
            render(&job("my-pkg", "Ints", "int", Vec::new()), vec![Template::ForEach]).unwrap_err(),
            RenderError::InvalidIdentifier {
                binding: "Package",
                value: "my-pkg".into()
            }
        );
        assert_eq!(
            render(&job("demo", "", "int", Vec::new()), vec![Template::ForEach]).unwrap_err(),
            RenderError::EmptyBinding { binding: "Type" }
        );
        assert_eq!(
            render(&job("demo", "Ints", " ", Vec::new()), vec![Template::ForEach]).unwrap_err(),
            RenderError::EmptyBinding { binding: "SliceOf" }
        );

        let options = GenerateOptions {
            templates: vec![Template::Reduce],
            accumulator: Some(String::new()),
        };
        assert_eq!(
            Renderer::new()
                .render(&job("demo", "Ints", "int", Vec::new()), &options)
                .unwrap_err(),
            RenderError::EmptyBinding { binding: "Accumulator" }
        );
    }

    #[test]
    fn test_parse_template_list() {
        assert_eq!(
            Template::parse_list("reduce, Map,foreach,map").unwrap(),
            vec![Template::ForEach, Template::Map, Template::Reduce]
        );
        assert!(Template::parse_list("foreach,zip").unwrap_err().contains("\"zip\""));
        assert!(Template::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("demo"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("type"));
        assert!(!is_identifier("a.b"));
    }
}
