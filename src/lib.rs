pub mod ast;
pub mod check;
pub mod error;
pub mod generate;
pub mod importer;
pub mod parser;
pub mod resolve;
pub mod types;

use check::TypeChecker;
use error::GenerateError;
use generate::{GenerateOptions, Generator, Renderer, Template};
use importer::{ImportResolver, SourceImporter};
use parser::{GoParser, Parser, SourceUnit};
use resolve::{GenerationJob, Import, TargetResolver};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use types::TypedPackage;

/// Configuration for one generation run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Emit the package summary and the resolved target as `info` events
    pub verbose: bool,
    /// Templates to render (default: ForEach)
    pub methods: Vec<Template>,
    /// Reduce accumulator type (default: the element type)
    pub accumulator: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: false,
            methods: vec![Template::ForEach],
            accumulator: None,
        }
    }
}

impl Options {
    fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            templates: self.methods.clone(),
            accumulator: self.accumulator.clone(),
        }
    }
}

/// Result of a run, serializable for `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub package: String,
    pub package_path: String,
    pub target: String,
    pub element: String,
    pub imports: Vec<Import>,
    pub methods: Vec<Template>,
    pub code: String,
}

/// Parse, check, resolve and render, in that order.
pub struct Pipeline {
    parser: GoParser,
    importer: Arc<dyn ImportResolver>,
}

impl Pipeline {
    /// Pipeline resolving imports from the Go installation and the module
    /// enclosing the current directory.
    pub fn standard() -> Self {
        Self::with_importer(Arc::new(SourceImporter::new()))
    }

    /// Pipeline resolving imports relative to the package in `dir`.
    pub fn for_dir(dir: &Path) -> Self {
        Self::with_importer(Arc::new(SourceImporter::for_dir(dir)))
    }

    pub fn with_importer(importer: Arc<dyn ImportResolver>) -> Self {
        Self {
            parser: GoParser::new(),
            importer,
        }
    }

    /// Generate the companion file for `target` declared in a single file.
    pub fn generate(
        &self,
        source: &[u8],
        name: &str,
        package_path: &str,
        target: &str,
        options: &Options,
    ) -> Result<Vec<u8>, GenerateError> {
        let units = [SourceUnit::new(name, source)];
        self.generate_package(&units, package_path, target, options)
    }

    /// Generate the companion file for `target` declared in a package made
    /// of `units`.
    pub fn generate_package(
        &self,
        units: &[SourceUnit],
        package_path: &str,
        target: &str,
        options: &Options,
    ) -> Result<Vec<u8>, GenerateError> {
        self.run(units, package_path, target, options)
            .map(|generated| generated.code.into_bytes())
    }

    /// Like [`Pipeline::generate_package`], keeping the resolved details.
    pub fn run(
        &self,
        units: &[SourceUnit],
        package_path: &str,
        target: &str,
        options: &Options,
    ) -> Result<Generated, GenerateError> {
        let trees = units
            .iter()
            .map(|unit| self.parser.parse(unit))
            .collect::<Result<Vec<_>, _>>()?;

        let package = Arc::new(TypeChecker::new(package_path, self.importer.as_ref()).check(&trees)?);
        if options.verbose {
            log_package(&package);
        }

        let job = TargetResolver::new().resolve(&package, target)?;
        if options.verbose {
            log_job(&job);
        }

        let code = Renderer::new().generate(&job, &options.generate_options())?;
        // Templates only ever write UTF-8
        let code = String::from_utf8_lossy(&code).into_owned();

        let mut methods = options.methods.clone();
        methods.sort();
        methods.dedup();
        Ok(Generated {
            package: package.name.clone(),
            package_path: package.path.clone(),
            target: job.target.clone(),
            element: job.element.text.clone(),
            imports: job.element.imports.clone(),
            methods,
            code,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// Generate with default options and the default import resolver.
pub fn generate(source: &[u8], name: &str, package_path: &str, target: &str) -> Result<Vec<u8>, GenerateError> {
    Pipeline::standard().generate(source, name, package_path, target, &Options::default())
}

fn log_package(package: &TypedPackage) {
    let imports: Vec<&str> = package.imports.iter().map(|import| import.path.as_str()).collect();
    let scope: Vec<&str> = package.scope.iter().map(|symbol| symbol.name.as_str()).collect();
    tracing::info!(
        path = %package.path,
        name = %package.name,
        imports = ?imports,
        scope = ?scope,
        "checked package"
    );
}

fn log_job(job: &GenerationJob) {
    tracing::info!(
        target_type = %job.target,
        underlying = %job.symbol.underlying,
        element = %job.element.text,
        imports = job.element.imports.len(),
        "resolved target"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Phase;
    use crate::importer::MapImporter;

    fn pipeline() -> Pipeline {
        Pipeline::with_importer(Arc::new(
            MapImporter::new().with_source("time", "time.go", "package time\n\ntype Duration int64\n"),
        ))
    }

    fn generate(source: &str, target: &str, options: &Options) -> Result<String, GenerateError> {
        pipeline()
            .generate(source.as_bytes(), "demo.go", "example.com/demo", target, options)
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_simple() {
        let code = generate("package demo\n\ntype Names []string\n", "Names", &Options::default()).unwrap();
        assert!(code.starts_with("// Code generated by funcup. DO NOT EDIT.\n\npackage demo\n"));
        assert!(code.contains("func (n Names) ForEach(cb func(element string, index int, slice Names) error) {"));
    }

    #[test]
    fn test_foreign_element() {
        let code = generate(
            "package demo\n\nimport \"time\"\n\ntype Durations []time.Duration\n",
            "Durations",
            &Options::default(),
        )
        .unwrap();
        assert!(code.contains("import (\n\t\"time\"\n)\n"));
        assert!(code.contains("element time.Duration"));
    }

    #[test]
    fn test_phase_labels() {
        let options = Options::default();
        assert_eq!(generate("", "X", &options).unwrap_err().phase(), Phase::Parse);
        assert_eq!(
            generate("package demo\n\ntype Xs []Missing\n", "Xs", &options)
                .unwrap_err()
                .phase(),
            Phase::Check
        );
        assert_eq!(
            generate("package demo\n\ntype M map[string]int\n", "M", &options)
                .unwrap_err()
                .phase(),
            Phase::Resolve
        );
        let none = Options {
            methods: Vec::new(),
            ..Options::default()
        };
        assert_eq!(
            generate("package demo\n\ntype Xs []int\n", "Xs", &none).unwrap_err().phase(),
            Phase::Render
        );
    }

    #[test]
    fn test_run_details() {
        let options = Options {
            methods: vec![Template::Map, Template::ForEach],
            ..Options::default()
        };
        let units = [SourceUnit::new("demo.go", "package demo\n\ntype Xs []*int\n")];
        let generated = pipeline().run(&units, "example.com/demo", "Xs", &options).unwrap();
        assert_eq!(generated.package, "demo");
        assert_eq!(generated.element, "*int");
        assert_eq!(generated.methods, vec![Template::ForEach, Template::Map]);
    }
}
