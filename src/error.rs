use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Resolved source position: file, 1-based line, 1-based byte column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: Arc<str>,
    pub line: usize,
    pub column: usize,
    /// Byte offset in the file
    pub offset: usize,
    /// Length of the highlighted region in bytes
    #[serde(skip)]
    pub len: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Kind of parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseErrorKind {
    /// Source is not valid UTF-8
    Encoding,
    /// Empty input or no package clause
    MissingPackage,
    /// Tree-sitter reported an error or missing node
    Syntax,
    /// Valid syntax in the wrong place (top-level statements, late imports)
    Misplaced,
}

/// Error during parsing
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub location: Location,
    pub help: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
            help: None,
        }
    }

    /// Add help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeErrorKind {
    Undefined,
    NotAType,
    NotAValue,
    Redeclared,
    UnusedImport,
    InvalidRecursiveType,
    NotExported,
    InvalidReceiver,
    NoNewVariables,
    PackageMismatch,
    Import,
}

/// Name resolution, import or typing failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub message: String,
    pub location: Option<Location>,
    #[source]
    pub cause: Option<Box<ImportError>>,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
            cause: None,
        }
    }

    pub fn import(err: ImportError, location: Option<Location>) -> Self {
        Self {
            kind: TypeErrorKind::Import,
            message: err.to_string(),
            location,
            cause: Some(Box::new(err)),
        }
    }
}

/// Failure of an [`ImportResolver`](crate::importer::ImportResolver).
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("could not import {path} (cannot find package)")]
    NotFound { path: String },

    #[error("could not import {path}: {message}")]
    Io { path: String, message: String },

    #[error("could not import {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("could not import {path}: {source}")]
    Check {
        path: String,
        #[source]
        source: Box<TypeError>,
    },
}

impl ImportError {
    pub fn path(&self) -> &str {
        match self {
            ImportError::NotFound { path }
            | ImportError::Io { path, .. }
            | ImportError::Parse { path, .. }
            | ImportError::Check { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolveErrorKind {
    NotFound,
    NotAType,
    NotASlice,
    Invalid,
}

/// The target cannot be turned into a generation job.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    pub target: String,
    pub message: String,
    pub location: Option<Location>,
}

impl ResolveError {
    pub fn new(kind: ResolveErrorKind, target: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.to_string(),
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }
}

/// Template bindings are malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("empty {binding} binding")]
    EmptyBinding { binding: &'static str },

    #[error("{binding} binding {value:?} is not a Go identifier")]
    InvalidIdentifier { binding: &'static str, value: String },

    #[error("no templates selected")]
    NoTemplates,
}

/// Pipeline phase that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Parse,
    Check,
    Resolve,
    Render,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Parse => "parse",
            Phase::Check => "check",
            Phase::Resolve => "resolve",
            Phase::Render => "render",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the driver: the failing component's error, labelled
/// with its phase.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("parse: {0}")]
    Parse(#[from] ParseError),
    #[error("check: {0}")]
    Check(#[from] TypeError),
    #[error("resolve: {0}")]
    Resolve(#[from] ResolveError),
    #[error("render: {0}")]
    Render(#[from] RenderError),
}

impl GenerateError {
    pub fn phase(&self) -> Phase {
        match self {
            GenerateError::Parse(_) => Phase::Parse,
            GenerateError::Check(_) => Phase::Check,
            GenerateError::Resolve(_) => Phase::Resolve,
            GenerateError::Render(_) => Phase::Render,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            GenerateError::Parse(err) => Some(&err.location),
            GenerateError::Check(err) => err.location.as_ref(),
            GenerateError::Resolve(err) => err.location.as_ref(),
            GenerateError::Render(_) => None,
        }
    }

    fn help(&self) -> Option<&str> {
        match self {
            GenerateError::Parse(err) => err.help.as_deref(),
            _ => None,
        }
    }

    fn message(&self) -> String {
        match self {
            GenerateError::Parse(err) => err.message.clone(),
            GenerateError::Check(err) => err.message.clone(),
            GenerateError::Resolve(err) => err.message.clone(),
            GenerateError::Render(err) => err.to_string(),
        }
    }

    /// One-line diagnostic in the Go toolchain's format:
    /// `file:line:col: phase: message`.
    pub fn diagnostic(&self) -> String {
        match self.location() {
            Some(location) => format!("{}: {}", location, self),
            None => self.to_string(),
        }
    }

    /// Render the error with source context (no color)
    pub fn render(&self, source: Option<&str>) -> String {
        self.render_inner(source, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, source: Option<&str>) -> String {
        self.render_inner(source, true)
    }

    fn render_inner(&self, source: Option<&str>, color: bool) -> String {
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let cyan = if color { "\x1b[1;38;5;73m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push_str(&format!(
            "{}error[{}]:{} {}\n",
            red,
            self.phase(),
            reset,
            self.message()
        ));

        let Some(location) = self.location() else {
            return output;
        };
        output.push_str(&format!(" {}-->{} {}\n", dim, reset, location));

        if let Some(source_line) = source.and_then(|s| s.lines().nth(location.line - 1)) {
            let line_num_width = format!("{}", location.line).len().max(2);
            let underline_start = location.column - 1;
            let underline_len = location
                .len
                .min(source_line.len().saturating_sub(underline_start))
                .max(1);

            output.push_str(&format!("{}{:>width$} |{}\n", dim, "", reset, width = line_num_width));
            output.push_str(&format!(
                "{}{:>width$} |{} {}\n",
                dim,
                location.line,
                reset,
                source_line,
                width = line_num_width
            ));
            // Tabs are kept so the carets line up with the source line
            let padding: String = source_line
                .bytes()
                .take(underline_start)
                .map(|b| if b == b'\t' { '\t' } else { ' ' })
                .collect();
            output.push_str(&format!(
                "{}{:>width$} |{} {}{}{}{}\n",
                dim,
                "",
                reset,
                padding,
                red,
                "^".repeat(underline_len),
                reset,
                width = line_num_width
            ));
        }

        if let Some(help) = self.help() {
            for (i, help_line) in help.lines().enumerate() {
                if i == 0 {
                    output.push_str(&format!(" {}help:{} {}\n", cyan, reset, help_line));
                } else {
                    output.push_str(&format!("       {}\n", help_line));
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(line: usize, column: usize, len: usize) -> Location {
        Location {
            file: Arc::from("demo.go"),
            line,
            column,
            offset: 0,
            len,
        }
    }

    #[test]
    fn test_phase_label() {
        let err: GenerateError = ResolveError::new(
            ResolveErrorKind::NotFound,
            "Missing",
            "target Missing not found in package demo",
        )
        .into();
        assert_eq!(err.phase(), Phase::Resolve);
        assert_eq!(err.to_string(), "resolve: target Missing not found in package demo");
    }

    #[test]
    fn test_diagnostic_with_location() {
        let err: GenerateError =
            TypeError::new(TypeErrorKind::Undefined, "undefined: Foo", Some(location(3, 13, 3))).into();
        assert_eq!(err.diagnostic(), "demo.go:3:13: check: undefined: Foo");
    }

    #[test]
    fn test_render_carets() {
        let source = "package demo\n\ntype Xs []Foo\n";
        let err: GenerateError =
            TypeError::new(TypeErrorKind::Undefined, "undefined: Foo", Some(location(3, 11, 3))).into();
        let rendered = err.render(Some(source));
        assert!(rendered.starts_with("error[check]: undefined: Foo\n"));
        assert!(rendered.contains(" --> demo.go:3:11\n"));
        assert!(rendered.contains(" 3 | type Xs []Foo\n"));
        assert!(rendered.contains(&format!("   | {}^^^\n", " ".repeat(10))));
    }

    #[test]
    fn test_location_serializes_without_len() {
        let json = serde_json::to_value(location(3, 11, 3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "file": "demo.go", "line": 3, "column": 11, "offset": 0 })
        );
    }

    #[test]
    fn test_render_without_location() {
        let err: GenerateError = RenderError::EmptyBinding { binding: "Package" }.into();
        assert_eq!(err.render(None), "error[render]: empty Package binding\n");
        assert_eq!(err.diagnostic(), "render: empty Package binding");
    }

    #[test]
    fn test_import_error_wrapping() {
        let err = TypeError::import(ImportError::NotFound { path: "io/fs".into() }, None);
        assert_eq!(err.kind, TypeErrorKind::Import);
        assert_eq!(err.to_string(), "could not import io/fs (cannot find package)");
        assert_eq!(err.cause.as_ref().map(|c| c.path()), Some("io/fs"));
    }
}
