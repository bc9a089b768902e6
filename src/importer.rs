//! Import resolution: turning an import path into a typed package.
//!
//! Dependency packages are checked in shallow mode: declarations only, with
//! their own imports left opaque. That is enough to name, print and take the
//! underlying form of any type the target package mentions.

use crate::check::TypeChecker;
use crate::error::ImportError;
use crate::parser::{GoParser, Parser, SourceUnit, SyntaxTree};
use crate::types::TypedPackage;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

pub trait ImportResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Result<Arc<TypedPackage>, ImportError>;
}

/// Shallow-check the files of one dependency package. Files of a minority
/// package name (stray `main` tools, docs) are dropped.
fn check_trees(path: &str, trees: Vec<SyntaxTree>) -> Result<TypedPackage, ImportError> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for tree in &trees {
        *counts.entry(tree.package_name().to_string()).or_default() += 1;
    }
    let Some(name) = counts
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(name, _)| name.clone())
    else {
        return Err(ImportError::NotFound { path: path.to_string() });
    };
    let trees: Vec<SyntaxTree> = trees
        .into_iter()
        .filter(|tree| tree.package_name() == name)
        .collect();

    TypeChecker::shallow(path)
        .check(&trees)
        .map_err(|err| ImportError::Check {
            path: path.to_string(),
            source: Box::new(err),
        })
}

/// Loads packages from Go source trees on disk.
pub struct SourceImporter {
    module: Option<GoModule>,
    goroot: Option<PathBuf>,
    gopath: Vec<PathBuf>,
    modcache: Option<PathBuf>,
    parser: GoParser,
    cache: Mutex<HashMap<String, Arc<TypedPackage>>>,
}

/// The enclosing module: its path, root directory and required versions.
#[derive(Debug, Clone)]
struct GoModule {
    path: String,
    dir: PathBuf,
    requires: BTreeMap<String, String>,
}

impl SourceImporter {
    /// Importer for a package in `dir`: finds the enclosing module and the
    /// Go installation from the environment.
    pub fn for_dir(dir: &Path) -> Self {
        let gopath: Vec<PathBuf> = match std::env::var_os("GOPATH") {
            Some(value) => std::env::split_paths(&value).collect(),
            None => home_dir().map(|home| vec![home.join("go")]).unwrap_or_default(),
        };
        let modcache = std::env::var_os("GOMODCACHE")
            .map(PathBuf::from)
            .or_else(|| gopath.first().map(|first| first.join("pkg").join("mod")));
        Self {
            module: find_module(dir),
            goroot: find_goroot(),
            gopath,
            modcache,
            parser: GoParser::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn new() -> Self {
        let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::for_dir(&dir)
    }

    pub fn with_goroot(mut self, goroot: impl Into<PathBuf>) -> Self {
        self.goroot = Some(goroot.into());
        self
    }

    /// Path of the enclosing module, if any.
    pub fn module_path(&self) -> Option<&str> {
        self.module.as_ref().map(|module| module.path.as_str())
    }

    /// Import path of the package in `dir` when it lies inside the module.
    pub fn package_path(&self, dir: &Path) -> Option<String> {
        let module = self.module.as_ref()?;
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let rest = dir.strip_prefix(&module.dir).ok()?;
        let mut path = module.path.clone();
        for part in rest.components() {
            path.push('/');
            path.push_str(&part.as_os_str().to_string_lossy());
        }
        Some(path)
    }

    /// Directory holding the sources of `path`.
    pub fn locate(&self, path: &str) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(module) = &self.module {
            if path == module.path {
                candidates.push(module.dir.clone());
            } else if let Some(rest) = path.strip_prefix(&format!("{}/", module.path)) {
                candidates.push(module.dir.join(rest));
            }
        }
        if let Some(goroot) = &self.goroot {
            candidates.push(goroot.join("src").join(path));
            candidates.push(goroot.join("src").join("vendor").join(path));
        }
        if let Some(module) = &self.module {
            candidates.push(module.dir.join("vendor").join(path));
        }
        for root in &self.gopath {
            candidates.push(root.join("src").join(path));
        }
        candidates
            .into_iter()
            .find(|dir| has_go_files(dir))
            .or_else(|| self.locate_in_modcache(path))
    }

    /// `$GOMODCACHE/<module>@<version>/<rest>`, trying the longest module
    /// prefix of `path` first.
    fn locate_in_modcache(&self, path: &str) -> Option<PathBuf> {
        let modcache = self.modcache.as_ref()?;
        let segments: Vec<&str> = path.split('/').collect();
        for len in (1..=segments.len()).rev() {
            let module = segments[..len].join("/");
            let rest = segments[len..].join("/");
            let escaped = escape_module_path(&module);
            let (parent, last) = match escaped.rsplit_once('/') {
                Some((parent, last)) => (modcache.join(parent), last.to_string()),
                None => (modcache.clone(), escaped.clone()),
            };
            let required = self
                .module
                .as_ref()
                .and_then(|m| m.requires.get(&module))
                .cloned();
            let Some(version) = required.or_else(|| highest_version(&parent, &last)) else {
                continue;
            };
            let dir = parent.join(format!("{}@{}", last, version)).join(&rest);
            if has_go_files(&dir) {
                return Some(dir);
            }
        }
        None
    }

    fn load(&self, path: &str, dir: &Path) -> Result<TypedPackage, ImportError> {
        let entries = std::fs::read_dir(dir).map_err(|err| ImportError::Io {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|file| file.is_file())
            .filter(|file| {
                file.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(is_candidate_file)
            })
            .collect();
        files.sort();

        let mut trees = Vec::new();
        for file in files {
            let Ok(bytes) = std::fs::read(&file) else { continue };
            if String::from_utf8_lossy(&bytes).lines().any(is_ignore_constraint) {
                continue;
            }
            let unit = SourceUnit::new(file.display().to_string(), bytes);
            match self.parser.parse(&unit) {
                Ok(tree) => trees.push(tree),
                Err(err) => {
                    tracing::debug!(file = %file.display(), error = %err, "skipping unparsable file")
                }
            }
        }
        if trees.is_empty() {
            return Err(ImportError::NotFound { path: path.to_string() });
        }
        check_trees(path, trees)
    }
}

impl Default for SourceImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportResolver for SourceImporter {
    fn resolve(&self, path: &str) -> Result<Arc<TypedPackage>, ImportError> {
        if let Some(package) = self.cache.lock().get(path) {
            return Ok(package.clone());
        }
        let Some(dir) = self.locate(path) else {
            tracing::debug!(path, "package not found");
            return Err(ImportError::NotFound { path: path.to_string() });
        };
        let package = Arc::new(self.load(path, &dir)?);
        tracing::debug!(
            path,
            dir = %dir.display(),
            name = %package.name,
            symbols = package.scope.len(),
            "loaded package"
        );
        self.cache.lock().insert(path.to_string(), package.clone());
        Ok(package)
    }
}

/// In-memory packages keyed by import path.
#[derive(Default)]
pub struct MapImporter {
    sources: BTreeMap<String, Vec<SourceUnit>>,
    packages: BTreeMap<String, Arc<TypedPackage>>,
    cache: Mutex<HashMap<String, Arc<TypedPackage>>>,
}

impl MapImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file to the package at `path`.
    pub fn with_source(mut self, path: &str, name: &str, text: &str) -> Self {
        self.sources
            .entry(path.to_string())
            .or_default()
            .push(SourceUnit::new(name, text));
        self
    }

    /// Serve an already built package.
    pub fn with_package(mut self, package: Arc<TypedPackage>) -> Self {
        self.packages.insert(package.path.clone(), package);
        self
    }
}

impl ImportResolver for MapImporter {
    fn resolve(&self, path: &str) -> Result<Arc<TypedPackage>, ImportError> {
        if let Some(package) = self.packages.get(path) {
            return Ok(package.clone());
        }
        if let Some(package) = self.cache.lock().get(path) {
            return Ok(package.clone());
        }
        let Some(units) = self.sources.get(path) else {
            return Err(ImportError::NotFound { path: path.to_string() });
        };
        let parser = GoParser::new();
        let mut trees = Vec::with_capacity(units.len());
        for unit in units {
            let tree = parser.parse(unit).map_err(|err| ImportError::Parse {
                path: path.to_string(),
                source: err,
            })?;
            trees.push(tree);
        }
        let package = Arc::new(check_trees(path, trees)?);
        self.cache.lock().insert(path.to_string(), package.clone());
        Ok(package)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

fn find_goroot() -> Option<PathBuf> {
    if let Some(goroot) = std::env::var_os("GOROOT").filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(goroot));
    }
    let from_go = Command::new("go")
        .args(["env", "GOROOT"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|goroot| !goroot.is_empty())
        .map(PathBuf::from);
    from_go.or_else(|| {
        ["/usr/local/go", "/usr/lib/go"]
            .into_iter()
            .map(PathBuf::from)
            .find(|dir| dir.join("src").is_dir())
    })
}

/// Walk up from `dir` to the nearest `go.mod`.
fn find_module(dir: &Path) -> Option<GoModule> {
    let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    for candidate in start.ancestors() {
        let Ok(text) = std::fs::read_to_string(candidate.join("go.mod")) else {
            continue;
        };
        let (path, requires) = parse_go_mod(&text);
        return path.map(|path| GoModule {
            path,
            dir: candidate.to_path_buf(),
            requires,
        });
    }
    None
}

/// Module path and required versions of a `go.mod` file.
fn parse_go_mod(text: &str) -> (Option<String>, BTreeMap<String, String>) {
    let mut module = None;
    let mut requires = BTreeMap::new();
    let mut in_require = false;
    for line in text.lines() {
        let line = line.split("//").next().unwrap_or("").trim();
        if in_require {
            if line == ")" {
                in_require = false;
            } else if let [path, version, ..] = line.split_whitespace().collect::<Vec<_>>()[..] {
                requires.insert(path.to_string(), version.to_string());
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("module ") {
            module = Some(rest.trim().trim_matches('"').to_string());
        } else if line.starts_with("require") {
            let rest = line["require".len()..].trim();
            if rest == "(" {
                in_require = true;
            } else if let [path, version, ..] = rest.split_whitespace().collect::<Vec<_>>()[..] {
                requires.insert(path.to_string(), version.to_string());
            }
        }
    }
    (module, requires)
}

/// Module cache path escaping: upper-case letters become `!` plus the
/// lower-case letter.
fn escape_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Highest `<name>@<version>` directory under `parent`.
fn highest_version(parent: &Path, name: &str) -> Option<String> {
    let prefix = format!("{}@", name);
    std::fs::read_dir(parent)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|file| file.strip_prefix(&prefix).map(str::to_string))
        })
        .max_by(|a, b| version_key(a).cmp(&version_key(b)))
}

fn version_key(version: &str) -> (Vec<u64>, bool, String) {
    let trimmed = version.trim_start_matches('v');
    let (core, pre) = match trimmed.split_once('-') {
        Some((core, pre)) => (core, pre),
        None => (trimmed, ""),
    };
    let numbers = core
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect();
    // Releases sort above pre-releases of the same version
    (numbers, pre.is_empty(), pre.to_string())
}

fn has_go_files(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries.filter_map(|entry| entry.ok()).any(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(is_candidate_file)
            })
        })
        .unwrap_or(false)
}

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// Non-test Go file whose `_GOOS`/`_GOARCH` name suffix matches the host.
fn is_candidate_file(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".go") else {
        return false;
    };
    if stem.ends_with("_test") || stem.starts_with('.') || stem.starts_with('_') {
        return false;
    }
    let parts: Vec<&str> = stem.split('_').collect();
    match parts.as_slice() {
        [.., os, arch] if KNOWN_OS.contains(os) && KNOWN_ARCH.contains(arch) => {
            *os == host_os() && *arch == host_arch()
        }
        [_, .., last] if KNOWN_OS.contains(last) => *last == host_os(),
        [_, .., last] if KNOWN_ARCH.contains(last) => *last == host_arch(),
        _ => true,
    }
}

fn is_ignore_constraint(line: &str) -> bool {
    let line = line.trim();
    let Some(expr) = line
        .strip_prefix("//go:build")
        .or_else(|| line.strip_prefix("// +build"))
    else {
        return false;
    };
    expr.split(|c: char| !c.is_alphanumeric() && c != '!')
        .any(|word| word == "ignore")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;

    #[test]
    fn test_map_importer_checks_sources() {
        let importer = MapImporter::new()
            .with_source("example.com/model", "user.go", "package model\n\ntype User struct {\n\tName string\n}\n")
            .with_source("example.com/model", "id.go", "package model\n\ntype ID int64\n");
        let package = importer.resolve("example.com/model").unwrap();
        assert_eq!(package.name, "model");
        assert!(package.complete);
        assert!(package.lookup("User").is_some());
        assert_eq!(package.lookup("ID").unwrap().underlying.to_string(), "int64");

        let again = importer.resolve("example.com/model").unwrap();
        assert!(Arc::ptr_eq(&package, &again));
    }

    #[test]
    fn test_map_importer_not_found() {
        let err = MapImporter::new().resolve("nope").unwrap_err();
        assert!(matches!(err, ImportError::NotFound { .. }));
        assert_eq!(err.to_string(), "could not import nope (cannot find package)");
    }

    #[test]
    fn test_map_importer_prebuilt_package() {
        let package = Arc::new(TypedPackage::opaque("example.com/x", "x"));
        let importer = MapImporter::new().with_package(package.clone());
        assert!(Arc::ptr_eq(&importer.resolve("example.com/x").unwrap(), &package));
    }

    #[test]
    fn test_majority_package_name() {
        let importer = MapImporter::new()
            .with_source("lib", "a.go", "package lib\n\ntype A int\n")
            .with_source("lib", "b.go", "package lib\n\ntype B int\n")
            .with_source("lib", "gen.go", "package main\n\nfunc main() {}\n");
        let package = importer.resolve("lib").unwrap();
        assert_eq!(package.name, "lib");
        assert!(package.lookup("main").is_none());
    }

    #[test]
    fn test_parse_go_mod() {
        let text = "module example.com/app\n\ngo 1.22\n\nrequire (\n\tgithub.com/google/uuid v1.6.0\n\tgolang.org/x/text v0.14.0 // indirect\n)\n\nrequire gopkg.in/yaml.v3 v3.0.1\n";
        let (module, requires) = parse_go_mod(text);
        assert_eq!(module.as_deref(), Some("example.com/app"));
        assert_eq!(requires.get("github.com/google/uuid").map(String::as_str), Some("v1.6.0"));
        assert_eq!(requires.get("golang.org/x/text").map(String::as_str), Some("v0.14.0"));
        assert_eq!(requires.get("gopkg.in/yaml.v3").map(String::as_str), Some("v3.0.1"));
    }

    #[test]
    fn test_escape_module_path() {
        assert_eq!(escape_module_path("github.com/BurntSushi/toml"), "github.com/!burnt!sushi/toml");
    }

    #[test]
    fn test_version_order() {
        assert!(version_key("v1.10.0") > version_key("v1.9.3"));
        assert!(version_key("v1.2.0") > version_key("v1.2.0-rc.1"));
    }

    #[test]
    fn test_candidate_files() {
        assert!(is_candidate_file("list.go"));
        assert!(!is_candidate_file("list_test.go"));
        assert!(!is_candidate_file("README.md"));
        assert!(!is_candidate_file("zsys_plan9_mips.go"));
        assert!(!is_candidate_file("file_plan9.go"));
        assert!(is_candidate_file(&format!("file_{}.go", host_os())));
        assert!(is_ignore_constraint("//go:build ignore"));
        assert!(!is_ignore_constraint("//go:build linux && !cgo"));
    }

    #[test]
    fn test_source_importer_reads_module_packages() {
        let root = std::env::temp_dir().join(format!("funcup-importer-{}", std::process::id()));
        let pkg = root.join("model");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(root.join("go.mod"), "module example.com/app\n").unwrap();
        std::fs::write(pkg.join("user.go"), "package model\n\ntype User struct{ Name string }\n").unwrap();
        std::fs::write(pkg.join("user_test.go"), "package model\n\nthis does not parse\n").unwrap();

        let importer = SourceImporter::for_dir(&root);
        assert_eq!(importer.module_path(), Some("example.com/app"));
        assert_eq!(importer.package_path(&pkg).as_deref(), Some("example.com/app/model"));
        assert_eq!(importer.package_path(&root).as_deref(), Some("example.com/app"));
        let package = importer.resolve("example.com/app/model").unwrap();
        assert_eq!(package.name, "model");
        assert!(package.lookup("User").is_some());
        assert!(matches!(
            importer.resolve("example.com/app/missing"),
            Err(ImportError::NotFound { .. })
        ));
        std::fs::remove_dir_all(&root).ok();
    }
}
