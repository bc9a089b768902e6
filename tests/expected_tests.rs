//! Test runner that compares generator output against .expected.go and
//! .expected.err files
//!
//! Each case starts with directive comments:
//!
//! ```text
//! // target: Users
//! // methods: foreach,map
//! // accumulator: int
//! ```
//!
//! Imports resolve against the stub Go installation in tests/goroot.
//!
//! Run with: cargo test --test expected_tests

use funcup::generate::Template;
use funcup::importer::SourceImporter;
use funcup::parser::SourceUnit;
use funcup::{Options, Pipeline};
use libtest_mimic::{Arguments, Failed, Trial};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PACKAGE_PATH: &str = "example.com/golden";

fn main() {
    let args = Arguments::from_args();
    let mut tests: Vec<Trial> = collect("golden").into_iter().map(golden_trial).collect();
    tests.extend(collect("errors").into_iter().map(error_trial));
    libtest_mimic::run(&args, tests).exit();
}

/// Case files of `tests/<dir>`, without the expectation files.
fn collect(dir: &str) -> Vec<PathBuf> {
    let pattern = format!("{}/tests/{}/*.go", env!("CARGO_MANIFEST_DIR"), dir);
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .expect("valid glob pattern")
        .filter_map(Result::ok)
        .filter(|path| !path.to_string_lossy().ends_with(".expected.go"))
        .collect();
    files.sort();
    files
}

struct Case {
    name: String,
    source: String,
    target: String,
    options: Options,
}

fn read_case(path: &Path) -> Result<Case, Failed> {
    let source = fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let mut target = None;
    let mut options = Options::default();
    for line in source.lines() {
        let Some(directive) = line.strip_prefix("// ") else {
            break;
        };
        let Some((key, value)) = directive.split_once(": ") else {
            break;
        };
        match key {
            "target" => target = Some(value.trim().to_string()),
            "methods" => options.methods = Template::parse_list(value)?,
            "accumulator" => options.accumulator = Some(value.trim().to_string()),
            other => return Err(format!("unknown directive {:?}", other).into()),
        }
    }
    let target = target.ok_or_else(|| format!("{} has no `// target:` directive", path.display()))?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("input.go")
        .to_string();
    Ok(Case {
        name,
        source,
        target,
        options,
    })
}

fn pipeline(path: &Path) -> Pipeline {
    let dir = path.parent().unwrap_or(Path::new("."));
    let goroot = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("goroot");
    Pipeline::with_importer(Arc::new(SourceImporter::for_dir(dir).with_goroot(goroot)))
}

fn run(path: &Path) -> Result<(Case, Result<funcup::Generated, funcup::error::GenerateError>), Failed> {
    let case = read_case(path)?;
    let units = [SourceUnit::new(case.name.as_str(), case.source.as_bytes())];
    let result = pipeline(path).run(&units, PACKAGE_PATH, &case.target, &case.options);
    Ok((case, result))
}

fn trial_name(path: &Path) -> String {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

fn golden_trial(path: PathBuf) -> Trial {
    Trial::test(trial_name(&path), move || {
        let expected_path = path.with_extension("expected.go");
        let expected = fs::read_to_string(&expected_path)
            .map_err(|e| format!("missing expected file {}: {}", expected_path.display(), e))?;
        let (case, result) = run(&path)?;
        let generated = result.map_err(|e| e.render(Some(&case.source)))?;
        if generated.code != expected {
            return Err(format!(
                "output mismatch\n--- expected ---\n{}\n--- actual ---\n{}",
                expected, generated.code
            )
            .into());
        }
        check_properties(&generated.code, &case)?;
        Ok(())
    })
}

/// Properties every generated file has regardless of the case.
fn check_properties(code: &str, case: &Case) -> Result<(), Failed> {
    if !code.starts_with("// Code generated by funcup. DO NOT EDIT.\n\npackage ") {
        return Err("missing generated-file header".into());
    }
    if code.matches("\npackage ").count() != 1 {
        return Err("expected exactly one package clause".into());
    }
    let method = format!(") {}(", case.options.methods.first().copied().unwrap_or(Template::ForEach));
    if !code.contains(&method) {
        return Err(format!("no method {:?} on the target", method).into());
    }
    Ok(())
}

fn error_trial(path: PathBuf) -> Trial {
    Trial::test(trial_name(&path), move || {
        let expected_path = path.with_extension("expected.err");
        let expected = fs::read_to_string(&expected_path)
            .map_err(|e| format!("missing expected file {}: {}", expected_path.display(), e))?;
        let (case, result) = run(&path)?;
        match result {
            Ok(_) => Err("expected an error but generation succeeded".into()),
            Err(e) => {
                let actual = e.render(Some(&case.source));
                if actual.trim() != expected.trim() {
                    return Err(format!(
                        "error mismatch\n--- expected ---\n{}\n--- actual ---\n{}",
                        expected.trim(),
                        actual.trim()
                    )
                    .into());
                }
                Ok(())
            }
        }
    })
}
