//! Binary to generate/update .expected.go and .expected.err files
//!
//! Usage:
//!   cargo run --bin accept_expected            # Update all
//!   cargo run --bin accept_expected -- users   # Update only tests matching "users"

use funcup::generate::Template;
use funcup::importer::SourceImporter;
use funcup::parser::SourceUnit;
use funcup::{Options, Pipeline};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

const PACKAGE_PATH: &str = "example.com/golden";

fn main() {
    let filter: Option<String> = std::env::args().nth(1);
    let test_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests");
    let goroot = test_dir.join("goroot");

    let mut updated = 0;
    let mut skipped = 0;

    for dir in ["golden", "errors"] {
        for entry in WalkDir::new(test_dir.join(dir))
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name().to_string_lossy();
                name.ends_with(".go") && !name.ends_with(".expected.go")
            })
        {
            let path = entry.path();
            let path_str = path.to_string_lossy();

            // Apply filter if provided
            if let Some(ref f) = filter {
                if !path_str.contains(f) {
                    skipped += 1;
                    continue;
                }
            }

            process_file(path, &goroot, dir == "errors");
            updated += 1;
        }
    }

    println!("Updated {} files, skipped {}", updated, skipped);
}

/// Target and options from the leading `// key: value` comments.
fn directives(source: &str) -> Result<(String, Options), String> {
    let mut target = None;
    let mut options = Options::default();
    for line in source.lines() {
        let Some((key, value)) = line.strip_prefix("// ").and_then(|d| d.split_once(": ")) else {
            break;
        };
        match key {
            "target" => target = Some(value.trim().to_string()),
            "methods" => options.methods = Template::parse_list(value)?,
            "accumulator" => options.accumulator = Some(value.trim().to_string()),
            other => return Err(format!("unknown directive {:?}", other)),
        }
    }
    let target = target.ok_or("missing `// target:` directive")?;
    Ok((target, options))
}

fn process_file(path: &Path, goroot: &Path, is_error_test: bool) {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {:?}: {}", path, e);
            return;
        }
    };
    let (target, options) = match directives(&source) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Skipping {:?}: {}", path, e);
            return;
        }
    };

    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("input.go");
    let dir = path.parent().unwrap_or(Path::new("."));
    let pipeline = Pipeline::with_importer(Arc::new(SourceImporter::for_dir(dir).with_goroot(goroot)));
    let units = [SourceUnit::new(name, source.as_bytes())];

    match pipeline.run(&units, PACKAGE_PATH, &target, &options) {
        Ok(generated) => {
            if is_error_test {
                eprintln!("ERROR: {:?} generated successfully but is in errors/", path);
                return;
            }
            let expected_go = path.with_extension("expected.go");
            if let Err(e) = fs::write(&expected_go, &generated.code) {
                eprintln!("Failed to write {:?}: {}", expected_go, e);
            } else {
                println!("  wrote {}", expected_go.display());
            }
        }
        Err(e) => {
            if is_error_test {
                let expected_err = path.with_extension("expected.err");
                if let Err(err) = fs::write(&expected_err, e.render(Some(&source))) {
                    eprintln!("Failed to write {:?}: {}", expected_err, err);
                } else {
                    println!("  wrote {}", expected_err.display());
                }
            } else {
                eprintln!("ERROR: {:?} failed to generate but is not in errors/: {}", path, e);
            }
        }
    }
}
