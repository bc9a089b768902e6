use clap::Parser;
use funcup::error::GenerateError;
use funcup::generate::{Template, HEADER};
use funcup::importer::SourceImporter;
use funcup::parser::SourceUnit;
use funcup::{Generated, Options, Pipeline};
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "funcup")]
#[command(about = "funcup - functional iteration methods for Go slice types")]
struct Cli {
    /// Go source file or package directory
    path: PathBuf,

    /// Named slice type to generate methods for
    target: String,

    /// Import path of the package (default: derived from the input's directory)
    #[arg(long = "package")]
    package: Option<String>,

    /// Log the checked package and the resolved target
    #[arg(long)]
    verbose: bool,

    /// Comma-separated templates: foreach, map, filter, reduce
    #[arg(long, value_delimiter = ',', default_value = "foreach")]
    methods: Vec<Template>,

    /// Accumulator type of the Reduce method (default: the element type)
    #[arg(long)]
    accumulator: Option<String>,

    /// Write the generated code to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a JSON document with the resolved details and the code
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let units = match read_units(&cli.path, cli.output.as_deref()) {
        Ok(units) => units,
        Err(message) => {
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
    };

    let dir = package_dir(&cli.path);
    let importer = SourceImporter::for_dir(&dir);
    let package_path = cli
        .package
        .clone()
        .or_else(|| importer.package_path(&dir))
        .unwrap_or_else(|| fallback_package_path(&dir));

    let options = Options {
        verbose: cli.verbose,
        methods: cli.methods.clone(),
        accumulator: cli.accumulator.clone(),
    };
    let pipeline = Pipeline::with_importer(Arc::new(importer));
    match pipeline.run(&units, &package_path, &cli.target, &options) {
        Ok(generated) => {
            if let Err(err) = write_output(&cli, &generated) {
                eprintln!("Error: {}", err);
                std::process::exit(1);
            }
        }
        Err(err) => {
            print_error(&err, &units);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// The input file, or every candidate file of the input directory.
fn read_units(path: &Path, output: Option<&Path>) -> Result<Vec<SourceUnit>, String> {
    if path.is_file() {
        let bytes = fs::read(path).map_err(|err| format!("cannot read {}: {}", path.display(), err))?;
        return Ok(vec![SourceUnit::new(path.display().to_string(), bytes)]);
    }
    if !path.is_dir() {
        return Err(format!("{} does not exist", path.display()));
    }

    let mut units = Vec::new();
    for entry in WalkDir::new(path)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let file = entry.path();
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".go") || name.ends_with("_test.go") {
            continue;
        }
        if output.is_some_and(|output| same_file(output, file)) {
            continue;
        }
        let bytes = fs::read(file).map_err(|err| format!("cannot read {}: {}", file.display(), err))?;
        if is_generated(&bytes) {
            tracing::debug!(file = %file.display(), "skipping generated file");
            continue;
        }
        units.push(SourceUnit::new(file.display().to_string(), bytes));
    }
    if units.is_empty() {
        return Err(format!("no Go files found in {}", path.display()));
    }
    Ok(units)
}

fn is_generated(bytes: &[u8]) -> bool {
    bytes
        .split(|b| *b == b'\n')
        .next()
        .is_some_and(|first| first.trim_ascii_end() == HEADER.as_bytes())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn package_dir(path: &Path) -> PathBuf {
    let dir = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(Path::new("."))
    };
    if dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        dir.to_path_buf()
    }
}

fn fallback_package_path(dir: &Path) -> String {
    dir.canonicalize()
        .ok()
        .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "main".to_string())
}

fn write_output(cli: &Cli, generated: &Generated) -> io::Result<()> {
    let text = if cli.json {
        let mut json = serde_json::to_string_pretty(generated).map_err(io::Error::other)?;
        json.push('\n');
        json
    } else {
        generated.code.clone()
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, text)?;
            print_generated(&path.display().to_string());
            Ok(())
        }
        None => io::stdout().lock().write_all(text.as_bytes()),
    }
}

fn print_error(err: &GenerateError, units: &[SourceUnit]) {
    let source = err.location().and_then(|location| {
        units
            .iter()
            .find(|unit| unit.name == location.file)
            .map(|unit| String::from_utf8_lossy(&unit.bytes).into_owned())
    });
    if io::stderr().is_terminal() {
        eprint!("{}", err.render_color(source.as_deref()));
    } else {
        eprint!("{}", err.render(source.as_deref()));
    }
}

fn print_generated(path: &str) {
    if io::stderr().is_terminal() {
        eprintln!("  \x1b[32m✓\x1b[0m {}", path);
    } else {
        eprintln!("  ✓ {}", path);
    }
}
