use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use contract_schema_core::{ValidateOptions, has_errors, validate};
use contract_schema_db::{
    CheckConfig, DatabaseError, LibraryEntry, Manifest, SpecDatabase, SpecFile, spec_files,
};
use contract_schema_skit::output::{OutputFormat, SpecReport, format_reports};
use contract_schema_skit::{DocumentFormat, serialize, to_cppcheck_xml};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file picked up from the working directory when `--config` is not
/// given.
const DEFAULT_CONFIG: &str = ".contract-schema.yml";

const LOG_TARGETS: &str =
    "contract_schema_core=debug,contract_schema_skit=debug,contract_schema_db=debug,contract_schema=debug";

#[derive(Debug, Parser)]
#[command(name = "contract-schema", version)]
#[command(about = "Check, convert and generate C API contract specifications")]
struct Cli {
    /// Log loading and generation details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate spec files and report diagnostics.
    Check(CheckArgs),
    /// Generate a Cppcheck library file from one spec.
    Generate(GenerateArgs),
    /// Convert a spec between SKIT, JSON and YAML.
    Convert(ConvertArgs),
    /// Regenerate Cppcheck library files for a directory of specs.
    Build(BuildArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Spec files and/or directories containing spec files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Comma-separated functions defined outside the checked specs.
    #[arg(long)]
    allow: Option<String>,
    /// Path to the check configuration (default: ./.contract-schema.yml if present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: OutputFormat,
    /// Fail on warnings as well as errors.
    #[arg(long)]
    deny_warnings: bool,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Spec file to generate from.
    input: PathBuf,
    /// Output path for the library file (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Input format (default: from the file extension).
    #[arg(long)]
    from: Option<DocumentFormat>,
    /// Comma-separated functions defined outside the spec.
    #[arg(long)]
    allow: Option<String>,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// Spec file to convert.
    input: PathBuf,
    /// Target format.
    #[arg(long)]
    to: DocumentFormat,
    /// Input format (default: from the file extension).
    #[arg(long)]
    from: Option<DocumentFormat>,
    /// Output path (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Directory containing spec files.
    #[arg(long)]
    source: PathBuf,
    /// Output directory for generated library files.
    #[arg(long)]
    output: PathBuf,
    /// Path to manifest.json.
    #[arg(long)]
    manifest: PathBuf,
    /// Path to the check configuration (allow-list and exclusions).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Regenerate every library regardless of the manifest.
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Check(args) => run_check(args),
        Command::Generate(args) => run_generate(args),
        Command::Convert(args) => run_convert(args),
        Command::Build(args) => run_build(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(LOG_TARGETS)
    } else if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_check(args: CheckArgs) -> Result<(), String> {
    use rayon::prelude::*;

    let config = load_config(args.config.as_deref())?;
    let options = config
        .validate_options()
        .with_external(parse_csv_list(args.allow));
    let deny_warnings = args.deny_warnings || config.deny_warnings;

    let paths = collect_spec_paths(&args.inputs, &config)?;
    if paths.is_empty() {
        return Err("No spec files found in the given inputs".to_string());
    }
    info!(files = paths.len(), "Checking spec files");

    let reports: Vec<SpecReport> = paths
        .par_iter()
        .map(|path| check_file(path, &options))
        .collect();

    let rendered = format_reports(&reports, args.format)?;
    print!("{rendered}");

    let failed = reports
        .iter()
        .filter(|r| r.is_failure(deny_warnings))
        .count();
    if failed > 0 {
        return Err(format!("{failed} of {} spec file(s) failed the check", reports.len()));
    }
    Ok(())
}

fn check_file(path: &Path, options: &ValidateOptions) -> SpecReport {
    let source = path.display().to_string();
    match SpecFile::load(path) {
        Ok(file) => SpecReport::new(source, validate(&file.spec, options)),
        Err(DatabaseError::Parse { source: err, .. }) => SpecReport::failed_to_load(source, err),
        Err(err) => SpecReport::failed_to_load(source, err),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), String> {
    let file = load_spec_file(&args.input, args.from)?;

    let options = ValidateOptions::default().with_external(parse_csv_list(args.allow));
    let diagnostics = validate(&file.spec, &options);
    for diagnostic in &diagnostics {
        eprintln!("{}: {diagnostic}", args.input.display());
    }
    if has_errors(&diagnostics) {
        return Err(format!(
            "'{}' has errors; no library file written",
            args.input.display()
        ));
    }

    write_output(args.output.as_deref(), &to_cppcheck_xml(&file.spec))
}

fn run_convert(args: ConvertArgs) -> Result<(), String> {
    let file = load_spec_file(&args.input, args.from)?;
    let text = serialize(&file.spec, args.to).map_err(|e| e.to_string())?;
    write_output(args.output.as_deref(), &text)
}

fn run_build(args: BuildArgs) -> Result<(), String> {
    use rayon::prelude::*;

    let config = load_config(args.config.as_deref())?;
    let options = config.validate_options();

    let db = SpecDatabase::builder()
        .from_dir(&args.source)
        .exclude(config.exclude.iter().cloned())
        .build()
        .map_err(|e| format!("Failed to load specs from '{}': {e}", args.source.display()))?;

    let mut manifest = Manifest::load_or_new(&args.manifest, PACKAGE_VERSION)
        .map_err(|e| format!("Failed to load manifest '{}': {e}", args.manifest.display()))?;
    let previous = manifest.clone();

    fs::create_dir_all(&args.output).map_err(|e| {
        format!(
            "Failed to create output directory '{}': {e}",
            args.output.display()
        )
    })?;

    let mut pending = Vec::new();
    let mut skipped = Vec::new();
    for file in db.iter() {
        if args.force || manifest.needs_regeneration(&file.library, &file.checksum, PACKAGE_VERSION)
        {
            pending.push(file);
        } else {
            debug!(library = %file.library, "Unchanged, skipping");
            skipped.push(file.library.as_str());
        }
    }

    struct BuildOutcome {
        library: String,
        result: Result<LibraryEntry, String>,
    }

    let outcomes: Vec<BuildOutcome> = pending
        .par_iter()
        .map(|file| BuildOutcome {
            library: file.library.clone(),
            result: generate_library(file, &options, &args.output),
        })
        .collect();

    let mut generated = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(entry) => {
                manifest.update_entry(outcome.library.clone(), entry);
                generated.push(outcome.library);
            }
            Err(err) => {
                manifest.remove_entry(&outcome.library);
                failures.push((outcome.library, err));
            }
        }
    }

    let stale = manifest.stale(db.libraries());
    for library in &stale {
        manifest.remove_entry(library);
    }
    manifest.tool_version = PACKAGE_VERSION.to_string();
    let changed = previous.diff(&manifest);
    manifest
        .save(&args.manifest)
        .map_err(|e| format!("Failed to save manifest '{}': {e}", args.manifest.display()))?;

    println!("Build Summary:");
    println!("  Libraries: {}", db.len());
    println!("  Generated: {}", generated.len());
    println!("  Skipped: {} (unchanged)", skipped.len());
    println!("  Removed: {}", stale.len());
    println!("  Failed: {}", failures.len());
    println!("  Manifest changes: {}", changed.len());
    if !generated.is_empty() {
        println!("\nGenerated libraries:");
        for library in &generated {
            println!("  {library}");
        }
    }
    if !changed.is_empty() {
        println!("\nChanged manifest entries:");
        for library in &changed {
            println!("  {library}");
        }
    }
    if !failures.is_empty() {
        eprintln!("\nFailures:");
        for (library, err) in &failures {
            eprintln!("  {library}: {err}");
        }
        return Err(format!("{} librar(ies) failed to build", failures.len()));
    }
    Ok(())
}

fn generate_library(
    file: &SpecFile,
    options: &ValidateOptions,
    output_dir: &Path,
) -> Result<LibraryEntry, String> {
    let diagnostics = validate(&file.spec, options);
    if has_errors(&diagnostics) {
        let messages: Vec<String> = diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(ToString::to_string)
            .collect();
        return Err(messages.join("; "));
    }

    let output = format!("{}.cfg", file.library);
    let path = output_dir.join(&output);
    fs::write(&path, to_cppcheck_xml(&file.spec))
        .map_err(|e| format!("Failed to write '{}': {e}", path.display()))?;
    info!(library = %file.library, output = %path.display(), "Generated library file");

    Ok(LibraryEntry {
        source: file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        checksum: file.checksum.clone(),
        output,
        functions: file.spec.function_count(),
        resources: file.spec.resource_count(),
        generated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    })
}

fn load_config(path: Option<&Path>) -> Result<CheckConfig, String> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).is_file() => Path::new(DEFAULT_CONFIG),
        None => return Ok(CheckConfig::default()),
    };
    CheckConfig::load(path).map_err(|e| format!("Failed to load config '{}': {e}", path.display()))
}

fn load_spec_file(path: &Path, format: Option<DocumentFormat>) -> Result<SpecFile, String> {
    match format {
        Some(format) => SpecFile::load_as(path, format),
        None => SpecFile::load(path),
    }
    .map_err(|e| e.to_string())
}

/// Expands directories into their spec files; excluded entries of a
/// directory are skipped, explicitly named files are always kept.
fn collect_spec_paths(inputs: &[PathBuf], config: &CheckConfig) -> Result<Vec<PathBuf>, String> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let files = spec_files(input)
                .map_err(|e| format!("Failed to read directory '{}': {e}", input.display()))?;
            paths.extend(files.into_iter().filter(|f| !config.is_excluded(f)));
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

fn write_output(path: Option<&Path>, text: &str) -> Result<(), String> {
    match path {
        Some(path) => {
            fs::write(path, text).map_err(|e| format!("Failed to write '{}': {e}", path.display()))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn parse_csv_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    })
    .unwrap_or_default()
}
