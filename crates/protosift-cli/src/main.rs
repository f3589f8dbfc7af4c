//! protosift - Recover Protocol Buffer definitions from compiled binaries
//!
//! This tool scans binary files for embedded protobuf file descriptors,
//! links them into a registry, and writes them back out as `.proto` source
//! files in dependency order.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use protosift_core::{
    render_file, Diagnostic, DuplicatePolicy, Origin, RegisterOutcome, Registry, ScanStrategy,
    Scanner, ScannerConfig,
};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Recover Protocol Buffer definitions from compiled binaries
#[derive(Parser, Debug)]
#[command(name = "protosift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Output directory for recovered .proto files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Maximum number of descriptors to recover per file (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_descriptors: usize,

    /// Dry run - don't write files, just show what would be recovered
    #[arg(long)]
    dry_run: bool,

    /// Overwrite existing files without prompting
    #[arg(long)]
    force: bool,

    /// Only list recovered descriptor names without writing files
    #[arg(long)]
    list_only: bool,

    /// How to handle same-name descriptors with different content
    #[arg(long, value_enum, default_value = "keep-both")]
    duplicates: DuplicateArg,

    /// Also recover the embedded google/protobuf/descriptor.proto schema
    #[arg(long)]
    include_well_known: bool,

    /// Accept embedded names that do not end in .proto
    #[arg(long)]
    any_name: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single binary file to recover definitions from
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of binaries to process
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Policy for same-name, different-content descriptors
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DuplicateArg {
    /// Keep the first copy seen, discard later ones
    KeepFirst,
    /// Keep the last copy seen, replacing earlier ones
    KeepLast,
    /// Keep every distinct copy, renaming extras: file~a1b2c3d4.proto
    KeepBoth,
}

impl From<DuplicateArg> for DuplicatePolicy {
    fn from(arg: DuplicateArg) -> Self {
        match arg {
            DuplicateArg::KeepFirst => DuplicatePolicy::KeepFirst,
            DuplicateArg::KeepLast => DuplicatePolicy::KeepLast,
            DuplicateArg::KeepBoth => DuplicatePolicy::KeepBoth,
        }
    }
}

#[derive(Default)]
struct SummaryStats {
    binaries_scanned: usize,
    descriptors_found: usize,
    duplicates_collapsed: usize,
    conflicts: usize,
    files_written: usize,
    unresolved_references: usize,
}

impl SummaryStats {
    fn print(&self) {
        info!(
            "Summary: {} binaries scanned, {} descriptors found, {} duplicates collapsed, \
             {} conflicts, {} files written, {} unresolved references",
            self.binaries_scanned,
            self.descriptors_found,
            self.duplicates_collapsed,
            self.conflicts,
            self.files_written,
            self.unresolved_references
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let mut registry = Registry::with_policy(cli.duplicates.into());
    let mut stats = SummaryStats::default();

    if let Some(ref file) = cli.input.file {
        if !file.exists() {
            bail!("Input file does not exist: {}", file.display());
        }
        if !file.is_file() {
            bail!("Input path is not a file: {}", file.display());
        }
        collect_binary(cli, file, &mut registry, &mut stats)?;
    } else if let Some(ref directory) = cli.input.directory {
        collect_directory(cli, directory, &mut registry, &mut stats)?;
    } else {
        bail!("Either --file or --directory must be specified");
    }

    emit(cli, &registry, &mut stats)?;

    if !cli.list_only {
        stats.print();
    }
    Ok(())
}

/// Walks a directory and collects descriptors from everything that looks
/// like a binary. Per-file errors are logged and skipped so one unreadable
/// file cannot abort the run.
fn collect_directory(
    cli: &Cli,
    directory: &Path,
    registry: &mut Registry,
    stats: &mut SummaryStats,
) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }
        if !is_likely_binary(path) {
            trace!("Skipping non-binary: {}", path.display());
            continue;
        }

        debug!("Processing binary: {}", path.display());
        if let Err(e) = collect_binary(cli, path, registry, stats) {
            warn!("Error processing {}: {}", path.display(), e);
        }
    }

    Ok(())
}

/// Scans one binary and registers everything it carries.
fn collect_binary(
    cli: &Cli,
    binary_path: &Path,
    registry: &mut Registry,
    stats: &mut SummaryStats,
) -> Result<()> {
    trace!("Reading {}", binary_path.display());
    let data = fs::read(binary_path)
        .with_context(|| format!("Failed to read input file: {}", binary_path.display()))?;
    trace!("Read {} bytes from {}", data.len(), binary_path.display());

    let config = ScannerConfig::new()
        .max_results(cli.max_descriptors)
        .skip_well_known(!cli.include_well_known)
        .require_proto_suffix(!cli.any_name);
    let report = Scanner::with_config(config)
        .scan(&data)
        .with_context(|| format!("Failed to scan binary: {}", binary_path.display()))?;

    stats.binaries_scanned += 1;
    if report.results.is_empty() {
        trace!("No descriptors found in {}", binary_path.display());
        return Ok(());
    }
    debug!(
        "Found {} descriptor(s) in {} ({} candidates rejected)",
        report.results.len(),
        binary_path.display(),
        report.candidates_rejected
    );

    for result in report.results {
        stats.descriptors_found += 1;
        let origin = Origin {
            source: binary_path.display().to_string(),
            offset: result.range.start,
            digest: short_digest(&result.data),
        };
        match registry.register(result.descriptor, origin) {
            RegisterOutcome::Inserted => {}
            RegisterOutcome::DuplicateIdentical => stats.duplicates_collapsed += 1,
            RegisterOutcome::DuplicateConflicting => stats.conflicts += 1,
        }
    }

    Ok(())
}

/// Renders every registered file in dependency order and writes it out.
fn emit(cli: &Cli, registry: &Registry, stats: &mut SummaryStats) -> Result<()> {
    let order = registry.ordered_files();

    for diagnostic in order.missing_imports.iter().chain(order.cycles.iter()) {
        match diagnostic {
            Diagnostic::MissingImport { file, import } => {
                warn!("{} imports {}, which was not recovered", file, import);
            }
            Diagnostic::ImportCycle { files } => {
                warn!("import cycle between: {}", files.join(", "));
            }
            Diagnostic::DuplicateConflict { .. } => {}
        }
    }

    for fd in order.files {
        if cli.list_only {
            println!("{}", fd.name);
            continue;
        }

        let rendered = render_file(fd, registry);
        stats.unresolved_references += rendered.unresolved.len();

        let Some(output_path) = safe_output_path(&cli.output, &rendered.path) else {
            warn!("Refusing unsafe output path: {}", rendered.path);
            continue;
        };

        if cli.dry_run {
            println!("Would write: {}", output_path.display());
            if cli.verbose > 0 {
                println!("---\n{}---", rendered.source);
            }
            continue;
        }

        match write_proto_file(&output_path, &rendered.source, cli.force) {
            Ok(()) => {
                println!("Wrote {}", output_path.display());
                stats.files_written += 1;
            }
            Err(e) => {
                error!("Failed to write {}: {}", output_path.display(), e);
            }
        }
    }

    Ok(())
}

/// Short content digest used for conflict renaming (first 8 hex chars of
/// blake3)
fn short_digest(data: &[u8]) -> String {
    blake3::hash(data).to_hex()[..8].to_string()
}

/// Joins a recovered descriptor name onto the output directory, rejecting
/// absolute paths and parent-directory components. Descriptor names come
/// from untrusted binaries and must not escape the output directory.
fn safe_output_path(output_dir: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    if relative.components().count() == 0 {
        return None;
    }
    for component in relative.components() {
        match component {
            Component::Normal(_) => {}
            _ => return None,
        }
    }
    Some(output_dir.join(relative))
}

/// Heuristic to determine if a file is likely a binary executable
fn is_likely_binary(path: &Path) -> bool {
    // Check by extension - skip obvious non-binaries
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let skip_extensions = [
            "txt", "md", "json", "yaml", "yml", "xml", "html", "css", "js", "ts", "py", "rb", "go",
            "rs", "c", "h", "cpp", "hpp", "java", "proto", "toml", "ini", "cfg", "conf", "log",
            "csv", "svg", "png", "jpg", "jpeg", "gif", "pdf", "zip", "tar", "gz", "bz2", "xz",
            "7z", "rar", "sh", "bash", "zsh", "fish", "ps1", "bat", "cmd",
        ];
        if skip_extensions.contains(&ext.to_lowercase().as_str()) {
            return false;
        }
    }

    // Check file size - skip very small files (< 1KB) and very large files (> 500MB)
    if let Ok(metadata) = fs::metadata(path) {
        let size = metadata.len();
        if size < 1024 || size > 500 * 1024 * 1024 {
            return false;
        }
    }

    // Try to read magic bytes to identify binary formats
    if let Ok(mut file) = fs::File::open(path) {
        use std::io::Read;
        let mut magic = [0u8; 4];
        if file.read_exact(&mut magic).is_ok() {
            // Mach-O (macOS)
            if magic == [0xCF, 0xFA, 0xED, 0xFE] // 64-bit
                || magic == [0xCE, 0xFA, 0xED, 0xFE] // 32-bit
                || magic == [0xFE, 0xED, 0xFA, 0xCF] // 64-bit reverse
                || magic == [0xFE, 0xED, 0xFA, 0xCE] // 32-bit reverse
                || magic == [0xCA, 0xFE, 0xBA, 0xBE]
            // Universal
            {
                return true;
            }
            // ELF (Linux)
            if magic[0..4] == [0x7F, b'E', b'L', b'F'] {
                return true;
            }
            // PE (Windows) - MZ header
            if magic[0..2] == [b'M', b'Z'] {
                return true;
            }
        }
    }

    // If we can't determine, try it anyway if it has no extension
    path.extension().is_none()
}

/// Write a proto file to disk, creating parent directories as needed
fn write_proto_file(output_path: &Path, content: &str, force: bool) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    let mut file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}
