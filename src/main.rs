// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use markdown_to_enex::utils::logging::{
    format_error, format_note_issue, format_step, format_success, format_warning, init_logger,
};
use markdown_to_enex::{
    Config, ConversionOrchestrator, FileScanner, JsonExporter, NoteProcessor, RawNote,
    ResourceResolver, Validator,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

const DEFAULT_EXPORT_NAME: &str = "notes.enex";

#[derive(Parser)]
#[command(name = "md2enex")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Convert markdown notes and their attachments into an Evernote ENEX export", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every note under the source directory into one ENEX file
    Convert {
        #[arg(short, long, env = "MD2ENEX_SOURCE")]
        source: Option<PathBuf>,

        /// ENEX file to write; defaults to notes.enex in the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_name = "NUM")]
        workers: Option<usize>,

        #[arg(long)]
        no_progress: bool,

        #[arg(long)]
        no_report: bool,
    },

    /// Write the list of notes that would be converted as json
    Scan {
        #[arg(short, long, env = "MD2ENEX_SOURCE")]
        source: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Write the processed markdown, html and enml of a single note
    Preview {
        file: PathBuf,

        #[arg(short, long, default_value = "./preview")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger(cli.color, cli.verbose);

    info!("Markdown to ENEX converter");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Convert {
            source,
            output,
            workers,
            no_progress,
            no_report,
        } => {
            cmd_convert(config, source, output, workers, !no_progress && cli.color, !no_report).await?;
        }
        Commands::Scan {
            source,
            output,
            pretty,
        } => {
            cmd_scan(config, source, output, pretty).await?;
        }
        Commands::Preview { file, output } => {
            cmd_preview(&config, &file, &output)?;
        }
    }

    Ok(())
}

async fn cmd_convert(
    mut config: Config,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    workers: Option<usize>,
    show_progress: bool,
    write_report: bool,
) -> Result<()> {
    let start_time = Instant::now();

    if let Some(source) = source {
        config.source_directory = source;
    }
    if let Some(workers) = workers {
        config.pipeline.parallel_workers = workers;
    }

    let output_file = output.unwrap_or_else(|| config.output_directory.join(DEFAULT_EXPORT_NAME));
    if let Some(parent) = output_file.parent()
        && !parent.as_os_str().is_empty()
    {
        config.output_directory = parent.to_path_buf();
    }

    println!("{}", format_step(1, 2, "Converting notes"));
    let orchestrator = ConversionOrchestrator::new(config)
        .context("Invalid configuration")?
        .with_progress(show_progress, show_progress);
    let report = orchestrator
        .run(&output_file)
        .await
        .context("Conversion failed")?;

    if write_report {
        println!("{}", format_step(2, 2, "Writing report"));
        let path = orchestrator
            .write_report(&report)
            .context("Failed to write conversion report")?;
        info!("Report written to {}", path.display());
    }

    for note in report.notes.iter().filter(|n| !n.missing_images.is_empty()) {
        println!(
            "{}",
            format_note_issue(
                &note.relative_path,
                &format!("missing images: {}", note.missing_images.join(", "))
            )
        );
    }
    for failure in &report.failures {
        println!("{}", format_note_issue(&failure.relative_path, &failure.error));
    }

    match &report.output_file {
        Some(path) => println!(
            "{}",
            format_success(&format!(
                "{} notes written to {} in {:.2}s",
                report.stats.notes_converted,
                path.display(),
                start_time.elapsed().as_secs_f64()
            ))
        ),
        None => println!("{}", format_warning("No notes found to convert")),
    }

    if report.stats.notes_failed > 0 {
        println!(
            "{}",
            format_error(&format!("{} notes failed", report.stats.notes_failed))
        );
    }

    Ok(())
}

async fn cmd_scan(
    config: Config,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<()> {
    let source = source.unwrap_or_else(|| config.source_directory.clone());
    Validator::validate_directory(&source).context("Invalid source directory")?;

    let scanner = FileScanner::new(config.pipeline.clone());
    let scan_root = source.clone();
    let files = tokio::task::spawn_blocking(move || scanner.scan_directory(&scan_root))
        .await
        .context("Scanning task failed")?
        .context("Failed to scan directory")?;

    for file in &files {
        info!(
            "{} ({} bytes)",
            Validator::truncate_text(&file.relative_path, 80),
            file.size
        );
    }

    let exporter = JsonExporter::new(output.unwrap_or_else(|| config.output_directory.clone()))
        .context("Failed to create output directory")?;
    let count = files.len();
    let path = exporter
        .export_manifest(files, &source, pretty)
        .context("Failed to write scan manifest")?;

    println!(
        "{}",
        format_success(&format!("{} notes listed in {}", count, path.display()))
    );
    Ok(())
}

fn cmd_preview(config: &Config, file: &Path, output: &Path) -> Result<()> {
    Validator::validate_markdown_extension(file).context("Cannot preview this file")?;

    let source_dir = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let relative = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let raw = RawNote::read(file, &relative).context("Failed to read note")?;
    let stem = raw.file_stem();

    let processor = NoteProcessor::new(config);
    let resolver = ResourceResolver::new(
        source_dir,
        config.resources_directory.clone(),
        config.resource_options.clone(),
    );

    let prepared = processor.prepare(raw, None);
    let resources = resolver
        .resolve_all(prepared.resource_refs())
        .context("Failed to resolve resources")?;
    let converted = processor.finish(&prepared, &resources);

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let artifacts = [
        ("md", prepared.markdown.as_str()),
        ("html", prepared.html.as_str()),
        ("enml", converted.note.content.as_str()),
    ];
    for (extension, body) in artifacts {
        let path = output.join(format!("{}.{}", stem, extension));
        fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    println!("{}", format_success(&format!("Preview of \"{}\"", converted.note.title)));
    println!(
        "  resources: {}, missing images: {}",
        converted.note.resources.len(),
        converted.missing_images.len()
    );
    for missing in &converted.missing_images {
        println!("{}", format_note_issue(&relative, &format!("image not found: {}", missing)));
    }

    Ok(())
}
