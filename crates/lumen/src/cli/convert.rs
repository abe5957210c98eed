//! The `lumen convert` command: batch transcoding with progress tracking,
//! optional failed-only retry, and artifact write-out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, ValueEnum};
use walkdir::WalkDir;

use lumen_core::{
    BatchCoordinator, BatchInput, BatchStats, Config, ImageRsEncoder, ItemSnapshot, ItemStatus,
    OutputFormat,
};

/// Arguments for the `convert` command.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Image files or directories to convert
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Target output format (falls back automatically when unsupported)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Quality for lossy formats, 0.0-1.0
    #[arg(short, long)]
    pub quality: Option<f32>,

    /// Maximum simultaneously in-flight conversions
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Directory where converted images are written
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Rerun failed items once after the first pass
    #[arg(long)]
    pub retry_failed: bool,

    /// Print per-item results as JSON to stdout
    #[arg(long)]
    pub json: bool,
}

/// CLI-facing output format selector.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FormatArg {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Webp => OutputFormat::WebP,
            FormatArg::Avif => OutputFormat::Avif,
        }
    }
}

/// Execute the convert command.
pub async fn execute(args: ConvertArgs, config: Config) -> anyhow::Result<()> {
    let format = args
        .format
        .map(OutputFormat::from)
        .unwrap_or(config.encoding.format);
    let quality = args.quality.unwrap_or(config.encoding.quality);
    anyhow::ensure!(
        (0.0..=1.0).contains(&quality),
        "quality must be between 0.0 and 1.0 (got {quality})"
    );
    let concurrency = args
        .concurrency
        .unwrap_or(config.processing.concurrency)
        .max(1);
    let out_dir = args.out.clone().unwrap_or_else(|| config.output_dir());

    // Expand directories into files and load everything up front.
    let files = discover_inputs(&args.inputs, &config.processing.supported_inputs);
    anyhow::ensure!(!files.is_empty(), "no image files found in the given inputs");
    tracing::info!(count = files.len(), %format, quality, "starting conversion");

    let mut inputs = Vec::with_capacity(files.len());
    for path in &files {
        match std::fs::read(path) {
            Ok(bytes) => inputs.push(BatchInput {
                file_name: file_name_of(path),
                bytes,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
            }
        }
    }

    let encoder = Arc::new(ImageRsEncoder::new(config.limits.clone()));
    let mut coordinator = BatchCoordinator::new(encoder, concurrency);

    let progress = create_progress_bar(inputs.len() as u64);
    let progress_hook = progress.clone();
    let start_time = Instant::now();
    coordinator.on_progress(Arc::new(move |done, _total| {
        progress_hook.set_position(done as u64);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            progress_hook.set_message(format!("{:.1} img/sec", done as f64 / elapsed));
        }
    }));

    let outcome = coordinator.submit(inputs, format, quality).await;
    let mut stats = match outcome.stats() {
        Some(stats) => stats.clone(),
        None => anyhow::bail!("another batch operation is already running"),
    };

    // Optional second pass over failed items only.
    if args.retry_failed && coordinator.failed_count().await > 0 {
        tracing::info!(
            failed = coordinator.failed_count().await,
            "retrying failed items"
        );
        if let Some(retry_stats) = coordinator
            .reprocess_failed(format, quality)
            .await
            .stats()
        {
            stats.succeeded += retry_stats.succeeded;
            stats.failed = retry_stats.failed;
            stats.fallbacks += retry_stats.fallbacks;
        }
    }

    progress.finish_and_clear();

    // Write artifacts with their derived names.
    let pairs = coordinator.export_pairs().await;
    if !pairs.is_empty() {
        std::fs::create_dir_all(&out_dir)?;
        for pair in &pairs {
            let target = out_dir.join(&pair.filename);
            std::fs::write(&target, pair.bytes.as_slice())?;
            tracing::debug!(target = %target.display(), bytes = pair.bytes.len(), "wrote artifact");
        }
    }

    let snapshots = coordinator.snapshots().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    print_notices(&snapshots);
    print_summary(&stats, &out_dir, start_time.elapsed());
    Ok(())
}

/// Expand file and directory arguments into a sorted file list.
fn discover_inputs(inputs: &[PathBuf], supported: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            // Explicitly-named files are accepted regardless of extension;
            // the decoder has the final word.
            files.push(input.clone());
            continue;
        }
        for entry in WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && has_supported_extension(path, supported) {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn has_supported_extension(path: &Path, supported: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            supported.iter().any(|s| s.to_lowercase() == ext)
        })
        .unwrap_or(false)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

/// Create a progress bar for batch processing.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap()
            .progress_chars("##-"),
    );
    pb.set_message("starting...");
    pb
}

/// Print per-item fallback and failure notices.
fn print_notices(snapshots: &[ItemSnapshot]) {
    for snapshot in snapshots {
        if let Some(fallback) = &snapshot.fallback {
            eprintln!(
                "  {} {}: {}",
                console::style("fallback").yellow().bold(),
                snapshot.file_name,
                fallback.reason
            );
        }
        if snapshot.status == ItemStatus::Failed {
            eprintln!(
                "  {} {}: {}",
                console::style("failed").red().bold(),
                snapshot.file_name,
                snapshot.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

/// Print a formatted summary table after batch processing.
fn print_summary(stats: &BatchStats, out_dir: &Path, elapsed: std::time::Duration) {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        stats.succeeded as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", stats.succeeded);
    if stats.failed > 0 {
        eprintln!("    Failed:       {:>8}", stats.failed);
    }
    if stats.fallbacks > 0 {
        eprintln!("    Fallbacks:    {:>8}", stats.fallbacks);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", stats.succeeded + stats.failed);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("    Output:       {}", out_dir.display());
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported() -> Vec<String> {
        vec!["jpg".to_string(), "png".to_string()]
    }

    #[test]
    fn test_has_supported_extension() {
        let supported = supported();
        assert!(has_supported_extension(Path::new("a.png"), &supported));
        assert!(has_supported_extension(Path::new("a.PNG"), &supported));
        assert!(!has_supported_extension(Path::new("a.txt"), &supported));
        assert!(!has_supported_extension(Path::new("noext"), &supported));
    }

    #[test]
    fn test_discover_inputs_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let files = discover_inputs(&[dir.path().to_path_buf()], &supported());
        let names: Vec<String> = files.iter().map(|p| file_name_of(p)).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn test_discover_inputs_accepts_named_files_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join("picture.heic");
        std::fs::write(&odd, b"x").unwrap();

        // Extension filter applies to directory walks, not explicit files.
        let files = discover_inputs(&[odd.clone()], &supported());
        assert_eq!(files, vec![odd]);
    }

    #[test]
    fn test_format_arg_mapping() {
        assert_eq!(OutputFormat::from(FormatArg::Webp), OutputFormat::WebP);
        assert_eq!(OutputFormat::from(FormatArg::Jpeg), OutputFormat::Jpeg);
    }
}
