//! spreadcrop CLI entry point

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spreadcrop::{
    Cli, OcrEngine, PageImagesConfig, PageImagesRunner, RunRequest, RunStatus, TesseractCli,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = PageImagesConfig::resolve(cli.config.as_deref())
        .context("failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    if cli.dump_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let (Some(in_dir), Some(out_dir)) = (cli.in_dir.clone(), cli.out_dir.clone()) else {
        anyhow::bail!("IN_DIR and OUT_DIR are required");
    };

    let request = RunRequest {
        in_dir,
        out_dir,
        overwrite: cli.overwrite,
        inplace: cli.inplace,
        dry_run: cli.dry_run,
        debug: cli.debug,
        manifest_path: cli.manifest.clone(),
        command: std::env::args().collect::<Vec<_>>().join(" "),
        jobs: cli.jobs,
    };

    let engine = build_engine(&cli, &config);
    let progress = build_progress(cli.quiet);

    let summary = PageImagesRunner::new(&config, &request)
        .with_engine(engine.as_ref().map(|e| e as &dyn OcrEngine))
        .with_progress(progress.clone())
        .run()
        .with_context(|| format!("failed to process {}", request.in_dir.display()));
    progress.finish_and_clear();
    let summary = summary?;

    let stats = &summary.stats;
    if !cli.quiet {
        if summary.status == RunStatus::NoMatches {
            println!(
                "No files matched '{}' in {}",
                config.glob,
                request.in_dir.display()
            );
        } else {
            println!(
                "Processed {} of {} files: {} split, {} crop-only, {} skipped{}",
                stats.processed,
                stats.files_found,
                stats.split_count,
                stats.crop_only_count,
                stats.skipped,
                if request.dry_run { " (dry run)" } else { "" }
            );
        }
    }
    if let Some(path) = &summary.manifest_path {
        info!(path = %path.display(), "manifest written");
    }
    Ok(())
}

fn build_engine(cli: &Cli, config: &PageImagesConfig) -> Option<TesseractCli> {
    if !config.page_numbers.enabled {
        return None;
    }
    let timeout = Duration::from_secs(config.page_numbers.timeout_secs);
    let engine = match &cli.tesseract {
        Some(path) => TesseractCli::from_path(path, timeout),
        None => TesseractCli::locate(timeout),
    };
    match (&engine, &cli.tesseract) {
        (Some(engine), _) => info!(path = %engine.executable().display(), "using tesseract"),
        (None, Some(path)) => warn!(
            path = %path.display(),
            "tesseract executable not found; page numbers will be reported as no_tesseract"
        ),
        (None, None) => {
            warn!("tesseract not found on PATH; page numbers will be reported as no_tesseract")
        }
    }
    engine
}

fn build_progress(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}
