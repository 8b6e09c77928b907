//! Page-images pipeline
//!
//! Per image: decide split vs. crop-only, split at the gutter, crop each page,
//! reconcile the pair, write the pages and optionally read their printed page
//! numbers. The folder driver runs that over a directory on a rayon pool and
//! records every decision in the manifest.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PageImagesConfig, RunMode};
use crate::crop::{find_crop_bbox, CropResult, PageSide};
use crate::geometry::{to_gray, BBox};
use crate::manifest::{ManifestError, ManifestRecorder, RunStatus};
use crate::outer_margin::{Edge, OuterClampInfo, OuterMarginMode};
use crate::page_number::{ExtractionResult, OcrEngine, PageNumberExtractor};
use crate::spread::{detect_gutter_x, split_spread_image, SpreadDecision, SpreadError};
use crate::symmetry::{apply_split_symmetry_strategy, SplitGeometry};

/// Note: split requested for an image that is not a spread
pub const NOTE_FORCED_SPLIT: &str = "Forced split because mode=split.";
/// Note: crop-only requested for a spread
pub const NOTE_FORCED_CROP: &str = "Forced crop-only because mode=crop.";
/// Note: image narrower than two pixels
pub const NOTE_TOO_NARROW: &str = "Image too narrow to split; used crop-only.";
/// Note: gutter candidate rejected
pub const NOTE_GUTTER_FALLBACK: &str = "Gutter candidate near edge; fell back to center.";
/// Note: outputs exist and overwrite is off
pub const NOTE_OUTPUT_EXISTS: &str = "One or more outputs already exist.";

/// Directory under the output directory holding debug overlays
pub const DEBUG_DIR_NAME: &str = "_debug";
/// Directory under the debug directory holding OCR input crops
pub const PAGE_NUMBER_DEBUG_DIR_NAME: &str = "page_numbers";
/// Default manifest file name inside the output directory
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

const GUTTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const CROP_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Pipeline errors; all of them abort the run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spread(#[from] SpreadError),

    #[error("Input directory not found: {0}")]
    InputDirNotFound(PathBuf),

    #[error("Output path exists and is not a directory: {0}")]
    OutputNotDirectory(PathBuf),

    #[error("Output directory is the same as input. Use --inplace to allow this.")]
    SameDirWithoutInplace,

    #[error("In-place page-images processing overwrites files. Use --overwrite to proceed.")]
    InplaceWithoutOverwrite,

    #[error("Failed to read image {path}: {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write output for {path}: {source}")]
    WriteImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

// ============================================================
// Per-image layout
// ============================================================

/// How an image was processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeUsed {
    Split,
    Crop,
}

/// Split-or-crop decision, made before any pixel work
#[derive(Debug, Clone, PartialEq)]
pub struct ModePlan {
    pub mode_used: ModeUsed,
    pub detected_spread: bool,
    pub aspect_ratio: f64,
    pub notes: Vec<String>,
}

impl ModePlan {
    pub fn for_size(width: u32, height: u32, config: &PageImagesConfig) -> Self {
        let decision = SpreadDecision::classify(width, height, config.split_ratio);
        let mut notes = Vec::new();

        let mut split = match config.mode {
            RunMode::Auto => decision.is_spread,
            RunMode::Split => {
                if !decision.is_spread {
                    notes.push(NOTE_FORCED_SPLIT.to_string());
                }
                true
            }
            RunMode::Crop => {
                if decision.is_spread {
                    notes.push(NOTE_FORCED_CROP.to_string());
                }
                false
            }
        };
        if split && width < 2 {
            split = false;
            notes.push(NOTE_TOO_NARROW.to_string());
        }

        Self {
            mode_used: if split { ModeUsed::Split } else { ModeUsed::Crop },
            detected_spread: decision.is_spread,
            aspect_ratio: decision.aspect_ratio,
            notes,
        }
    }
}

/// One final page cut from a source image
#[derive(Debug, Clone)]
pub struct LaidOutPage {
    pub side: PageSide,
    /// Final cropped page
    pub image: DynamicImage,
    /// Crop box in the coordinates of the (half) image it was taken from
    pub bbox: BBox,
    pub crop: CropResult,
}

/// Everything decided about one source image
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub plan: ModePlan,
    pub gutter_x: Option<u32>,
    /// Spread column where the right half starts
    pub right_offset_x: Option<u32>,
    pub pages: Vec<LaidOutPage>,
    pub bbox_delta_width: Option<u32>,
    pub notes: Vec<String>,
}

impl PageLayout {
    fn page(&self, side: PageSide) -> Option<&LaidOutPage> {
        self.pages.iter().find(|page| page.side == side)
    }
}

/// Decide and compute the split/crop layout of an image.
pub fn analyze_image(image: &DynamicImage, config: &PageImagesConfig) -> Result<PageLayout> {
    let plan = ModePlan::for_size(image.width(), image.height(), config);
    layout_with_plan(image, config, plan)
}

fn layout_with_plan(
    image: &DynamicImage,
    config: &PageImagesConfig,
    plan: ModePlan,
) -> Result<PageLayout> {
    match plan.mode_used {
        ModeUsed::Split => split_layout(image, config, plan),
        ModeUsed::Crop => Ok(crop_layout(image, config, plan)),
    }
}

fn split_layout(image: &DynamicImage, config: &PageImagesConfig, plan: ModePlan) -> Result<PageLayout> {
    let mut notes = plan.notes.clone();

    let gray = to_gray(image);
    let gutter = detect_gutter_x(&gray, config.gutter_search_frac, config.x_step, config.y_step);
    if gutter.fell_back_to_center {
        notes.push(NOTE_GUTTER_FALLBACK.to_string());
    }

    let (left_half, right_half) = split_spread_image(image, gutter.gutter_x, config.gutter_trim_px)?;
    let crop_options = config.crop_options(true);
    let left_crop = find_crop_bbox(&to_gray(&left_half), &crop_options, PageSide::Left);
    let right_crop = find_crop_bbox(&to_gray(&right_half), &crop_options, PageSide::Right);
    notes.extend(left_crop.note.iter().map(|note| format!("left: {note}")));
    notes.extend(right_crop.note.iter().map(|note| format!("right: {note}")));

    let right_offset_x = image.width() - right_half.width();
    let geometry = SplitGeometry {
        left_width: left_half.width(),
        right_width: right_half.width(),
        gutter_x: gutter.gutter_x,
        right_offset_x,
        left_clamp_px: left_crop.clamp_px(Edge::Left),
        right_clamp_px: right_crop.clamp_px(Edge::Right),
    };
    let outcome = apply_split_symmetry_strategy(
        left_crop.bbox,
        right_crop.bbox,
        &geometry,
        config.symmetry_strategy,
    );
    notes.extend(outcome.note.clone());

    let bbox_delta_width = outcome.left.width().abs_diff(outcome.right.width());
    for clamp in left_crop.outer_clamps.iter().chain(&right_crop.outer_clamps) {
        debug!(
            edge = ?clamp.edge,
            mode = clamp.mode.as_str(),
            detected_bar_px = clamp.detected_bar_px,
            applied_clamp_px = clamp.applied_clamp_px,
            "outer clamp"
        );
    }
    debug!(
        gutter_x = gutter.gutter_x,
        bbox_delta_width,
        left_width = outcome.left.width(),
        right_width = outcome.right.width(),
        strategy = config.symmetry_strategy.as_str(),
        "split layout"
    );

    let pages = vec![
        LaidOutPage {
            side: PageSide::Left,
            image: outcome.left.crop(&left_half),
            bbox: outcome.left,
            crop: left_crop,
        },
        LaidOutPage {
            side: PageSide::Right,
            image: outcome.right.crop(&right_half),
            bbox: outcome.right,
            crop: right_crop,
        },
    ];

    Ok(PageLayout {
        plan,
        gutter_x: Some(gutter.gutter_x),
        right_offset_x: Some(right_offset_x),
        pages,
        bbox_delta_width: Some(bbox_delta_width),
        notes,
    })
}

fn crop_layout(image: &DynamicImage, config: &PageImagesConfig, plan: ModePlan) -> PageLayout {
    let mut notes = plan.notes.clone();
    let crop = find_crop_bbox(&to_gray(image), &config.crop_options(false), PageSide::Single);
    notes.extend(crop.note.clone());

    PageLayout {
        plan,
        gutter_x: None,
        right_offset_x: None,
        pages: vec![LaidOutPage {
            side: PageSide::Single,
            image: crop.bbox.crop(image),
            bbox: crop.bbox,
            crop,
        }],
        bbox_delta_width: None,
        notes,
    }
}

/// Source image with the gutter (red) and crop boxes (green) drawn on it.
pub fn draw_debug_overlay(image: &DynamicImage, layout: &PageLayout) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();

    if let Some(gutter_x) = layout.gutter_x {
        let bottom = height.saturating_sub(1) as f32;
        for dx in 0..2u32 {
            let x = (gutter_x + dx).min(width.saturating_sub(1)) as f32;
            draw_line_segment_mut(&mut canvas, (x, 0.0), (x, bottom), GUTTER_COLOR);
        }
    }

    for page in &layout.pages {
        let bbox = match page.side {
            PageSide::Right => page.bbox.offset_x(layout.right_offset_x.unwrap_or(0)),
            PageSide::Left | PageSide::Single => page.bbox,
        };
        draw_box(&mut canvas, bbox);
    }
    canvas
}

/// Two-pixel hollow rectangle
fn draw_box(canvas: &mut RgbImage, bbox: BBox) {
    if !bbox.is_valid() {
        return;
    }
    let outer = Rect::at(bbox.left as i32, bbox.top as i32).of_size(bbox.width(), bbox.height());
    draw_hollow_rect_mut(canvas, outer, CROP_COLOR);
    if bbox.width() > 2 && bbox.height() > 2 {
        let inner = Rect::at(bbox.left as i32 + 1, bbox.top as i32 + 1)
            .of_size(bbox.width() - 2, bbox.height() - 2);
        draw_hollow_rect_mut(canvas, inner, CROP_COLOR);
    }
}

// ============================================================
// Reports
// ============================================================

/// What happened to one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageStatus {
    #[serde(rename = "written")]
    Written,
    #[serde(rename = "dry-run")]
    DryRun,
    #[serde(rename = "skipped")]
    Skipped,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Written => "written",
            ImageStatus::DryRun => "dry-run",
            ImageStatus::Skipped => "skipped",
        }
    }
}

/// One output page in a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    pub side: PageSide,
    pub output: PathBuf,
    pub bbox: BBox,
    pub used_fallback: bool,
    pub outer_clamps: Vec<OuterClampInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<ExtractionResult>,
}

/// Decision record for one input image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReport {
    #[serde(skip)]
    pub status: ImageStatus,
    pub input: PathBuf,
    pub outputs: Vec<PathBuf>,
    pub mode_used: ModeUsed,
    pub detected_spread: bool,
    pub aspect_ratio: f64,
    pub outer_clamp_mode: OuterMarginMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gutter_x: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_bbox: Option<BBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_bbox: Option<BBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_bbox: Option<BBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox_delta_width: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageReport>,
    pub notes: Vec<String>,
}

impl ImageReport {
    fn skipped(input: &Path, outputs: Vec<PathBuf>, plan: ModePlan, outer_mode: OuterMarginMode) -> Self {
        let mut notes = plan.notes;
        notes.push(NOTE_OUTPUT_EXISTS.to_string());
        Self {
            status: ImageStatus::Skipped,
            input: input.to_path_buf(),
            outputs,
            mode_used: plan.mode_used,
            detected_spread: plan.detected_spread,
            aspect_ratio: plan.aspect_ratio,
            outer_clamp_mode: outer_mode,
            gutter_x: None,
            left_bbox: None,
            right_bbox: None,
            crop_bbox: None,
            bbox_delta_width: None,
            pages: Vec::new(),
            notes,
        }
    }
}

/// Per-run counters, folded from image reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub files_found: usize,
    pub processed: usize,
    pub split_count: usize,
    pub crop_only_count: usize,
    pub skipped: usize,
}

impl RunStats {
    /// Count one report
    pub fn record(&mut self, report: &ImageReport) {
        if report.status == ImageStatus::Skipped {
            self.skipped += 1;
            return;
        }
        self.processed += 1;
        match report.mode_used {
            ModeUsed::Split => self.split_count += 1,
            ModeUsed::Crop => self.crop_only_count += 1,
        }
    }

    pub fn from_reports<'a>(files_found: usize, reports: impl IntoIterator<Item = &'a ImageReport>) -> Self {
        reports.into_iter().fold(
            Self {
                files_found,
                ..Default::default()
            },
            |mut stats, report| {
                stats.record(report);
                stats
            },
        )
    }
}

// ============================================================
// Per-image processing
// ============================================================

/// Output-side switches for one image
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputPolicy {
    pub overwrite: bool,
    pub dry_run: bool,
    pub debug: bool,
}

/// `<stem>_L<ext>` / `<stem>_R<ext>` for splits, the input name otherwise
pub fn output_paths(input: &Path, out_dir: &Path, mode_used: ModeUsed) -> Vec<PathBuf> {
    let name = input.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    match mode_used {
        ModeUsed::Crop => vec![out_dir.join(name)],
        ModeUsed::Split => {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let ext = input
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            vec![
                out_dir.join(format!("{stem}_L{ext}")),
                out_dir.join(format!("{stem}_R{ext}")),
            ]
        }
    }
}

/// Process one image file into `out_dir`.
pub fn process_image(
    input: &Path,
    out_dir: &Path,
    config: &PageImagesConfig,
    policy: OutputPolicy,
    engine: Option<&dyn OcrEngine>,
) -> Result<ImageReport> {
    let image = image::open(input).map_err(|source| PipelineError::ReadImage {
        path: input.to_path_buf(),
        source,
    })?;
    let (width, height) = image.dimensions();
    let plan = ModePlan::for_size(width, height, config);
    let outputs = output_paths(input, out_dir, plan.mode_used);
    let outer_mode = match plan.mode_used {
        ModeUsed::Split => config.crop_options(true).outer.mode,
        ModeUsed::Crop => config.crop_options(false).outer.mode,
    };

    if !policy.overwrite && outputs.iter().any(|path| path.exists()) {
        info!(input = %input.display(), "skipping existing output(s)");
        return Ok(ImageReport::skipped(input, outputs, plan, outer_mode));
    }

    let layout = layout_with_plan(&image, config, plan)?;

    if policy.dry_run {
        info!(input = %input.display(), mode = ?layout.plan.mode_used, "[dry-run] would process");
    } else {
        for (page, path) in layout.pages.iter().zip(&outputs) {
            page.image.save(path).map_err(|source| PipelineError::WriteImage {
                path: path.clone(),
                source,
            })?;
        }
        info!(
            input = %input.display(),
            mode = ?layout.plan.mode_used,
            outputs = outputs.len(),
            "processed"
        );
    }

    if policy.debug {
        write_debug_overlay(input, out_dir, &image, &layout, policy)?;
    }

    let page_numbers: Vec<Option<ExtractionResult>> = if config.page_numbers.enabled {
        let mut extractor = PageNumberExtractor::new(&config.page_numbers, engine);
        if config.page_numbers.debug_crops && !policy.dry_run {
            extractor = extractor.with_debug_dir(
                out_dir.join(DEBUG_DIR_NAME).join(PAGE_NUMBER_DEBUG_DIR_NAME),
            );
        }
        layout
            .pages
            .iter()
            .zip(&outputs)
            .map(|(page, path)| {
                let label = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Some(extractor.extract(&page.image, &label))
            })
            .collect()
    } else {
        vec![None; layout.pages.len()]
    };

    let pages: Vec<PageReport> = layout
        .pages
        .iter()
        .zip(&outputs)
        .zip(page_numbers)
        .map(|((page, output), page_number)| PageReport {
            side: page.side,
            output: output.clone(),
            bbox: page.bbox,
            used_fallback: page.crop.used_fallback,
            outer_clamps: page.crop.outer_clamps.clone(),
            page_number,
        })
        .collect();

    let split = layout.plan.mode_used == ModeUsed::Split;
    Ok(ImageReport {
        status: if policy.dry_run {
            ImageStatus::DryRun
        } else {
            ImageStatus::Written
        },
        input: input.to_path_buf(),
        outputs,
        mode_used: layout.plan.mode_used,
        detected_spread: layout.plan.detected_spread,
        aspect_ratio: layout.plan.aspect_ratio,
        outer_clamp_mode: outer_mode,
        gutter_x: layout.gutter_x,
        left_bbox: layout.page(PageSide::Left).map(|p| p.bbox),
        right_bbox: layout.page(PageSide::Right).map(|p| p.bbox),
        crop_bbox: if split {
            None
        } else {
            layout.page(PageSide::Single).map(|p| p.bbox)
        },
        bbox_delta_width: layout.bbox_delta_width,
        pages,
        notes: layout.notes,
    })
}

fn write_debug_overlay(
    input: &Path,
    out_dir: &Path,
    image: &DynamicImage,
    layout: &PageLayout,
    policy: OutputPolicy,
) -> Result<()> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path = out_dir.join(DEBUG_DIR_NAME).join(format!("{stem}_debug.png"));

    if policy.dry_run {
        info!(path = %path.display(), "[dry-run] would write debug image");
        return Ok(());
    }
    if path.exists() && !policy.overwrite {
        info!(path = %path.display(), "skipping existing debug image");
        return Ok(());
    }
    draw_debug_overlay(image, layout)
        .save(&path)
        .map_err(|source| PipelineError::WriteImage { path, source })
}

// ============================================================
// Folder driver
// ============================================================

/// Folder run parameters
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub in_dir: PathBuf,
    pub out_dir: PathBuf,
    pub overwrite: bool,
    /// Allow `out_dir == in_dir`
    pub inplace: bool,
    pub dry_run: bool,
    pub debug: bool,
    /// Defaults to `<out_dir>/manifest.json`
    pub manifest_path: Option<PathBuf>,
    /// Command line recorded in the manifest
    pub command: String,
    /// Worker threads; defaults to the number of CPUs
    pub jobs: Option<usize>,
}

impl RunRequest {
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| self.out_dir.join(MANIFEST_FILE_NAME))
    }

    fn policy(&self) -> OutputPolicy {
        OutputPolicy {
            overwrite: self.overwrite,
            dry_run: self.dry_run,
            debug: self.debug,
        }
    }
}

/// Result of a folder run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: RunStats,
    pub status: RunStatus,
    pub reports: Vec<ImageReport>,
    /// Manifest location, `None` on dry runs
    pub manifest_path: Option<PathBuf>,
}

/// Folder runner with optional OCR engine and progress bar
pub struct PageImagesRunner<'a> {
    config: &'a PageImagesConfig,
    request: &'a RunRequest,
    engine: Option<&'a dyn OcrEngine>,
    progress: Option<ProgressBar>,
}

impl<'a> PageImagesRunner<'a> {
    pub fn new(config: &'a PageImagesConfig, request: &'a RunRequest) -> Self {
        Self {
            config,
            request,
            engine: None,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: Option<&'a dyn OcrEngine>) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the folder; the manifest is written even when the run fails.
    pub fn run(&self) -> Result<RunSummary> {
        let request = self.request;
        let mut recorder = ManifestRecorder::new(self.config, request);

        let outcome = self.run_inner(&mut recorder);
        let (stats, status, reports, error) = match outcome {
            Ok((stats, status, reports)) => (stats, status, reports, None),
            Err((stats, err)) => (stats, RunStatus::Error, Vec::new(), Some(err)),
        };

        let manifest_path = request.manifest_path();
        let written = if request.dry_run {
            info!(path = %manifest_path.display(), "[dry-run] would write manifest");
            None
        } else {
            let message = error.as_ref().map(|e| e.to_string());
            match recorder.write(&manifest_path, stats, status, message) {
                Ok(()) => Some(manifest_path),
                Err(e) if error.is_some() => {
                    warn!(error = %e, "failed to write manifest after run error");
                    None
                }
                Err(e) => return Err(e.into()),
            }
        };

        if let Some(err) = error {
            return Err(err);
        }
        Ok(RunSummary {
            stats,
            status,
            reports,
            manifest_path: written,
        })
    }

    #[allow(clippy::type_complexity)]
    fn run_inner(
        &self,
        recorder: &mut ManifestRecorder,
    ) -> std::result::Result<(RunStats, RunStatus, Vec<ImageReport>), (RunStats, PipelineError)> {
        let fail = |stats: RunStats, recorder: &mut ManifestRecorder, err: PipelineError| {
            recorder.add_error(&err.to_string());
            (stats, err)
        };
        let request = self.request;
        let mut stats = RunStats::default();

        if let Err(e) = self.check_dirs() {
            return Err(fail(stats, recorder, e));
        }
        if let Err(e) = self.config.validate() {
            return Err(fail(stats, recorder, e.into()));
        }

        let files = match collect_image_files(&request.in_dir, &self.config.glob) {
            Ok(files) => files,
            Err(e) => return Err(fail(stats, recorder, e)),
        };
        stats.files_found = files.len();
        recorder.set_files_found(files.len());

        if files.is_empty() {
            info!(
                glob = %self.config.glob,
                in_dir = %request.in_dir.display(),
                "no files matched"
            );
            return Ok((stats, RunStatus::NoMatches, Vec::new()));
        }
        info!(
            count = files.len(),
            mode = self.config.mode.as_str(),
            "processing images"
        );

        if !request.dry_run {
            let mut dirs = vec![request.out_dir.clone()];
            if request.debug {
                dirs.push(request.out_dir.join(DEBUG_DIR_NAME));
            }
            for dir in dirs {
                if let Err(source) = std::fs::create_dir_all(&dir) {
                    return Err(fail(stats, recorder, PipelineError::Io { path: dir, source }));
                }
            }
        }

        let jobs = request.jobs.unwrap_or_else(num_cpus::get).max(1);
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool,
            Err(e) => return Err(fail(stats, recorder, e.into())),
        };
        if let Some(bar) = &self.progress {
            bar.set_length(files.len() as u64);
        }

        let policy = request.policy();
        // Once an image fails, images not yet started are left alone.
        let aborted = AtomicBool::new(false);
        let results: Vec<Option<Result<ImageReport>>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    if aborted.load(Ordering::Relaxed) {
                        return None;
                    }
                    let result = process_image(path, &request.out_dir, self.config, policy, self.engine);
                    if result.is_err() {
                        aborted.store(true, Ordering::Relaxed);
                    }
                    if let Some(bar) = &self.progress {
                        bar.inc(1);
                    }
                    Some(result)
                })
                .collect()
        });

        // Every finished image is recorded, even those after the failing one,
        // so the manifest accounts for all outputs on disk.
        let mut reports = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results.into_iter().flatten() {
            match result {
                Ok(report) => {
                    stats.record(&report);
                    recorder.add_report(&report);
                    reports.push(report);
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        warn!(error = %e, "additional image failure");
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(fail(stats, recorder, e));
        }
        Ok((stats, RunStatus::Ok, reports))
    }

    fn check_dirs(&self) -> Result<()> {
        let request = self.request;
        if !request.in_dir.is_dir() {
            return Err(PipelineError::InputDirNotFound(request.in_dir.clone()));
        }
        if request.out_dir.exists() && !request.out_dir.is_dir() {
            return Err(PipelineError::OutputNotDirectory(request.out_dir.clone()));
        }
        if request.out_dir.exists() && same_dir(&request.in_dir, &request.out_dir)? {
            if !request.inplace {
                return Err(PipelineError::SameDirWithoutInplace);
            }
            if !request.overwrite {
                return Err(PipelineError::InplaceWithoutOverwrite);
            }
        }
        Ok(())
    }
}

/// Run the pipeline over a folder without a progress bar.
pub fn run_page_images(
    request: &RunRequest,
    config: &PageImagesConfig,
    engine: Option<&dyn OcrEngine>,
) -> Result<RunSummary> {
    PageImagesRunner::new(config, request).with_engine(engine).run()
}

fn same_dir(a: &Path, b: &Path) -> Result<bool> {
    let canonical = |path: &Path| {
        path.canonicalize().map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    Ok(canonical(a)? == canonical(b)?)
}

/// Regular files in `in_dir` whose name matches `pattern`, sorted.
pub fn collect_image_files(in_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob::Pattern::new(pattern)
        .map_err(|e| ConfigError::Invalid(format!("glob is not a valid pattern: {e}")))?;
    let entries = std::fs::read_dir(in_dir).map_err(|source| PipelineError::Io {
        path: in_dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PipelineError::Io {
            path: in_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && matcher.matches(&entry.file_name().to_string_lossy()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
