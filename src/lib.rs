//! spreadcrop - scanned book page preparation
//!
//! Turns a folder of scanned images into clean single-page images:
//!
//! - Spread detection and gutter search
//! - Splitting into left/right pages
//! - Bright-region cropping with optional outer-margin clamping
//! - Left/right crop symmetry
//! - Printed page number OCR (Arabic and Roman numerals)
//! - A JSON manifest per run
//!
//! # Example
//!
//! ```no_run
//! use spreadcrop::{run_page_images, PageImagesConfig, RunRequest};
//!
//! let config = PageImagesConfig::default();
//! let request = RunRequest {
//!     in_dir: "scans".into(),
//!     out_dir: "pages".into(),
//!     ..Default::default()
//! };
//! let summary = run_page_images(&request, &config, None).unwrap();
//! println!("{} pages processed", summary.stats.processed);
//! ```

pub mod cli;
pub mod config;
pub mod crop;
pub mod geometry;
pub mod manifest;
pub mod outer_margin;
pub mod page_number;
pub mod pipeline;
pub mod spread;
pub mod symmetry;

// Re-export public API
pub use cli::Cli;
pub use config::{ConfigError, PageImagesConfig, RunMode};
pub use crop::{find_crop_bbox, CropOptions, CropResult, PageSide};
pub use geometry::{bright_bbox, dark_bbox, to_gray, BBox};
pub use manifest::{Manifest, ManifestError, ManifestRecorder, RunStatus};
pub use outer_margin::{
    detect_outer_black_bar_px, resolve_outer_clamp, Edge, OuterClampInfo, OuterMarginMode,
    OuterMarginOptions,
};
pub use page_number::{
    extract_printed_page_number, parse_roman_numeral, ExtractionResult, OcrEngine,
    PageNumberExtractor, PageNumberOptions, TesseractCli,
};
pub use pipeline::{
    analyze_image, process_image, run_page_images, ImageReport, ImageStatus, OutputPolicy,
    PageImagesRunner, PageLayout, PipelineError, RunRequest, RunStats, RunSummary,
};
pub use spread::{detect_gutter_x, detect_spread, split_spread_image, SpreadDecision, SpreadError};
pub use symmetry::{apply_split_symmetry_strategy, SplitGeometry, SymmetryOutcome, SymmetryStrategy};
