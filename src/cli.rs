//! CLI argument definitions
//!
//! Every tuning flag is optional; a flag given on the command line overrides
//! the same key from the config file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{PageImagesConfig, RunMode};
use crate::outer_margin::OuterMarginMode;
use crate::page_number::{Anchor, ParserMode, Position};
use crate::symmetry::SymmetryStrategy;

/// Split scanned book spreads into pages, crop them, and read page numbers
#[derive(Parser, Debug)]
#[command(name = "spreadcrop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory containing page images
    #[arg(required_unless_present = "dump_config")]
    pub in_dir: Option<PathBuf>,

    /// Directory for the processed pages
    #[arg(required_unless_present = "dump_config")]
    pub out_dir: Option<PathBuf>,

    /// TOML config file (default: <config dir>/spreadcrop/config.toml if present)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub dump_config: bool,

    /// File name pattern inside the input directory
    #[arg(long)]
    pub glob: Option<String>,

    /// Split policy
    #[arg(long, value_enum)]
    pub mode: Option<RunMode>,

    /// Minimum width/height ratio treated as a spread
    #[arg(long)]
    pub split_ratio: Option<f64>,

    /// Gutter search window (fraction of width)
    #[arg(long)]
    pub gutter_search_frac: Option<f64>,

    /// Pixels dropped on each side of the gutter
    #[arg(long)]
    pub gutter_trim_px: Option<u32>,

    /// Outer-margin clamp mode
    #[arg(long, value_enum)]
    pub outer_margin_mode: Option<OuterMarginMode>,

    /// Fixed clamp width (fraction of page width)
    #[arg(long)]
    pub outer_margin_frac: Option<f64>,

    /// Auto clamp cap (fraction of page width)
    #[arg(long)]
    pub outer_margin_auto_max_frac: Option<f64>,

    /// Auto bar search window (fraction of page width)
    #[arg(long)]
    pub outer_margin_auto_search_frac: Option<f64>,

    /// Pixels below this value count as dark for bar detection
    #[arg(long)]
    pub outer_margin_dark_threshold: Option<u8>,

    /// Column dark fraction that starts a bar
    #[arg(long)]
    pub outer_margin_dark_frac_cutoff: Option<f64>,

    /// Column dark fraction that releases a bar
    #[arg(long)]
    pub outer_margin_release_frac: Option<f64>,

    /// Consecutive release columns that end a bar
    #[arg(long)]
    pub outer_margin_min_run_px: Option<u32>,

    /// Extra pixels clamped past a detected bar
    #[arg(long)]
    pub outer_margin_pad_px: Option<u32>,

    /// Also clamp outer margins of unsplit pages
    #[arg(long)]
    pub outer_margin_single_pages: bool,

    /// Column step of the gutter scan
    #[arg(long)]
    pub x_step: Option<u32>,

    /// Row step of the gutter scan
    #[arg(long)]
    pub y_step: Option<u32>,

    /// Pixels at or above this value count as page content
    #[arg(long)]
    pub crop_threshold: Option<u8>,

    /// Padding around the detected page
    #[arg(long)]
    pub pad_px: Option<u32>,

    /// Inward shrink after padding
    #[arg(long)]
    pub edge_inset_px: Option<u32>,

    /// Left/right reconciliation for split pages
    #[arg(long, value_enum)]
    pub symmetry_strategy: Option<SymmetryStrategy>,

    /// Minimum page area (fraction of image area)
    #[arg(long)]
    pub min_area_frac: Option<f64>,

    /// Read printed page numbers with tesseract
    #[arg(long)]
    pub page_numbers: bool,

    /// Page number strip anchors
    #[arg(long, value_enum, value_delimiter = ',')]
    pub page_num_anchors: Option<Vec<Anchor>>,

    /// Page number region positions, in scan order
    #[arg(long, value_enum, value_delimiter = ',')]
    pub page_num_positions: Option<Vec<Position>>,

    /// Numeral systems to read
    #[arg(long, value_enum)]
    pub page_num_parser: Option<ParserMode>,

    /// Tesseract segmentation modes to try, in order
    #[arg(long, value_delimiter = ',')]
    pub page_num_psm: Option<Vec<u32>>,

    /// Largest accepted page number
    #[arg(long)]
    pub page_num_max: Option<u32>,

    /// Write the normalised OCR inputs under _debug/page_numbers
    #[arg(long)]
    pub page_num_debug_crops: bool,

    /// Tesseract executable (default: found on PATH)
    #[arg(long, value_name = "PATH")]
    pub tesseract: Option<PathBuf>,

    /// Seconds before a tesseract call is killed
    #[arg(long, value_name = "SECS")]
    pub ocr_timeout: Option<u64>,

    /// Replace existing outputs
    #[arg(long)]
    pub overwrite: bool,

    /// Allow the output directory to be the input directory
    #[arg(long)]
    pub inplace: bool,

    /// Compute everything, write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Write debug overlays under <out>/_debug
    #[arg(long)]
    pub debug: bool,

    /// Manifest path (default: <out>/manifest.json)
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Worker threads (default: number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Overlay explicitly given flags onto `config`
    pub fn apply_overrides(&self, config: &mut PageImagesConfig) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut config.glob, &self.glob);
        set(&mut config.mode, &self.mode);
        set(&mut config.split_ratio, &self.split_ratio);
        set(&mut config.gutter_search_frac, &self.gutter_search_frac);
        set(&mut config.gutter_trim_px, &self.gutter_trim_px);
        set(&mut config.outer_margin_mode, &self.outer_margin_mode);
        set(&mut config.outer_margin_frac, &self.outer_margin_frac);
        set(&mut config.outer_margin_auto_max_frac, &self.outer_margin_auto_max_frac);
        set(&mut config.outer_margin_auto_search_frac, &self.outer_margin_auto_search_frac);
        set(&mut config.outer_margin_dark_threshold, &self.outer_margin_dark_threshold);
        set(&mut config.outer_margin_dark_frac_cutoff, &self.outer_margin_dark_frac_cutoff);
        set(&mut config.outer_margin_release_frac, &self.outer_margin_release_frac);
        set(&mut config.outer_margin_min_run_px, &self.outer_margin_min_run_px);
        set(&mut config.outer_margin_pad_px, &self.outer_margin_pad_px);
        set(&mut config.x_step, &self.x_step);
        set(&mut config.y_step, &self.y_step);
        set(&mut config.crop_threshold, &self.crop_threshold);
        set(&mut config.pad_px, &self.pad_px);
        set(&mut config.edge_inset_px, &self.edge_inset_px);
        set(&mut config.symmetry_strategy, &self.symmetry_strategy);
        set(&mut config.min_area_frac, &self.min_area_frac);
        if self.outer_margin_single_pages {
            config.outer_margin_single_pages = true;
        }

        let page_numbers = &mut config.page_numbers;
        if self.page_numbers {
            page_numbers.enabled = true;
        }
        if self.page_num_debug_crops {
            page_numbers.debug_crops = true;
        }
        set(&mut page_numbers.anchors, &self.page_num_anchors);
        if let Some(positions) = &self.page_num_positions {
            page_numbers.positions = positions.clone();
            page_numbers.allow_positions = positions.clone();
        }
        set(&mut page_numbers.parser, &self.page_num_parser);
        set(&mut page_numbers.psm_candidates, &self.page_num_psm);
        set(&mut page_numbers.max_page, &self.page_num_max);
        set(&mut page_numbers.timeout_secs, &self.ocr_timeout);
    }

    /// Verbosity as a tracing filter directive
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_minimal() {
        let cli = Cli::try_parse_from(["spreadcrop", "in", "out"]).unwrap();
        assert_eq!(cli.in_dir, Some(PathBuf::from("in")));
        assert_eq!(cli.out_dir, Some(PathBuf::from("out")));
        assert!(!cli.overwrite);
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn test_cli_requires_dirs_unless_dump_config() {
        assert!(Cli::try_parse_from(["spreadcrop"]).is_err());
        assert!(Cli::try_parse_from(["spreadcrop", "--dump-config"]).is_ok());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "spreadcrop",
            "in",
            "out",
            "--mode",
            "split",
            "--symmetry-strategy",
            "mirror_from_gutter",
            "--outer-margin-mode",
            "auto",
            "--pad-px",
            "8",
            "--page-numbers",
            "--page-num-anchors",
            "top,bottom",
            "--page-num-positions",
            "center",
            "--page-num-psm",
            "7,6",
            "-vv",
        ])
        .unwrap();
        let mut config = PageImagesConfig {
            crop_threshold: 200,
            ..Default::default()
        };
        cli.apply_overrides(&mut config);

        assert_eq!(config.mode, RunMode::Split);
        assert_eq!(config.symmetry_strategy, SymmetryStrategy::MirrorFromGutter);
        assert_eq!(config.outer_margin_mode, OuterMarginMode::Auto);
        assert_eq!(config.pad_px, 8);
        // Not given on the command line, so the file value stays.
        assert_eq!(config.crop_threshold, 200);
        assert!(config.page_numbers.enabled);
        assert_eq!(config.page_numbers.anchors, vec![Anchor::Top, Anchor::Bottom]);
        assert_eq!(config.page_numbers.allow_positions, vec![Position::Center]);
        assert_eq!(config.page_numbers.psm_candidates, vec![7, 6]);
        assert_eq!(cli.log_level(), "debug");
    }

    #[test]
    fn test_cli_rejects_unknown_strategy() {
        let result = Cli::try_parse_from([
            "spreadcrop",
            "in",
            "out",
            "--symmetry-strategy",
            "diagonal",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["spreadcrop", "in", "out", "-q", "-v"]).is_err());
        let cli = Cli::try_parse_from(["spreadcrop", "in", "out", "-q"]).unwrap();
        assert_eq!(cli.log_level(), "error");
    }
}
