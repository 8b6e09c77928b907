//! Page Number module core types
//!
//! Contains the options, region, and result types for printed page-number
//! extraction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::BBox;

// ============================================================
// Constants
// ============================================================

/// Default strip height (fraction of page height)
pub const DEFAULT_STRIP_FRAC: f64 = 0.12;

/// Default corner region width (fraction of page width)
pub const DEFAULT_CORNER_W_FRAC: f64 = 0.28;

/// Default region height (fraction of strip height)
pub const DEFAULT_CORNER_H_FRAC: f64 = 0.45;

/// Default centre region width (fraction of page width)
pub const DEFAULT_CENTER_W_FRAC: f64 = 0.20;

/// Default tesseract page segmentation modes, tried in order
pub const DEFAULT_PSM_CANDIDATES: [u32; 4] = [7, 8, 6, 11];

/// Largest printed page number accepted by default
pub const DEFAULT_MAX_PAGE: u32 = 5000;

/// Default integer upscale before OCR
pub const DEFAULT_PREP_SCALE: u32 = 2;

/// Default binarization threshold before OCR
pub const DEFAULT_BIN_THRESHOLD: u8 = 160;

/// Default per-invocation OCR timeout
pub const DEFAULT_OCR_TIMEOUT_SECS: u64 = 10;

/// Characters allowed in the digit pass
pub const DIGIT_WHITELIST: &str = "0123456789";

/// Characters allowed in the Roman-numeral pass
pub const DEFAULT_ROMAN_WHITELIST: &str = "IVXLCDMivxlcdm";

/// Upper bound for the upscale factor
pub const MAX_PREP_SCALE: u32 = 8;

// ============================================================
// Error Types
// ============================================================

/// Page number configuration errors
#[derive(Debug, Error)]
pub enum PageNumberError {
    #[error("page_numbers.{name} must be in the range (0, 1] (got {value})")]
    FractionOutOfRange { name: &'static str, value: f64 },

    #[error("page_numbers.{0} must not be empty")]
    EmptyList(&'static str),

    #[error("page_numbers.{name} is invalid: {reason}")]
    InvalidOption { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, PageNumberError>;

// ============================================================
// Core Data Structures
// ============================================================

/// Vertical anchor of a search strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Top,
    Bottom,
}

impl Anchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::Top => "top",
            Anchor::Bottom => "bottom",
        }
    }
}

/// Horizontal position of a region inside its strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Left,
    Center,
    Right,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Left => "left",
            Position::Center => "center",
            Position::Right => "right",
        }
    }
}

/// Which numeral systems the OCR passes look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ParserMode {
    /// Digits first, then Roman numerals, within each pass
    #[default]
    Auto,
    Digits,
    Roman,
}

impl ParserMode {
    /// Numeral kinds tried per psm pass, in order
    pub fn kinds(&self) -> &'static [NumeralKind] {
        match self {
            ParserMode::Auto => &[NumeralKind::Arabic, NumeralKind::Roman],
            ParserMode::Digits => &[NumeralKind::Arabic],
            ParserMode::Roman => &[NumeralKind::Roman],
        }
    }
}

/// Numeral system of an accepted page number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumeralKind {
    Arabic,
    Roman,
}

/// Why no page number was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionFailure {
    /// OCR engine unavailable
    NoTesseract,
    /// Numerals were read but fell outside `[1, max_page]`
    OutOfRange,
    /// The engine failed or timed out
    TesseractFailed,
    /// Nothing recognisable was read
    NoDigits,
}

impl ExtractionFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionFailure::NoTesseract => "no_tesseract",
            ExtractionFailure::OutOfRange => "out_of_range",
            ExtractionFailure::TesseractFailed => "tesseract_failed",
            ExtractionFailure::NoDigits => "no_digits",
        }
    }
}

/// Named OCR search region within one page image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageNumberRegion {
    /// `<anchor>_<position>`, e.g. `top_left`
    pub name: String,
    pub anchor: Anchor,
    pub position: Position,
    pub bbox: BBox,
}

/// Page number extraction result for one page image
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExtractionResult {
    /// Accepted page number
    pub printed_page: Option<u32>,
    /// Text the number was parsed from
    pub printed_text: Option<String>,
    pub kind: Option<NumeralKind>,
    /// Region that produced the number
    pub region: Option<String>,
    /// Segmentation mode that produced the number
    pub psm: Option<u32>,
    /// Raw OCR text per region, kept for diagnostics
    pub raw_by_region: BTreeMap<String, String>,
    pub reason: Option<ExtractionFailure>,
}

impl ExtractionResult {
    /// Result with no page number and a failure reason
    pub fn failed(reason: ExtractionFailure, raw_by_region: BTreeMap<String, String>) -> Self {
        Self {
            reason: Some(reason),
            raw_by_region,
            ..Default::default()
        }
    }
}

// ============================================================
// Options
// ============================================================

/// Dark-ink tightening applied to each region before OCR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DarkBboxOptions {
    pub enabled: bool,
    /// Pixels below this value count as ink
    pub threshold: u8,
    pub pad_px: u32,
    /// Minimum ink bbox area as a fraction of the region area
    pub min_area_frac: f64,
}

impl Default for DarkBboxOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 170,
            pad_px: 2,
            min_area_frac: 0.005,
        }
    }
}

/// Page number extraction options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageNumberOptions {
    /// Run extraction on every output page
    pub enabled: bool,
    pub anchors: Vec<Anchor>,
    /// Region scan order inside each anchor
    pub positions: Vec<Position>,
    /// Positions whose regions are read at all
    pub allow_positions: Vec<Position>,
    pub parser: ParserMode,
    pub roman_whitelist: String,
    /// Strip height (fraction of page height)
    pub strip_frac: f64,
    /// Strip offset from its anchored edge
    pub strip_y_offset_px: u32,
    pub corner_w_frac: f64,
    pub corner_h_frac: f64,
    pub center_w_frac: f64,
    pub psm_candidates: Vec<u32>,
    pub max_page: u32,
    pub prep_scale: u32,
    pub bin_threshold: u8,
    pub invert: bool,
    /// Write the normalised OCR inputs next to the debug overlays
    pub debug_crops: bool,
    /// Per-invocation OCR timeout
    pub timeout_secs: u64,
    pub dark_bbox: DarkBboxOptions,
}

impl Default for PageNumberOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            anchors: vec![Anchor::Top],
            positions: vec![Position::Right, Position::Left],
            allow_positions: vec![Position::Right, Position::Left],
            parser: ParserMode::Auto,
            roman_whitelist: DEFAULT_ROMAN_WHITELIST.to_string(),
            strip_frac: DEFAULT_STRIP_FRAC,
            strip_y_offset_px: 0,
            corner_w_frac: DEFAULT_CORNER_W_FRAC,
            corner_h_frac: DEFAULT_CORNER_H_FRAC,
            center_w_frac: DEFAULT_CENTER_W_FRAC,
            psm_candidates: DEFAULT_PSM_CANDIDATES.to_vec(),
            max_page: DEFAULT_MAX_PAGE,
            prep_scale: DEFAULT_PREP_SCALE,
            bin_threshold: DEFAULT_BIN_THRESHOLD,
            invert: false,
            debug_crops: false,
            timeout_secs: DEFAULT_OCR_TIMEOUT_SECS,
            dark_bbox: DarkBboxOptions::default(),
        }
    }
}

impl PageNumberOptions {
    /// Create a new options builder
    pub fn builder() -> PageNumberOptionsBuilder {
        PageNumberOptionsBuilder::default()
    }

    /// Check ranges and list contents
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("strip_frac", self.strip_frac),
            ("corner_w_frac", self.corner_w_frac),
            ("corner_h_frac", self.corner_h_frac),
            ("center_w_frac", self.center_w_frac),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PageNumberError::FractionOutOfRange { name, value });
            }
        }
        if self.anchors.is_empty() {
            return Err(PageNumberError::EmptyList("anchors"));
        }
        if self.positions.is_empty() {
            return Err(PageNumberError::EmptyList("positions"));
        }
        if self.allow_positions.is_empty() {
            return Err(PageNumberError::EmptyList("allow_positions"));
        }
        if self.psm_candidates.is_empty() {
            return Err(PageNumberError::EmptyList("psm_candidates"));
        }
        if let Some(psm) = self.psm_candidates.iter().find(|&&psm| psm > 13) {
            return Err(PageNumberError::InvalidOption {
                name: "psm_candidates",
                reason: format!("{psm} is not a tesseract segmentation mode (0-13)"),
            });
        }
        if self.parser != ParserMode::Digits && self.roman_whitelist.trim().is_empty() {
            return Err(PageNumberError::EmptyList("roman_whitelist"));
        }
        if self.max_page < 1 {
            return Err(PageNumberError::InvalidOption {
                name: "max_page",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.prep_scale < 1 || self.prep_scale > MAX_PREP_SCALE {
            return Err(PageNumberError::InvalidOption {
                name: "prep_scale",
                reason: format!("must be in the range [1, {MAX_PREP_SCALE}]"),
            });
        }
        if self.timeout_secs < 1 {
            return Err(PageNumberError::InvalidOption {
                name: "timeout_secs",
                reason: "must be >= 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.dark_bbox.min_area_frac) {
            return Err(PageNumberError::InvalidOption {
                name: "dark_bbox.min_area_frac",
                reason: "must be in the range [0, 1]".to_string(),
            });
        }
        Ok(())
    }

    /// Whether regions at `position` are read
    pub fn allows(&self, position: Position) -> bool {
        self.allow_positions.contains(&position)
    }
}

/// Builder for PageNumberOptions
#[derive(Debug, Default)]
pub struct PageNumberOptionsBuilder {
    options: PageNumberOptions,
}

impl PageNumberOptionsBuilder {
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.options.enabled = enabled;
        self
    }

    #[must_use]
    pub fn anchors(mut self, anchors: impl Into<Vec<Anchor>>) -> Self {
        self.options.anchors = anchors.into();
        self
    }

    /// Set scan positions; they are also the allowed positions
    #[must_use]
    pub fn positions(mut self, positions: impl Into<Vec<Position>>) -> Self {
        let positions = positions.into();
        self.options.allow_positions = positions.clone();
        self.options.positions = positions;
        self
    }

    #[must_use]
    pub fn parser(mut self, parser: ParserMode) -> Self {
        self.options.parser = parser;
        self
    }

    /// Set the strip height (fraction of page height, clamped to 0.01-1.0)
    #[must_use]
    pub fn strip_frac(mut self, frac: f64) -> Self {
        self.options.strip_frac = frac.clamp(0.01, 1.0);
        self
    }

    #[must_use]
    pub fn psm_candidates(mut self, psm: impl Into<Vec<u32>>) -> Self {
        self.options.psm_candidates = psm.into();
        self
    }

    /// Set the largest accepted page number (at least 1)
    #[must_use]
    pub fn max_page(mut self, max_page: u32) -> Self {
        self.options.max_page = max_page.max(1);
        self
    }

    #[must_use]
    pub fn dark_bbox(mut self, dark_bbox: DarkBboxOptions) -> Self {
        self.options.dark_bbox = dark_bbox;
        self
    }

    #[must_use]
    pub fn build(self) -> PageNumberOptions {
        self.options
    }
}
