//! Spread and gutter detection, and the page splitter
//!
//! A spread is a scan holding two facing pages. Pages are brighter than the
//! scanner background, so the binding shows up as the darkest column near the
//! horizontal centre.

use image::{DynamicImage, GrayImage};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::geometry::column_sum;

/// Lower bound of the band a gutter may fall in (fraction of width, exclusive)
pub const GUTTER_BAND_MIN_FRAC: f64 = 0.2;

/// Upper bound of the band a gutter may fall in (fraction of width, exclusive)
pub const GUTTER_BAND_MAX_FRAC: f64 = 0.8;

/// Errors raised while splitting spreads
#[derive(Debug, Error)]
pub enum SpreadError {
    #[error("Image is too narrow to split into two pages (width {0})")]
    TooNarrow(u32),
}

pub type Result<T> = std::result::Result<T, SpreadError>;

/// Spread decision for one image
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpreadDecision {
    pub is_spread: bool,
    pub aspect_ratio: f64,
}

impl SpreadDecision {
    /// Classify an image by its aspect ratio
    pub fn classify(width: u32, height: u32, split_ratio: f64) -> Self {
        let aspect_ratio = if height == 0 {
            0.0
        } else {
            width as f64 / height as f64
        };
        Self {
            is_spread: detect_spread(width, height, split_ratio),
            aspect_ratio,
        }
    }
}

/// Located gutter column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GutterResult {
    pub gutter_x: u32,
    pub fell_back_to_center: bool,
}

/// True when `width / height >= split_ratio`; a zero height is never a spread.
pub fn detect_spread(width: u32, height: u32, split_ratio: f64) -> bool {
    if height == 0 {
        return false;
    }
    (width as f64 / height as f64) >= split_ratio
}

/// Find the darkest column in a window of `search_frac * width` around the centre.
///
/// Columns are visited every `x_step` pixels and each is scored by summing
/// every `y_step`-th row. A winner outside the 20%..80% band is treated as a
/// stray dark border and replaced by the exact centre.
pub fn detect_gutter_x(gray: &GrayImage, search_frac: f64, x_step: u32, y_step: u32) -> GutterResult {
    let width = gray.width();
    if width == 0 {
        return GutterResult {
            gutter_x: 0,
            fell_back_to_center: true,
        };
    }

    let center_x = width / 2;
    let half_window = ((search_frac * width as f64) / 2.0).max(1.0) as u32;
    let start_x = center_x.saturating_sub(half_window);
    let end_x = (center_x + half_window).min(width - 1);

    let mut best_x = center_x;
    let mut best_score: Option<u64> = None;
    for x in (start_x..=end_x).step_by(x_step.max(1) as usize) {
        let score = column_sum(gray, x, y_step);
        if best_score.is_none_or(|best| score < best) {
            best_score = Some(score);
            best_x = x;
        }
    }

    let band_min = (GUTTER_BAND_MIN_FRAC * width as f64) as u32;
    let band_max = (GUTTER_BAND_MAX_FRAC * width as f64) as u32;
    let mut fell_back_to_center = false;
    if !(band_min < best_x && best_x < band_max) {
        debug!(candidate = best_x, width, "gutter candidate outside band");
        best_x = center_x;
        fell_back_to_center = true;
    }

    let gutter_x = if width >= 2 {
        best_x.clamp(1, width - 1)
    } else {
        0
    };

    GutterResult {
        gutter_x,
        fell_back_to_center,
    }
}

/// Column ranges `[0, left_end)` and `[right_start, width)` for a split.
///
/// Trimming removes `trim_px` on each side of the gutter; when that would
/// leave either half empty, the split falls back to an untrimmed cut.
pub fn split_columns(width: u32, gutter_x: u32, trim_px: u32) -> Result<(u32, u32)> {
    if width < 2 {
        return Err(SpreadError::TooNarrow(width));
    }
    let gutter = gutter_x.clamp(1, width - 1);
    let left_end = gutter.saturating_sub(trim_px);
    let right_start = gutter.saturating_add(trim_px);

    if left_end < 1 || right_start > width - 1 {
        return Ok((gutter, gutter));
    }
    Ok((left_end, right_start))
}

/// Cut a spread into its left and right pages at `gutter_x`.
pub fn split_spread_image(
    image: &DynamicImage,
    gutter_x: u32,
    trim_px: u32,
) -> Result<(DynamicImage, DynamicImage)> {
    let (width, height) = (image.width(), image.height());
    let (left_end, right_start) = split_columns(width, gutter_x, trim_px)?;

    let left = image.crop_imm(0, 0, left_end, height);
    let right = image.crop_imm(right_start, 0, width - right_start, height);
    Ok((left, right))
}
