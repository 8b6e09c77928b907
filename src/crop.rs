//! Content crop detection
//!
//! Finds the bright page region inside a page (or half-spread) image. Every
//! shortfall degrades to the full image plus a note; the detector never fails.

use image::GrayImage;
use serde::Serialize;
use tracing::debug;

use crate::geometry::{bright_bbox, BBox};
use crate::outer_margin::{resolve_outer_clamp, Edge, OuterClampInfo, OuterMarginOptions};

/// Fallback note: nothing reached the crop threshold
pub const NOTE_NO_BRIGHT_REGION: &str = "No bright page region found; used full image.";
/// Fallback note: bright region below `min_area_frac`
pub const NOTE_AREA_TOO_SMALL: &str = "Detected page area too small; used full image.";
/// Fallback note: padding produced an empty box
pub const NOTE_INVALID_AFTER_PAD: &str = "Invalid crop bounds after padding; used full image.";
/// Fallback note: edge inset produced an empty box
pub const NOTE_INVALID_AFTER_INSET: &str = "Invalid crop bounds after edge inset; used full image.";
/// Fallback note: outer clamp produced an empty box
pub const NOTE_INVALID_AFTER_CLAMP: &str =
    "Invalid crop bounds after outer margin clamp; used full image.";

/// Which page of a spread an image is; decides the outer edge(s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSide {
    /// Left page of a spread; outer edge is the left edge
    Left,
    /// Right page of a spread; outer edge is the right edge
    Right,
    /// Unsplit page; both vertical edges are outer edges
    Single,
}

impl PageSide {
    /// Edges the outer clamp applies to
    pub fn outer_edges(&self) -> &'static [Edge] {
        match self {
            PageSide::Left => &[Edge::Left],
            PageSide::Right => &[Edge::Right],
            PageSide::Single => &[Edge::Left, Edge::Right],
        }
    }
}

/// Crop detection options
#[derive(Debug, Clone, PartialEq)]
pub struct CropOptions {
    /// Pixels at or above this intensity count as page content
    pub crop_threshold: u8,
    /// Padding added around the bright bbox
    pub pad_px: u32,
    /// Minimum bright-bbox area as a fraction of the image area
    pub min_area_frac: f64,
    /// Inward shrink applied after padding
    pub edge_inset_px: u32,
    /// Outer-margin clamp parameters
    pub outer: OuterMarginOptions,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            crop_threshold: 180,
            pad_px: 20,
            min_area_frac: 0.25,
            edge_inset_px: 0,
            outer: OuterMarginOptions::default(),
        }
    }
}

/// Crop box for one page image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropResult {
    pub bbox: BBox,
    pub used_fallback: bool,
    pub note: Option<String>,
    /// One entry per outer edge that was examined
    pub outer_clamps: Vec<OuterClampInfo>,
}

impl CropResult {
    fn fallback(width: u32, height: u32, note: &str, outer_clamps: Vec<OuterClampInfo>) -> Self {
        debug!(note, "crop fell back to full image");
        Self {
            bbox: BBox::full(width, height),
            used_fallback: true,
            note: Some(note.to_string()),
            outer_clamps,
        }
    }

    /// Applied clamp on `edge`, 0 when that edge was not clamped
    pub fn clamp_px(&self, edge: Edge) -> u32 {
        self.outer_clamps
            .iter()
            .find(|info| info.edge == edge)
            .map(|info| info.applied_clamp_px)
            .unwrap_or(0)
    }
}

/// Find the bright content box of a page, with safe fallback to the full image.
pub fn find_crop_bbox(gray: &GrayImage, options: &CropOptions, side: PageSide) -> CropResult {
    let (width, height) = gray.dimensions();
    let unclamped: Vec<OuterClampInfo> = side
        .outer_edges()
        .iter()
        .map(|&edge| OuterClampInfo::none(edge, options.outer.mode))
        .collect();

    let Some(bright) = bright_bbox(gray, options.crop_threshold) else {
        return CropResult::fallback(width, height, NOTE_NO_BRIGHT_REGION, unclamped);
    };

    let image_area = width as u64 * height as u64;
    let min_area = (options.min_area_frac * image_area as f64) as u64;
    if bright.area() < min_area {
        return CropResult::fallback(width, height, NOTE_AREA_TOO_SMALL, unclamped);
    }

    let padded = bright.pad(options.pad_px, width, height);
    if !padded.is_valid() {
        return CropResult::fallback(width, height, NOTE_INVALID_AFTER_PAD, unclamped);
    }

    let mut bbox = padded;
    let inset = options.edge_inset_px;
    if inset > 0 {
        // Keep at least one pixel in each direction.
        let left = bbox.left.saturating_add(inset).min(bbox.right - 1);
        let top = bbox.top.saturating_add(inset).min(bbox.bottom - 1);
        let right = bbox.right.saturating_sub(inset).max(left + 1);
        let bottom = bbox.bottom.saturating_sub(inset).max(top + 1);
        bbox = BBox::new(left, top, right, bottom);
    }
    if !bbox.is_valid() {
        return CropResult::fallback(width, height, NOTE_INVALID_AFTER_INSET, unclamped);
    }

    let outer_clamps: Vec<OuterClampInfo> = side
        .outer_edges()
        .iter()
        .map(|&edge| resolve_outer_clamp(gray, edge, &options.outer))
        .collect();

    for info in &outer_clamps {
        if info.applied_clamp_px == 0 {
            continue;
        }
        match info.edge {
            Edge::Left => bbox.left = bbox.left.max(info.applied_clamp_px),
            Edge::Right => {
                bbox.right = bbox
                    .right
                    .min(width.saturating_sub(info.applied_clamp_px))
            }
        }
    }
    if !bbox.is_valid() {
        return CropResult::fallback(width, height, NOTE_INVALID_AFTER_CLAMP, outer_clamps);
    }

    CropResult {
        bbox,
        used_fallback: false,
        note: None,
        outer_clamps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outer_margin::OuterMarginMode;
    use image::Luma;

    /// 200x100 page: dark background with a bright block at [30,170) x [10,90)
    fn page() -> GrayImage {
        let mut gray = GrayImage::from_pixel(200, 100, Luma([20]));
        for y in 10..90 {
            for x in 30..170 {
                gray.put_pixel(x, y, Luma([240]));
            }
        }
        gray
    }

    fn options(pad_px: u32, edge_inset_px: u32) -> CropOptions {
        CropOptions {
            pad_px,
            edge_inset_px,
            ..Default::default()
        }
    }

    #[test]
    fn test_crop_bbox_reduces_background() {
        let result = find_crop_bbox(&page(), &options(5, 0), PageSide::Left);
        assert!(!result.used_fallback);
        assert!(result.note.is_none());
        assert_eq!(result.bbox, BBox::new(25, 5, 175, 95));
    }

    #[test]
    fn test_all_dark_falls_back_to_full_image() {
        let dark = GrayImage::from_pixel(200, 100, Luma([10]));
        let result = find_crop_bbox(&dark, &options(5, 0), PageSide::Single);
        assert_eq!(result.bbox, BBox::new(0, 0, 200, 100));
        assert!(result.used_fallback);
        assert_eq!(result.note.as_deref(), Some(NOTE_NO_BRIGHT_REGION));
    }

    #[test]
    fn test_small_region_falls_back() {
        let mut gray = GrayImage::from_pixel(200, 100, Luma([10]));
        for y in 40..45 {
            for x in 90..95 {
                gray.put_pixel(x, y, Luma([250]));
            }
        }
        let result = find_crop_bbox(&gray, &options(5, 0), PageSide::Left);
        assert!(result.used_fallback);
        assert_eq!(result.note.as_deref(), Some(NOTE_AREA_TOO_SMALL));
        assert_eq!(result.bbox, BBox::full(200, 100));
    }

    #[test]
    fn test_edge_inset_shrinks_every_side() {
        let plain = find_crop_bbox(&page(), &options(5, 0), PageSide::Left).bbox;
        let inset = find_crop_bbox(&page(), &options(5, 5), PageSide::Left).bbox;
        assert!(inset.left > plain.left);
        assert!(inset.top > plain.top);
        assert!(inset.right < plain.right);
        assert!(inset.bottom < plain.bottom);
    }

    #[test]
    fn test_huge_inset_keeps_one_pixel() {
        let result = find_crop_bbox(&page(), &options(0, 500), PageSide::Left);
        assert!(!result.used_fallback);
        assert!(result.bbox.is_valid());
        assert_eq!(result.bbox.width(), 1);
        assert_eq!(result.bbox.height(), 1);
    }

    #[test]
    fn test_max_inset_does_not_overflow() {
        let result = find_crop_bbox(&page(), &options(5, u32::MAX), PageSide::Right);
        assert!(!result.used_fallback);
        assert_eq!(result.bbox.width(), 1);
        assert_eq!(result.bbox.height(), 1);
    }

    #[test]
    fn test_fixed_clamp_only_touches_outer_side() {
        // Bright page reaching both edges.
        let gray = GrayImage::from_pixel(200, 100, Luma([240]));
        let opts = CropOptions {
            pad_px: 0,
            outer: OuterMarginOptions {
                mode: OuterMarginMode::Fixed,
                frac: 0.1,
                ..Default::default()
            },
            ..Default::default()
        };

        let left = find_crop_bbox(&gray, &opts, PageSide::Left);
        assert_eq!(left.bbox, BBox::new(20, 0, 200, 100));
        assert_eq!(left.clamp_px(Edge::Left), 20);
        assert_eq!(left.clamp_px(Edge::Right), 0);

        let right = find_crop_bbox(&gray, &opts, PageSide::Right);
        assert_eq!(right.bbox, BBox::new(0, 0, 180, 100));

        let single = find_crop_bbox(&gray, &opts, PageSide::Single);
        assert_eq!(single.bbox, BBox::new(20, 0, 180, 100));
        assert_eq!(single.outer_clamps.len(), 2);
    }

    #[test]
    fn test_auto_clamp_removes_scanner_bar() {
        // A bright page whose left 12 columns are a dark scanner strip with a
        // few bright specks, so the bright bbox alone would reach x=0.
        let mut gray = GrayImage::from_pixel(200, 100, Luma([235]));
        for y in 0..100 {
            for x in 0..12 {
                let value = if y % 10 == 0 { 250 } else { 5 };
                gray.put_pixel(x, y, Luma([value]));
            }
        }
        let opts = CropOptions {
            pad_px: 0,
            outer: OuterMarginOptions {
                mode: OuterMarginMode::Auto,
                min_run_px: 4,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = find_crop_bbox(&gray, &opts, PageSide::Left);
        assert!(!result.used_fallback);
        assert_eq!(result.outer_clamps[0].detected_bar_px, 12);
        assert_eq!(result.bbox.left, 16);
    }
}
