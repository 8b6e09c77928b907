//! Geometry primitives
//!
//! Pixel-space bounding boxes and the grayscale sampling helpers shared by
//! the spread, crop, and page-number detectors.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Axis-aligned half-open pixel rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BBox {
    /// Create a new bounding box
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Box covering a whole `width x height` image
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Area in pixels
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// True when the box has positive width and height
    pub fn is_valid(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }

    /// Grow the box by `pad` on every side, clamped to the image bounds
    pub fn pad(&self, pad: u32, width: u32, height: u32) -> Self {
        Self {
            left: self.left.saturating_sub(pad),
            top: self.top.saturating_sub(pad),
            right: self.right.saturating_add(pad).min(width),
            bottom: self.bottom.saturating_add(pad).min(height),
        }
    }

    /// Shift horizontally by `dx` (used to map a right-half box into spread coordinates)
    pub fn offset_x(&self, dx: u32) -> Self {
        Self {
            left: self.left + dx,
            right: self.right + dx,
            ..*self
        }
    }

    /// Crop `image` to this box
    pub fn crop(&self, image: &DynamicImage) -> DynamicImage {
        image.crop_imm(self.left, self.top, self.width(), self.height())
    }
}

/// Single-channel view of any decoded raster
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => other.to_luma8(),
    }
}

/// Tight bounding box of pixels accepted by `predicate`, or `None` when no pixel matches.
pub fn mask_bbox<F>(gray: &GrayImage, predicate: F) -> Option<BBox>
where
    F: Fn(u8) -> bool,
{
    let (width, height) = gray.dimensions();
    let mut min_x = width;
    let mut min_y = height;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut found = false;

    for (x, y, pixel) in gray.enumerate_pixels() {
        if predicate(pixel[0]) {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if !found {
        return None;
    }
    Some(BBox::new(min_x, min_y, max_x + 1, max_y + 1))
}

/// Bounding box of pixels with intensity `>= threshold`
pub fn bright_bbox(gray: &GrayImage, threshold: u8) -> Option<BBox> {
    mask_bbox(gray, |v| v >= threshold)
}

/// Bounding box of pixels with intensity `< threshold`
pub fn dark_bbox(gray: &GrayImage, threshold: u8) -> Option<BBox> {
    mask_bbox(gray, |v| v < threshold)
}

/// Sum of a column sampled every `y_step` rows
pub fn column_sum(gray: &GrayImage, x: u32, y_step: u32) -> u64 {
    let step = y_step.max(1) as usize;
    (0..gray.height())
        .step_by(step)
        .map(|y| gray.get_pixel(x, y)[0] as u64)
        .sum()
}

/// Fraction of a column's pixels strictly darker than `threshold`
pub fn column_dark_fraction(gray: &GrayImage, x: u32, threshold: u8) -> f64 {
    let height = gray.height();
    if height == 0 {
        return 0.0;
    }
    let dark = (0..height)
        .filter(|&y| gray.get_pixel(x, y)[0] < threshold)
        .count();
    dark as f64 / height as f64
}
