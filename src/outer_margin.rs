//! Outer-margin clamp
//!
//! Some scans carry a solid dark strip from the scanner bed outside the
//! page. A brightness-only crop would keep it, so the crop detector asks this
//! module how far in from the outer edge the page really starts.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::geometry::column_dark_fraction;

/// How the outer clamp is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OuterMarginMode {
    /// No clamp
    #[default]
    Off,
    /// Clamp a fixed fraction of the page width
    Fixed,
    /// Detect a dark bar and clamp past it
    Auto,
}

impl OuterMarginMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OuterMarginMode::Off => "off",
            OuterMarginMode::Fixed => "fixed",
            OuterMarginMode::Auto => "auto",
        }
    }
}

/// Image edge a scan starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Left,
    Right,
}

/// Parameters for bar detection and clamping
#[derive(Debug, Clone, PartialEq)]
pub struct OuterMarginOptions {
    pub mode: OuterMarginMode,
    /// Clamp width for `fixed` mode (fraction of page width)
    pub frac: f64,
    /// Cap for `auto` mode (fraction of page width)
    pub auto_max_frac: f64,
    /// Scan window for `auto` mode (fraction of page width)
    pub auto_search_frac: f64,
    /// Pixels below this value count as dark
    pub dark_threshold: u8,
    /// Column dark fraction that starts a bar
    pub dark_frac_cutoff: f64,
    /// Column dark fraction that counts towards releasing a bar
    pub release_frac: f64,
    /// Consecutive release columns that end a bar
    pub min_run_px: u32,
    /// Extra pixels added past a detected bar
    pub pad_px: u32,
}

impl Default for OuterMarginOptions {
    fn default() -> Self {
        Self {
            mode: OuterMarginMode::Off,
            frac: 0.0,
            auto_max_frac: 0.15,
            auto_search_frac: 0.18,
            dark_threshold: 80,
            dark_frac_cutoff: 0.60,
            release_frac: 0.35,
            min_run_px: 12,
            pad_px: 4,
        }
    }
}

impl OuterMarginOptions {
    /// Same options with clamping switched off
    pub fn disabled(&self) -> Self {
        Self {
            mode: OuterMarginMode::Off,
            ..self.clone()
        }
    }
}

/// Diagnostic record of how much outer margin was removed on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OuterClampInfo {
    pub edge: Edge,
    pub mode: OuterMarginMode,
    pub detected_bar_px: u32,
    pub applied_clamp_px: u32,
}

impl OuterClampInfo {
    pub fn none(edge: Edge, mode: OuterMarginMode) -> Self {
        Self {
            edge,
            mode,
            detected_bar_px: 0,
            applied_clamp_px: 0,
        }
    }
}

/// Width in pixels of a dark bar touching `edge`, or 0 when there is none.
///
/// Columns are scanned inward over `auto_search_frac * width`. A column whose
/// dark fraction reaches `dark_frac_cutoff` starts (or continues) a bar; once
/// inside, `min_run_px` consecutive columns at or below `release_frac` end it.
/// A bar that never releases is assumed to span the whole window.
pub fn detect_outer_black_bar_px(gray: &GrayImage, edge: Edge, options: &OuterMarginOptions) -> u32 {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return 0;
    }

    let search_width = ((width as f64 * options.auto_search_frac) as u32).clamp(1, width);
    let mut saw_bar = false;
    let mut consecutive_release = 0u32;

    for idx in 0..search_width {
        let x = match edge {
            Edge::Left => idx,
            Edge::Right => width - 1 - idx,
        };
        let dark_fraction = column_dark_fraction(gray, x, options.dark_threshold);

        if dark_fraction >= options.dark_frac_cutoff {
            saw_bar = true;
            consecutive_release = 0;
            continue;
        }

        if saw_bar && dark_fraction <= options.release_frac {
            consecutive_release += 1;
            if consecutive_release >= options.min_run_px {
                return (idx + 1).saturating_sub(consecutive_release);
            }
        } else if saw_bar {
            consecutive_release = 0;
        }
    }

    if saw_bar {
        search_width
    } else {
        0
    }
}

/// Resolve the clamp for one outer edge of a page image.
pub fn resolve_outer_clamp(gray: &GrayImage, edge: Edge, options: &OuterMarginOptions) -> OuterClampInfo {
    let width = gray.width();
    match options.mode {
        OuterMarginMode::Off => OuterClampInfo::none(edge, options.mode),
        OuterMarginMode::Fixed => OuterClampInfo {
            edge,
            mode: options.mode,
            detected_bar_px: 0,
            applied_clamp_px: (width as f64 * options.frac).max(0.0) as u32,
        },
        OuterMarginMode::Auto => {
            let detected_bar_px = detect_outer_black_bar_px(gray, edge, options);
            if detected_bar_px == 0 {
                return OuterClampInfo::none(edge, options.mode);
            }
            let max_clamp_px = (width as f64 * options.auto_max_frac).max(0.0) as u32;
            OuterClampInfo {
                edge,
                mode: options.mode,
                detected_bar_px,
                applied_clamp_px: (detected_bar_px + options.pad_px).min(max_clamp_px),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Bright page with a dark bar `bar` px wide on the given edge.
    fn page_with_bar(width: u32, height: u32, bar: u32, edge: Edge) -> GrayImage {
        let mut gray = GrayImage::from_pixel(width, height, Luma([230]));
        for y in 0..height {
            for i in 0..bar {
                let x = match edge {
                    Edge::Left => i,
                    Edge::Right => width - 1 - i,
                };
                gray.put_pixel(x, y, Luma([10]));
            }
        }
        gray
    }

    fn auto_options() -> OuterMarginOptions {
        OuterMarginOptions {
            mode: OuterMarginMode::Auto,
            auto_search_frac: 0.5,
            min_run_px: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_bar_left_and_right() {
        let options = auto_options();
        let left = page_with_bar(200, 100, 15, Edge::Left);
        assert_eq!(detect_outer_black_bar_px(&left, Edge::Left, &options), 15);
        assert_eq!(detect_outer_black_bar_px(&left, Edge::Right, &options), 0);

        let right = page_with_bar(200, 100, 22, Edge::Right);
        assert_eq!(detect_outer_black_bar_px(&right, Edge::Right, &options), 22);
    }

    #[test]
    fn test_bar_without_release_spans_window() {
        let options = OuterMarginOptions {
            auto_search_frac: 0.1,
            ..auto_options()
        };
        let gray = page_with_bar(200, 50, 60, Edge::Left);
        assert_eq!(detect_outer_black_bar_px(&gray, Edge::Left, &options), 20);
    }

    #[test]
    fn test_no_bar_on_clean_page() {
        let gray = GrayImage::from_pixel(120, 80, Luma([240]));
        assert_eq!(detect_outer_black_bar_px(&gray, Edge::Left, &auto_options()), 0);
    }

    #[test]
    fn test_resolve_modes() {
        let gray = page_with_bar(200, 100, 15, Edge::Left);

        let off = resolve_outer_clamp(&gray, Edge::Left, &OuterMarginOptions::default());
        assert_eq!(off.applied_clamp_px, 0);
        assert_eq!(off.detected_bar_px, 0);

        let fixed = OuterMarginOptions {
            mode: OuterMarginMode::Fixed,
            frac: 0.05,
            ..Default::default()
        };
        let info = resolve_outer_clamp(&gray, Edge::Left, &fixed);
        assert_eq!(info.detected_bar_px, 0);
        assert_eq!(info.applied_clamp_px, 10);

        let info = resolve_outer_clamp(&gray, Edge::Left, &auto_options());
        assert_eq!(info.detected_bar_px, 15);
        assert_eq!(info.applied_clamp_px, 19);
    }

    #[test]
    fn test_auto_clamp_is_capped() {
        let options = OuterMarginOptions {
            auto_max_frac: 0.05,
            ..auto_options()
        };
        let gray = page_with_bar(200, 100, 30, Edge::Left);
        let info = resolve_outer_clamp(&gray, Edge::Left, &options);
        assert_eq!(info.detected_bar_px, 30);
        assert_eq!(info.applied_clamp_px, 10);
    }
}
