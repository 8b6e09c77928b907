//! OCR search regions
//!
//! Page numbers sit in a thin strip at the top or bottom of a page, usually in
//! a corner or centred. Regions are fixed fractions of the page size.

use super::types::{Anchor, PageNumberOptions, PageNumberRegion, Position};
use crate::geometry::BBox;

/// Build the search regions for a `width x height` page.
///
/// Regions come out in `anchors x positions` order. Positions outside
/// `allow_positions` are left out. Every region is clamped to the page and
/// keeps at least one pixel in each direction.
pub fn build_page_num_regions(
    width: u32,
    height: u32,
    options: &PageNumberOptions,
) -> Vec<PageNumberRegion> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let strip_h = ((options.strip_frac * height as f64) as u32).clamp(1, height);
    let region_h = ((options.corner_h_frac * strip_h as f64) as u32).clamp(1, strip_h);
    let corner_w = ((options.corner_w_frac * width as f64) as u32).clamp(1, width);
    let center_w = ((options.center_w_frac * width as f64) as u32).clamp(1, width);
    let offset = options.strip_y_offset_px.min(height - strip_h);

    let mut regions = Vec::new();
    for &anchor in &options.anchors {
        let (top, bottom) = match anchor {
            Anchor::Top => (offset, offset + region_h),
            Anchor::Bottom => {
                let strip_bottom = height - offset;
                (strip_bottom - region_h, strip_bottom)
            }
        };

        for &position in &options.positions {
            if !options.allows(position) {
                continue;
            }
            let (left, right) = match position {
                Position::Left => (0, corner_w),
                Position::Right => (width - corner_w, width),
                Position::Center => {
                    let left = (width - center_w) / 2;
                    (left, left + center_w)
                }
            };
            let bbox = BBox::new(left, top, right, bottom);
            if !bbox.is_valid() {
                continue;
            }
            regions.push(PageNumberRegion {
                name: format!("{}_{}", anchor.as_str(), position.as_str()),
                anchor,
                position,
                bbox,
            });
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(regions: &[PageNumberRegion]) -> Vec<&str> {
        regions.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_default_corner_regions() {
        let regions = build_page_num_regions(1000, 1500, &PageNumberOptions::default());
        assert_eq!(names(&regions), vec!["top_right", "top_left"]);
        assert_eq!(regions[0].bbox, BBox::new(720, 0, 1000, 81));
        assert_eq!(regions[1].bbox, BBox::new(0, 0, 280, 81));
    }

    #[test]
    fn test_bottom_and_center_regions() {
        let options = PageNumberOptions {
            anchors: vec![Anchor::Bottom],
            positions: vec![Position::Center],
            allow_positions: vec![Position::Center],
            ..Default::default()
        };
        let regions = build_page_num_regions(1000, 1500, &options);
        assert_eq!(names(&regions), vec!["bottom_center"]);
        assert_eq!(regions[0].bbox, BBox::new(400, 1419, 600, 1500));
    }

    #[test]
    fn test_strip_offset_moves_regions_inward() {
        let options = PageNumberOptions {
            anchors: vec![Anchor::Top, Anchor::Bottom],
            positions: vec![Position::Left],
            allow_positions: vec![Position::Left],
            strip_y_offset_px: 30,
            ..Default::default()
        };
        let regions = build_page_num_regions(1000, 1500, &options);
        assert_eq!(regions[0].bbox, BBox::new(0, 30, 280, 111));
        assert_eq!(regions[1].bbox, BBox::new(0, 1389, 280, 1470));
    }

    #[test]
    fn test_disallowed_positions_are_skipped() {
        let options = PageNumberOptions {
            positions: vec![Position::Left, Position::Center, Position::Right],
            allow_positions: vec![Position::Right],
            ..Default::default()
        };
        let regions = build_page_num_regions(600, 800, &options);
        assert_eq!(names(&regions), vec!["top_right"]);
    }

    #[test]
    fn test_tiny_page_keeps_valid_regions() {
        let options = PageNumberOptions {
            strip_y_offset_px: 500,
            ..Default::default()
        };
        let regions = build_page_num_regions(3, 2, &options);
        assert_eq!(regions.len(), 2);
        assert!(regions.iter().all(|r| r.bbox.is_valid()));
        assert!(regions.iter().all(|r| r.bbox.bottom <= 2 && r.bbox.right <= 3));
        assert!(build_page_num_regions(0, 10, &options).is_empty());
    }
}
