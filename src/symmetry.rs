//! Left/right symmetry reconciliation for split spreads
//!
//! Independent crops of facing pages rarely come out the same size. The
//! strategies here nudge only the inner (gutter-side) edges so both pages
//! line up, and revert to the independent boxes when that is not possible.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::BBox;

/// Symmetry strategy for split pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SymmetryStrategy {
    /// Keep each page's crop as detected
    #[default]
    #[value(name = "independent")]
    Independent,
    /// Widen the narrower page towards the gutter until widths match
    #[value(name = "match_max_width")]
    MatchMaxWidth,
    /// Give both pages the same distance from the gutter
    #[value(name = "mirror_from_gutter")]
    MirrorFromGutter,
}

impl SymmetryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymmetryStrategy::Independent => "independent",
            SymmetryStrategy::MatchMaxWidth => "match_max_width",
            SymmetryStrategy::MirrorFromGutter => "mirror_from_gutter",
        }
    }
}

/// Geometry of one split spread, in the coordinates each box lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitGeometry {
    /// Width of the left half image
    pub left_width: u32,
    /// Width of the right half image
    pub right_width: u32,
    /// Gutter column in spread coordinates
    pub gutter_x: u32,
    /// Spread column where the right half starts
    pub right_offset_x: u32,
    /// Outer clamp applied to the left page
    pub left_clamp_px: u32,
    /// Outer clamp applied to the right page
    pub right_clamp_px: u32,
}

/// Reconciled pair of crop boxes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymmetryOutcome {
    pub left: BBox,
    pub right: BBox,
    pub note: Option<String>,
}

impl SymmetryOutcome {
    fn reverted(left: BBox, right: BBox, note: String) -> Self {
        debug!(%note, "symmetry strategy reverted");
        Self {
            left,
            right,
            note: Some(note),
        }
    }
}

/// Apply `strategy` to the left/right crop boxes of a split spread.
///
/// The left box is in left-half coordinates (which equal spread coordinates);
/// the right box is in right-half coordinates, offset by `right_offset_x`.
/// The trim band is already excluded by the half widths, so only the outer
/// clamps and the half widths bound the adjusted edges.
pub fn apply_split_symmetry_strategy(
    left_bbox: BBox,
    right_bbox: BBox,
    geometry: &SplitGeometry,
    strategy: SymmetryStrategy,
) -> SymmetryOutcome {
    let mut left_l = left_bbox.left as i64;
    let mut left_r = left_bbox.right as i64;
    let mut right_l = right_bbox.left as i64;
    let mut right_r = right_bbox.right as i64;

    let left_min_left = geometry.left_clamp_px as i64;
    let left_max_right = geometry.left_width as i64;
    let right_min_left = 0i64;
    let right_max_right = (geometry.right_width as i64 - geometry.right_clamp_px as i64).max(1);
    let gutter = geometry.gutter_x as i64;
    let offset = geometry.right_offset_x as i64;

    let mirror = match strategy {
        SymmetryStrategy::Independent => {
            return SymmetryOutcome {
                left: left_bbox,
                right: right_bbox,
                note: None,
            };
        }
        SymmetryStrategy::MatchMaxWidth => {
            let max_width = (left_r - left_l).max(right_r - right_l);
            if left_r - left_l < max_width {
                left_r = left_max_right.min(left_l + max_width);
            }
            if right_r - right_l < max_width {
                right_l = right_min_left.max(right_r - max_width);
            }
            false
        }
        SymmetryStrategy::MirrorFromGutter => {
            let left_gap = (gutter - left_r).max(0);
            let right_gap = (offset + right_l - gutter).max(0);
            let target_gap = left_gap.max(right_gap);

            left_r = left_max_right.min((left_l + 1).max(gutter - target_gap));
            let mirrored_local_left = gutter + target_gap - offset;
            right_l = right_min_left.max((right_r - 1).min(mirrored_local_left));
            true
        }
    };

    left_l = left_l.max(left_min_left);
    right_r = right_r.min(right_max_right);
    left_r = left_r.min(left_max_right);
    right_l = right_l.max(right_min_left);

    let valid = left_r > left_l && right_r > right_l;
    let satisfied = if mirror {
        gutter - left_r == offset + right_l - gutter
    } else {
        left_r - left_l == right_r - right_l
    };

    if !valid || !satisfied {
        let note = if mirror {
            "Mirror symmetry could not be satisfied safely; used independent.".to_string()
        } else {
            format!(
                "Invalid symmetry bounds for strategy={}; used independent.",
                strategy.as_str()
            )
        };
        return SymmetryOutcome::reverted(left_bbox, right_bbox, note);
    }

    SymmetryOutcome {
        left: BBox::new(left_l as u32, left_bbox.top, left_r as u32, left_bbox.bottom),
        right: BBox::new(right_l as u32, right_bbox.top, right_r as u32, right_bbox.bottom),
        note: None,
    }
}
