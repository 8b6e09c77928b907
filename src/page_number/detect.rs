//! Printed page number extraction
//!
//! Region crops are normalised and handed to an [`OcrEngine`], trying each
//! region, then each psm candidate, then digits before Roman numerals. The
//! first reading inside `[1, max_page]` wins.

use std::collections::BTreeMap;
use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use imageproc::contrast::{self, ThresholdType};
use tracing::{debug, trace, warn};

use super::ocr::OcrEngine;
use super::parse::{read_numeral, NumeralReading};
use super::regions::build_page_num_regions;
use super::types::{
    DarkBboxOptions, ExtractionFailure, ExtractionResult, NumeralKind, PageNumberOptions,
    PageNumberRegion, DIGIT_WHITELIST,
};
use crate::geometry::{dark_bbox, to_gray, BBox};

/// Separator between attempts in `raw_by_region`
const RAW_TEXT_SEPARATOR: &str = " | ";

/// Extract the printed page number from a final page image.
///
/// `engine = None` means no OCR engine is available.
pub fn extract_printed_page_number(
    page: &DynamicImage,
    options: &PageNumberOptions,
    engine: Option<&dyn OcrEngine>,
) -> ExtractionResult {
    PageNumberExtractor::new(options, engine).extract(page, "page")
}

/// Tight box around dark ink inside a region crop, padded.
///
/// Returns `None` when there is no ink or the ink box is smaller than
/// `min_area_frac` of the crop, in which case the whole crop is used.
pub fn ink_bbox(gray: &GrayImage, options: &DarkBboxOptions) -> Option<BBox> {
    let (width, height) = gray.dimensions();
    let ink = dark_bbox(gray, options.threshold)?;
    let min_area = (options.min_area_frac * (width as u64 * height as u64) as f64) as u64;
    if ink.area() < min_area {
        return None;
    }
    let padded = ink.pad(options.pad_px, width, height);
    padded.is_valid().then_some(padded)
}

/// Normalise a region crop for OCR.
///
/// Contrast stretch to the full range, integer nearest-neighbour upscale,
/// optional inversion, then binarisation at `bin_threshold` (pixels above it
/// become white).
pub fn prepare_for_ocr(gray: &GrayImage, options: &PageNumberOptions) -> GrayImage {
    let (lo, hi) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    // A flat crop has nothing to stretch.
    let mut prepared = if lo < hi {
        contrast::stretch_contrast(gray, lo, hi, 0, 255)
    } else {
        gray.clone()
    };

    let scale = options.prep_scale.max(1);
    if scale > 1 {
        prepared = imageops::resize(
            &prepared,
            prepared.width() * scale,
            prepared.height() * scale,
            FilterType::Nearest,
        );
    }

    if options.invert {
        imageops::invert(&mut prepared);
    }

    contrast::threshold(&prepared, options.bin_threshold, ThresholdType::Binary)
}

/// Page number extractor with an optional debug crop directory
pub struct PageNumberExtractor<'a> {
    options: &'a PageNumberOptions,
    engine: Option<&'a dyn OcrEngine>,
    debug_dir: Option<PathBuf>,
}

impl<'a> PageNumberExtractor<'a> {
    pub fn new(options: &'a PageNumberOptions, engine: Option<&'a dyn OcrEngine>) -> Self {
        Self {
            options,
            engine,
            debug_dir: None,
        }
    }

    /// Write each prepared region crop to `dir` as `<label>_<region>.png`
    #[must_use]
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// Run extraction on one page; `label` names debug crops.
    pub fn extract(&self, page: &DynamicImage, label: &str) -> ExtractionResult {
        let Some(engine) = self.engine else {
            return ExtractionResult::failed(ExtractionFailure::NoTesseract, BTreeMap::new());
        };

        let gray = to_gray(page);
        let regions = build_page_num_regions(gray.width(), gray.height(), self.options);

        let mut raw_by_region = BTreeMap::new();
        let mut saw_out_of_range = false;
        let mut saw_failure = false;

        for region in &regions {
            let prepared = self.prepare_region(&gray, region, label);
            let mut attempts: Vec<String> = Vec::new();

            for &psm in &self.options.psm_candidates {
                for &kind in self.options.parser.kinds() {
                    let whitelist = match kind {
                        NumeralKind::Arabic => DIGIT_WHITELIST,
                        NumeralKind::Roman => self.options.roman_whitelist.as_str(),
                    };

                    let text = match engine.recognize(&prepared, psm, whitelist) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(region = %region.name, psm, error = %e, "OCR attempt failed");
                            saw_failure = true;
                            continue;
                        }
                    };
                    trace!(region = %region.name, psm, ?kind, text = text.trim(), "OCR attempt");
                    if !text.trim().is_empty() {
                        attempts.push(text.trim().to_string());
                    }

                    match read_numeral(&text, kind, self.options.max_page) {
                        NumeralReading::Accepted { value, text } => {
                            raw_by_region.insert(region.name.clone(), attempts.join(RAW_TEXT_SEPARATOR));
                            debug!(page = value, region = %region.name, psm, ?kind, "printed page number found");
                            return ExtractionResult {
                                printed_page: Some(value),
                                printed_text: Some(text),
                                kind: Some(kind),
                                region: Some(region.name.clone()),
                                psm: Some(psm),
                                raw_by_region,
                                reason: None,
                            };
                        }
                        NumeralReading::OutOfRange => saw_out_of_range = true,
                        NumeralReading::Empty => {}
                    }
                }
            }
            raw_by_region.insert(region.name.clone(), attempts.join(RAW_TEXT_SEPARATOR));
        }

        let reason = if saw_out_of_range {
            ExtractionFailure::OutOfRange
        } else if saw_failure {
            ExtractionFailure::TesseractFailed
        } else {
            ExtractionFailure::NoDigits
        };
        debug!(reason = reason.as_str(), "no printed page number");
        ExtractionResult::failed(reason, raw_by_region)
    }

    fn prepare_region(&self, gray: &GrayImage, region: &PageNumberRegion, label: &str) -> GrayImage {
        let bbox = region.bbox;
        let mut crop =
            imageops::crop_imm(gray, bbox.left, bbox.top, bbox.width(), bbox.height()).to_image();

        if self.options.dark_bbox.enabled {
            if let Some(ink) = ink_bbox(&crop, &self.options.dark_bbox) {
                crop = imageops::crop_imm(&crop, ink.left, ink.top, ink.width(), ink.height())
                    .to_image();
            }
        }

        let prepared = prepare_for_ocr(&crop, self.options);

        if let Some(dir) = &self.debug_dir {
            let path = dir.join(format!("{label}_{}.png", region.name));
            let written = std::fs::create_dir_all(dir)
                .map_err(image::ImageError::IoError)
                .and_then(|_| prepared.save(&path));
            if let Err(e) = written {
                warn!(path = %path.display(), error = %e, "failed to write page number debug crop");
            }
        }
        prepared
    }
}
