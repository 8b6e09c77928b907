//! Printed page number module
//!
//! Reads the page number printed in a page's header or footer strip.
//!
//! - Fixed-fraction search regions (top/bottom x left/center/right)
//! - Image normalisation before OCR
//! - Arabic and canonical Roman numeral parsing
//! - External `tesseract` engine with a per-call timeout

mod detect;
mod ocr;
mod parse;
mod regions;
mod types;

// Re-export public API
pub use detect::{extract_printed_page_number, ink_bbox, prepare_for_ocr, PageNumberExtractor};
pub use ocr::{which_tesseract, OcrEngine, OcrError, TesseractCli};
pub use parse::{extract_digits, parse_roman_numeral, read_numeral, NumeralReading};
pub use regions::build_page_num_regions;
pub use types::{
    Anchor, DarkBboxOptions, ExtractionFailure, ExtractionResult, NumeralKind, PageNumberError,
    PageNumberOptions, PageNumberOptionsBuilder, PageNumberRegion, ParserMode, Position, Result,
    DEFAULT_MAX_PAGE, DEFAULT_OCR_TIMEOUT_SECS, DEFAULT_PSM_CANDIDATES, DEFAULT_ROMAN_WHITELIST,
    DIGIT_WHITELIST,
};
