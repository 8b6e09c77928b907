//! Numeral parsing for OCR output

use std::sync::LazyLock;

use regex::Regex;

use super::types::NumeralKind;

/// Canonical subtractive notation; `IIII`, `VX`, `IC` and friends do not match
static ROMAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^M*(CM|CD|D?C{0,3})(XC|XL|L?X{0,3})(IX|IV|V?I{0,3})$")
        .unwrap_or_else(|e| panic!("invalid roman numeral pattern: {e}"))
});

/// Outcome of reading one OCR string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumeralReading {
    /// A page number in `[1, max_page]` and the text it was read from
    Accepted { value: u32, text: String },
    /// Numerals were present but the value is outside `[1, max_page]`
    OutOfRange,
    /// Nothing usable in the text
    Empty,
}

/// Parse a Roman numeral written in canonical subtractive notation.
///
/// Input is upper-cased and stripped of whitespace before matching.
pub fn parse_roman_numeral(text: &str) -> Option<u32> {
    let text: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if text.is_empty() || !ROMAN_RE.is_match(&text) {
        return None;
    }

    let values: Vec<u32> = text.chars().filter_map(roman_digit_value).collect();
    let mut total = 0u32;
    let mut i = 0;
    while i < values.len() {
        let value = values[i];
        match values.get(i + 1) {
            // Subtractive pair such as IV or CM counts as one numeral.
            Some(&next) if next > value => {
                total = total.saturating_add(next - value);
                i += 2;
            }
            _ => {
                total = total.saturating_add(value);
                i += 1;
            }
        }
    }
    Some(total)
}

fn roman_digit_value(c: char) -> Option<u32> {
    match c {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    }
}

/// Concatenated ASCII digits of `text`, or `None` when there are none
pub fn extract_digits(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

/// Interpret OCR output of the given kind as a printed page number.
pub fn read_numeral(text: &str, kind: NumeralKind, max_page: u32) -> NumeralReading {
    let (value, cleaned) = match kind {
        NumeralKind::Arabic => {
            let Some(digits) = extract_digits(text) else {
                return NumeralReading::Empty;
            };
            // Too many digits for u64 is out of range, not unreadable.
            (digits.parse::<u64>().ok(), digits)
        }
        NumeralKind::Roman => {
            let cleaned: String = text.split_whitespace().collect::<String>().to_uppercase();
            if cleaned.is_empty() {
                return NumeralReading::Empty;
            }
            match parse_roman_numeral(&cleaned) {
                Some(value) => (Some(value as u64), cleaned),
                None => return NumeralReading::Empty,
            }
        }
    };

    match value {
        Some(value) if value >= 1 && value <= max_page as u64 => NumeralReading::Accepted {
            value: value as u32,
            text: cleaned,
        },
        _ => NumeralReading::OutOfRange,
    }
}
