use chrono::NaiveDate;
use regex::{Captures, Regex};

/// Extraction failure for a single field. The page URL is attached by the
/// caller, see [`crate::extractor::ExportError::Parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to parse {field}: {reason}")]
pub struct ParseError {
    pub field: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn no_match(field: &str, pattern: &Regex) -> Self {
        Self::new(field, format!("pattern '{}' did not match", pattern.as_str()))
    }
}

/// How a locale writes numbers: grouping punctuation, decimal mark and the
/// magnitude words that may trail a numeral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberFormat {
    pub grouping: &'static [char],
    pub decimal: char,
    pub magnitudes: &'static [(&'static str, f64)],
}

impl NumberFormat {
    pub const CHINESE: NumberFormat = NumberFormat {
        grouping: &[',', '，', ' ', '\u{a0}'],
        decimal: '.',
        magnitudes: &[("亿", 1e8), ("万", 1e4)],
    };

    /// Parses a numeral, applying a trailing magnitude word if present.
    pub fn parse(&self, raw: &str) -> Result<f64, String> {
        let mut digits = raw.trim();
        let mut scale = 1.0;
        for (word, factor) in self.magnitudes {
            if let Some(stripped) = digits.strip_suffix(word) {
                digits = stripped.trim_end();
                scale = *factor;
                break;
            }
        }

        let normalized: String = digits
            .chars()
            .filter(|c| !self.grouping.contains(c))
            .map(|c| if c == self.decimal { '.' } else { c })
            .collect();

        if normalized.is_empty() {
            return Err(format!("no numeral in '{}'", raw));
        }

        normalized
            .parse::<f64>()
            .map(|value| value * scale)
            .map_err(|_| format!("invalid numeral '{}'", raw))
    }
}

/// Runs `pattern` over `text`, reporting a miss against `field`.
pub fn captures<'t>(
    text: &'t str,
    pattern: &Regex,
    field: &str,
) -> Result<Captures<'t>, ParseError> {
    pattern
        .captures(text)
        .ok_or_else(|| ParseError::no_match(field, pattern))
}

/// Extracts a calendar date from the numeric groups of `pattern`.
///
/// Captured components are joined with single spaces before being handed to
/// chrono, so `format` reads like `"%Y %m %d"`.
pub fn extract_date(text: &str, pattern: &Regex, format: &str) -> Result<NaiveDate, ParseError> {
    let caps = captures(text, pattern, "date")?;
    date_from_captures(&caps, format)
}

pub fn date_from_captures(caps: &Captures, format: &str) -> Result<NaiveDate, ParseError> {
    let joined = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    NaiveDate::parse_from_str(&joined, format)
        .map_err(|e| ParseError::new("date", format!("invalid date '{}': {}", joined, e)))
}

/// Extracts the count captured by group 1 of `pattern`.
pub fn extract_count(
    text: &str,
    pattern: &Regex,
    field: &str,
    number_format: &NumberFormat,
) -> Result<u64, ParseError> {
    let caps = captures(text, pattern, field)?;
    let raw = caps
        .get(1)
        .ok_or_else(|| ParseError::new(field, "numeral group did not participate"))?;
    let value = number_format
        .parse(raw.as_str())
        .map_err(|reason| ParseError::new(field, reason))?;
    to_count(value, field)
}

pub fn combine_magnitudes(big: f64, big_scale: f64, small: f64, small_scale: f64) -> u64 {
    (big * big_scale + small * small_scale).round() as u64
}

/// Reads the `big` and `small` numeral groups and combines them. Both groups
/// are required; an unreported group is an error, never zero.
pub fn extract_magnitude_pair(
    caps: &Captures,
    field: &str,
    big_scale: f64,
    small_scale: f64,
    number_format: &NumberFormat,
) -> Result<u64, ParseError> {
    let group = |name: &str| -> Result<f64, ParseError> {
        let raw = caps
            .name(name)
            .ok_or_else(|| ParseError::new(field, format!("missing numeral group '{}'", name)))?;
        number_format
            .parse(raw.as_str())
            .map_err(|reason| ParseError::new(field, reason))
    };

    let big = group("big")?;
    let small = group("small")?;
    to_count(big * big_scale + small * small_scale, field)?;
    Ok(combine_magnitudes(big, big_scale, small, small_scale))
}

fn to_count(value: f64, field: &str) -> Result<u64, ParseError> {
    if !value.is_finite() || value < 0.0 || value > u64::MAX as f64 {
        return Err(ParseError::new(field, format!("{} is not a valid count", value)));
    }
    Ok(value.round() as u64)
}
