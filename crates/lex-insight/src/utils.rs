//! Shared utilities for the analysis pipeline.
//!
//! This module contains common helper functions used across multiple modules
//! to keep parsing and numeric conventions consistent between components.

use polars::prelude::DataType;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a polars DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

// =============================================================================
// Missing Value Utilities
// =============================================================================

/// Null-like tokens canonicalized to the missing sentinel by default.
///
/// Matching is done on the trimmed cell, ignoring ASCII case. The empty
/// string is always treated as missing.
pub const DEFAULT_MISSING_TOKENS: [&str; 8] = [
    "", "na", "n/a", "nan", "null", "none", "#n/a", "missing",
];

/// Default missing tokens as owned strings (for configuration structs).
pub fn default_missing_tokens() -> Vec<String> {
    DEFAULT_MISSING_TOKENS.iter().map(|t| t.to_string()).collect()
}

/// Check if a raw cell is a missing-value token.
///
/// # Example
///
/// ```rust,ignore
/// use lex_insight::utils::{default_missing_tokens, is_missing_token};
///
/// let tokens = default_missing_tokens();
/// assert!(is_missing_token("  N/A ", &tokens));
/// assert!(is_missing_token("", &tokens));
/// assert!(!is_missing_token("42", &tokens));
/// ```
pub fn is_missing_token(cell: &str, tokens: &[String]) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || tokens.iter().any(|t| t.trim().eq_ignore_ascii_case(trimmed))
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Try to parse a text cell as a finite real number.
///
/// Integers and floats both qualify. Non-finite spellings such as `inf`
/// are rejected so a numeric column never carries infinities.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the boolean literals `true` / `false` (ASCII case-insensitive).
pub fn parse_boolean_string(s: &str) -> Option<bool> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// =============================================================================
// Numeric Utilities
// =============================================================================

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// True when every value is identical (vacuously true for fewer than two).
///
/// Decided on the raw values: the mean of `[0.1; n]` is not exactly 0.1, so
/// a variance computed from it is tiny but not zero.
pub fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[0] == pair[1])
}

/// Sample standard deviation (denominator n - 1).
///
/// Returns `None` for an empty slice and `0.0` for a single value or
/// identical values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let n = values.len();
    if n <= 1 || is_constant(values) {
        return Some(0.0);
    }

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(variance.sqrt())
}

/// Quantile of an ascending-sorted slice by linear interpolation between
/// order statistics (position `p * (n - 1)`).
///
/// `p` is clamped to `[0, 1]`. Returns `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }

    let position = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Return a sorted copy of the values.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Median of an unsorted slice.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile_sorted(&sorted_copy(values), 0.5)
}
