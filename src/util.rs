// Utility helpers for parsing and basic statistics.
//
// This module centralizes all the "dirty" spreadsheet-export handling
// (Brazilian number formats, mixed date formats) so the rest of the code can
// assume clean, typed values. It also owns the display formatting used by the
// report tables.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{CustomFormat, Grouping, ToFormattedString};
use once_cell::sync::Lazy;

/// Sentinel shown for a mean or sum that is undefined (empty subset).
pub const MISSING: &str = "—";

// pt-BR grouping: `1.234.567`.
static BR_FORMAT: Lazy<CustomFormat> = Lazy::new(|| {
    CustomFormat::builder()
        .grouping(Grouping::Standard)
        .separator(".")
        .minus_sign("-")
        .build()
        .unwrap_or_default()
});

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
];

/// Parse a string-like value into `f64` while being forgiving about the
/// formats spreadsheet exports produce.
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Strips a leading `R$` and whitespace.
/// - Honors SAP-style trailing minus (`100,00-`).
/// - When both `.` and `,` appear, the last one is the decimal separator.
/// - A lone `,` is a decimal comma; a lone `.` is a decimal point; repeated
///   `.` with no `,` are thousands separators.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    let s = s.strip_prefix("R$").unwrap_or(s).trim();
    if s.is_empty() {
        return None;
    }
    let (s, negate) = match s.strip_suffix('-') {
        Some(rest) => (rest.trim_end(), true),
        None => (s, false),
    };
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) => s.replace(',', "."),
        // `1.234.567`: several dots can only be thousands grouping.
        (Some(_), None) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s,
    };
    let v = normalized.parse::<f64>().ok()?;
    if !v.is_finite() {
        return None;
    }
    Some(if negate { -v } else { v })
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    // Exports mix ISO dates, Brazilian dates and full timestamps.
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

/// Non-empty trimmed text, or `None`.
pub fn clean_text(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

pub fn mean(sum: f64, n: usize) -> Option<f64> {
    // `None` rather than NaN for an empty input.
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value the Brazilian way:
    // - a fixed number of decimal places after a `,`, and
    // - `.` thousands separators (e.g., `1.234.567,89`).
    let abs_n = n.abs();
    // First, format to a plain fixed-decimal string like `1234567.89`.
    let s = format!("{:.*}", decimals, abs_n);
    // The sign follows the rounded value: `-0.001` prints as `0,00`.
    let neg = n < 0.0 && s.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    // Use `num-format` to group the integer portion.
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&*BR_FORMAT);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push(',');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

/// Currency card value: `R$ 1.234,56`, or the sentinel when undefined.
pub fn format_brl(n: Option<f64>) -> String {
    match n {
        Some(v) => format!("R$ {}", format_number(v, 2)),
        None => MISSING.to_string(),
    }
}

/// Plain decimal value with two places, or the sentinel when undefined.
pub fn format_opt(n: Option<f64>) -> String {
    match n {
        Some(v) => format_number(v, 2),
        None => MISSING.to_string(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages
    // (e.g., `9.855 linhas`).
    n.to_formatted_string(&*BR_FORMAT)
}
