// Helpers for loosely typed cell values, number formatting and ordering.
//
// Spreadsheet exports mix numbers and numeric strings freely, so everything
// that reads a metric goes through `value_as_f64` and the rest of the code
// can assume plain `f64`s.
use chrono::Month;
use num_format::{Locale, ToFormattedString};
use serde_json::Value;
use std::cmp::Ordering;

/// Parse a string-like value into `f64`.
///
/// - Trims whitespace.
/// - Returns `None` for empty input, non-numeric text and non-finite results
///   (`"NaN"`, `"inf"`).
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_i64_safe(s: Option<&str>) -> Option<i64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>().ok()
}

/// Numeric reading of a cell: numbers as-is, numeric strings parsed,
/// anything else (missing, null, bool, text) is 0.
pub fn value_as_f64(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        Some(Value::String(s)) => parse_f64_safe(Some(s)).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Integer reading of a cell; floats are accepted only when they carry no
/// fractional part (spreadsheets often store `2026` as `2026.0`).
pub fn value_as_i64(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => parse_i64_safe(Some(s)).or_else(|| {
            parse_f64_safe(Some(s))
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Label of a grouping cell. Missing, null, empty, `false` and `0` fall into
/// `fallback`.
pub fn group_label(v: Option<&Value>, fallback: &str) -> String {
    match v {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) if n.as_f64().map_or(false, |f| f != 0.0) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => fallback.to_string(),
    }
}

pub fn round2(v: f64) -> f64 {
    let r = (v * 100.0).round() / 100.0;
    // avoid printing "-0.00"
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Case-insensitive ordering that compares embedded digit runs by numeric
/// value, so `"Line 2"` sorts before `"Line 10"`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ca = Chunks::new(a);
    let mut cb = Chunks::new(b);
    loop {
        match (ca.next(), cb.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
                    (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
                    (Chunk::Text(x), Chunk::Text(y)) => x
                        .chars()
                        .flat_map(char::to_lowercase)
                        .cmp(y.chars().flat_map(char::to_lowercase)),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(if digits {
            Chunk::Digits(head)
        } else {
            Chunk::Text(head)
        })
    }
}

/// English month name, or the bare number when out of range.
pub fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_else(|| month.to_string())
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus thousands separators (e.g. `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_reading_is_forgiving() {
        assert_eq!(value_as_f64(Some(&json!(12.5))), 12.5);
        assert_eq!(value_as_f64(Some(&json!(" 7 "))), 7.0);
        assert_eq!(value_as_f64(Some(&json!("abc"))), 0.0);
        assert_eq!(value_as_f64(Some(&json!(null))), 0.0);
        assert_eq!(value_as_f64(Some(&json!(true))), 0.0);
        assert_eq!(value_as_f64(None), 0.0);
    }

    #[test]
    fn integer_reading_accepts_whole_floats_only() {
        assert_eq!(value_as_i64(Some(&json!(2026))), Some(2026));
        assert_eq!(value_as_i64(Some(&json!(2026.0))), Some(2026));
        assert_eq!(value_as_i64(Some(&json!("02"))), Some(2));
        assert_eq!(value_as_i64(Some(&json!(2.5))), None);
        assert_eq!(value_as_i64(Some(&json!(""))), None);
        assert_eq!(value_as_i64(Some(&json!(null))), None);
    }

    #[test]
    fn group_label_falls_back_on_blank_values() {
        assert_eq!(group_label(Some(&json!("ACME")), "Unknown"), "ACME");
        assert_eq!(group_label(Some(&json!(42)), "Unknown"), "42");
        assert_eq!(group_label(Some(&json!("")), "Unknown"), "Unknown");
        assert_eq!(group_label(Some(&json!(0)), "Unknown"), "Unknown");
        assert_eq!(group_label(None, "Unknown"), "Unknown");
    }

    #[test]
    fn natural_order_compares_digit_runs_numerically() {
        let mut lines = vec!["Line 10", "line 2", "Line 1", "Extrusion", "Line 02b"];
        lines.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(lines, vec!["Extrusion", "Line 1", "line 2", "Line 02b", "Line 10"]);
        assert_eq!(natural_cmp("A", "a"), Ordering::Equal);
        assert_eq!(natural_cmp("9", "10"), Ordering::Less);
    }

    #[test]
    fn rounding_and_formatting() {
        assert_eq!(round2(3.2258), 3.23);
        assert_eq!(round2(-0.001), 0.0);
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-12.5, 1), "-12.5");
        assert_eq!(format_number(3.0, 0), "3");
        assert_eq!(format_int(9855), "9,855");
    }

    #[test]
    fn month_names() {
        assert_eq!(month_name(2), "February");
        assert_eq!(month_name(13), "13");
    }
}
