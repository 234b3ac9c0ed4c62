//! Accounting-numeral normalization.
//!
//! Statement text prints amounts with `.` as thousands separator, `,` as
//! decimal separator, parentheses for negatives, and the occasional unicode
//! dash (`1.234,56`, `(2.500,00)`, `−125`). Everything here folds those
//! conventions into a plain signed `f64`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());

/// Parse an accounting-formatted token into a signed value.
///
/// Returns `None` when the token carries no numeral at all; an unparsable
/// amount is a missing value, never an error.
pub fn normalize_numeral(raw: &str) -> Option<f64> {
    let mut s = raw.to_string();

    // Parentheses mean negative in accounting notation.
    let negative = s.contains('(') && s.contains(')');
    if negative {
        s = s.replace(['(', ')'], "");
    }

    s = s
        .replace('\u{2212}', "-")
        .replace('\u{2013}', "-")
        .replace('\u{2014}', "-");
    s.retain(|c| !c.is_whitespace());
    // 1.234,56 -> 1234.56
    s = s.replace('.', "").replace(',', ".");

    let matched = NUMBER_RE.find(&s)?;
    let value: f64 = matched.as_str().parse().ok()?;

    // An already-negative numeral inside parentheses keeps a single sign.
    if negative && value >= 0.0 {
        Some(-value)
    } else {
        Some(value)
    }
}

/// Normalize a JSON value from a completion response into a signed float.
///
/// Bare numbers pass through untouched; strings go through
/// [`normalize_numeral`]; anything else is a missing value.
pub fn normalize_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => normalize_numeral(s),
        _ => None,
    }
}

/// Coerce a per-field confidence from a completion response into `[0, 1]`.
pub fn coerce_confidence(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    raw.map(|c| c.clamp(0.0, 1.0))
}
