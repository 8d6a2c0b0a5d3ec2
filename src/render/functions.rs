//! formatting helpers exposed to message templates
//!
//! Every helper works on strings so the registry stays independent of the
//! template engine binding it. Malformed numeric input never aborts a
//! render: it degrades to `"0"`, the unchanged input or an empty string and
//! gets logged.

use serde_json::Value;
use thiserror::Error;

/// binary magnitudes, one division by 1024 per step
const BINARY_UNITS: &[&str] = &["Kb", "Mb", "Gb", "Tb", "Pb", "Eb", "Zb", "Yb"];
/// decimal magnitudes, one division by 1000 per step
const DECIMAL_UNITS: &[&str] = &["K", "M", "G", "T", "P", "E", "Z", "Y"];

/// separator inside a unit spec string
const UNIT_SPEC_SEPARATOR: char = '|';

/// problems in the `unit|suffix|startExponent` spec string itself; values
/// never error, only the spec does
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitSpecError {
    #[error("start exponent {0:?} is not a small integer")]
    StartExponent(String),
}

/// Scales `value` according to a spec of the form `unit|suffix|startExponent`.
///
/// `unit` selects the conversion: `kb` divides by 1024 through Kb..Yb, `s`
/// divides by 1000 through K..Y, `f` formats a float, anything else formats
/// an integer. `startExponent` says which magnitude the input already has,
/// e.g. `2` for a value that is already in Gb. The `suffix` is appended
/// literally after the derived unit symbol.
pub fn format_measure_unit(spec: &str, value: &str) -> Result<String, UnitSpecError> {
    let mut parts = spec.trim().splitn(3, UNIT_SPEC_SEPARATOR);
    let unit = parts.next().unwrap_or_default();
    let suffix = parts.next();
    let start = match parts.next() {
        Some(raw) => raw
            .parse::<i8>()
            .map_err(|_| UnitSpecError::StartExponent(raw.to_string()))?
            as i64,
        None => 0,
    };

    let mut out = match unit {
        "kb" => scale(value, start, BINARY_UNITS, 1024.0, ""),
        "s" => scale(value, start, DECIMAL_UNITS, 1000.0, "Y"),
        "f" => format_float(value),
        _ => format_int(value),
    };

    if let Some(suffix) = suffix {
        out.push_str(suffix);
    }

    Ok(out)
}

/// Divides `value` by `step` until the magnitude fits, then renders it with
/// two decimals and the reached unit symbol. The comparison is a strict `>`
/// so a value sitting exactly on a boundary keeps the lower unit. A negative
/// start exponent that never climbs back to zero renders `fallback` as the
/// unit symbol: empty for the binary family, `Y` for the decimal one.
fn scale(value: &str, start: i64, units: &[&str], step: f64, fallback: &str) -> String {
    let mut scaled: f64 = match value.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!(value, "measure unit scaling got a non-numeric value");
            return String::new();
        }
    };

    let mut exponent = start;
    let unit = loop {
        if exponent >= units.len() as i64 {
            break units[units.len() - 1];
        }
        if scaled > step {
            scaled /= step;
            exponent += 1;
        } else if exponent >= 0 {
            break units[exponent as usize];
        } else {
            break fallback;
        }
    };

    format!("{scaled:.2} {unit}")
}

/// Parses and re-renders a float rounded half-up to two decimals with
/// minimal digits. Non-finite input passes through unchanged, anything
/// unparsable renders as zero.
pub fn format_float(value: &str) -> String {
    let parsed: f64 = match value.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!(value, "could not parse float, rendering 0");
            0.0
        }
    };

    if !parsed.is_finite() {
        return value.to_string();
    }

    round_half_up(parsed, 2).to_string()
}

/// Parses and re-renders a base 10 integer; unparsable input renders as "0".
pub fn format_int(value: &str) -> String {
    let parsed: i64 = match value.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!(value, "could not parse integer, rendering 0");
            0
        }
    };

    parsed.to_string()
}

/// Rounds half-up on the absolute value, preserving the sign, so 2.345
/// becomes 2.35 and -2.345 becomes -2.35.
pub fn round_half_up(x: f64, decimals: i32) -> f64 {
    if x.is_nan() || x.is_infinite() {
        return x;
    }

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let magnitude = x.abs();

    let pow = 10f64.powi(decimals);
    let shifted = magnitude * pow;
    let rounded = if shifted.fract() >= 0.5 {
        shifted.ceil()
    } else {
        shifted.floor()
    };

    rounded / pow * sign
}

/// Parses an rfc3339 timestamp and renders it in `zone` using the strftime
/// `pattern`. Unparsable input is logged and passed through unchanged.
pub fn format_date(value: &str, zone: chrono_tz::Tz, pattern: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(value) {
        Ok(timestamp) => timestamp.with_timezone(&zone).format(pattern).to_string(),
        Err(err) => {
            tracing::warn!(value, error = %err, "could not parse timestamp");
            value.to_string()
        }
    }
}

/// Substring containment test.
pub fn contains(haystack: &str, needle: &str) -> bool {
    haystack.contains(needle)
}

/// True when `map` is an object holding `key`.
pub fn has_key(map: &Value, key: &str) -> bool {
    matches!(map, Value::Object(object) if object.contains_key(key))
}

pub fn add(a: i64, b: i64) -> i64 {
    a + b
}

/// Uppercases the first letter of every word.
pub fn title(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;

    for c in input.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }

    out
}
