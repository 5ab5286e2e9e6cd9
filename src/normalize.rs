//! Numeric normalization for instrument values.
//!
//! Converts vendor units into SI, maps "not applicable" sentinels to
//! absent values, converts Cartesian moments to declination/inclination
//! and removes binary floating point noise from formatted numbers.

use crate::constants::NOT_APPLICABLE_SENTINELS;
use crate::models::{Moment, NormalizedRecord, RawRecord, StepHint};
use crate::protocol::Energy;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

/// A run of five or more zeros or nines somewhere in the decimals
static DIGIT_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d*\.\d*(0{5,}|9{5,})\d*$").expect("digit noise pattern is valid")
});

/// Parse a numeric field, without sentinel handling
pub fn parse_number(raw: &str) -> Option<f64> {
    let value = raw.trim().trim_matches('"').trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a numeric field, mapping empty, unparsable and sentinel values to `None`
pub fn parse_value(raw: &str) -> Option<f64> {
    parse_number(raw).filter(|v| !NOT_APPLICABLE_SENTINELS.contains(v))
}

pub fn microtesla_to_tesla(value: f64) -> f64 {
    value * 1e-6
}

pub fn millitesla_to_tesla(value: f64) -> f64 {
    value * 1e-3
}

pub fn nanotesla_to_tesla(value: f64) -> f64 {
    value * 1e-9
}

/// Oersted to tesla (free-space equivalent)
pub fn oersted_to_tesla(value: f64) -> f64 {
    value * 1e-4
}

pub fn celsius_to_kelvin(value: f64) -> f64 {
    value + 273.0
}

pub fn millimeters_to_meters(value: f64) -> f64 {
    value * 1e-3
}

pub fn micrometers_to_meters(value: f64) -> f64 {
    value * 1e-6
}

/// Convert moment components in nAm² to magnitude (Am²) and direction.
///
/// Declination is in [0, 360); the zero vector has zero direction.
pub fn moment_from_cartesian(x: f64, y: f64, z: f64) -> Moment {
    let (x, y, z) = (x * 1e-9, y * 1e-9, z * 1e-9);
    let magnitude = (x * x + y * y + z * z).sqrt();
    if magnitude == 0.0 {
        return Moment {
            magnitude,
            declination: 0.0,
            inclination: 0.0,
        };
    }
    let declination = y.atan2(x).to_degrees().rem_euclid(360.0);
    let inclination = (z / magnitude).asin().to_degrees();
    Moment {
        magnitude,
        declination,
        inclination,
    }
}

/// Remove floating point noise from a formatted number.
///
/// `3.00000007` becomes `3` and `2.99999994` becomes `3`: when the digits
/// hold a run of at least five zeros or nines and the third digit from
/// the end belongs to that run, the last two digits are dropped along
/// with the run, rounding up on nines. Other strings are returned as is.
pub fn normalize_digits(value: &str) -> String {
    let (sign, unsigned) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value),
    };
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(index) => unsigned.split_at(index),
        None => (unsigned, ""),
    };

    match collapse_noise(mantissa) {
        Some(collapsed) => format!("{}{}{}", sign, collapsed, exponent),
        None => value.to_string(),
    }
}

fn collapse_noise(mantissa: &str) -> Option<String> {
    if !DIGIT_NOISE.is_match(mantissa) {
        return None;
    }
    let (_, decimals) = mantissa.split_once('.')?;
    if decimals.len() < 3 {
        return None;
    }

    let head = &mantissa[..mantissa.len() - 2];
    match decimals.as_bytes()[decimals.len() - 3] {
        b'0' => {
            let trimmed = head.trim_end_matches('0').trim_end_matches('.');
            Some(if trimmed.is_empty() {
                "0".to_string()
            } else {
                trimmed.to_string()
            })
        }
        b'9' => Some(round_up(head.trim_end_matches('9'))),
        _ => None,
    }
}

/// Increment the last remaining digit; a dangling point increments the integer part
fn round_up(digits: &str) -> String {
    if let Some(integer) = digits.strip_suffix('.') {
        return increment_integer(integer);
    }
    let mut result = digits.to_string();
    if let Some(last) = result.pop() {
        match last.to_digit(10) {
            Some(d) if d < 9 => {
                result.push(char::from_digit(d + 1, 10).unwrap_or(last));
            }
            _ => result.push(last),
        }
    }
    result
}

fn increment_integer(integer: &str) -> String {
    let mut digits: Vec<u8> = integer.bytes().collect();
    let mut index = digits.len();
    loop {
        if index == 0 {
            digits.insert(0, b'1');
            break;
        }
        index -= 1;
        if digits[index] == b'9' {
            digits[index] = b'0';
        } else {
            digits[index] += 1;
            break;
        }
    }
    String::from_utf8(digits).unwrap_or_default()
}

/// Shortest round-trip representation, integers without a fractional part.
///
/// Magnitudes outside [1e-4, 1e16) use scientific notation with a
/// two-digit signed exponent (`1.5e-09`).
pub fn stringify(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return pad_exponent(&format!("{:e}", value));
    }
    format!("{}", value)
}

/// Scientific notation with fixed mantissa precision (`5.000e-05`)
pub fn format_sci(value: f64, precision: usize) -> String {
    pad_exponent(&format!("{:.*e}", precision, value))
}

/// Fixed-point formatting
pub fn format_fixed(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

fn pad_exponent(formatted: &str) -> String {
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted.to_string(),
    }
}

/// Format a value for output with noise removed
pub fn clean(value: f64) -> String {
    normalize_digits(&stringify(value))
}

/// Parse `MM-DD-YYYY` or `MM/DD/YYYY` plus `HH:MM:SS` into `YYYY:MM:DD:HH:MM:SS`
pub fn parse_timestamp(date: &str, time: &str) -> Option<String> {
    let date = date.trim().trim_matches('"');
    let time = time.trim().trim_matches('"');

    let date_format = if date.contains('-') {
        "%m-%d-%Y"
    } else if date.contains('/') {
        "%m/%d/%Y"
    } else {
        return None;
    };
    let date = NaiveDate::parse_from_str(date, date_format).ok()?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .ok()?;

    Some(
        NaiveDateTime::new(date, time)
            .format("%Y:%m:%d:%H:%M:%S")
            .to_string(),
    )
}

/// Build a normalized record; returns warnings for values that could not be read
pub fn normalize_record(raw: RawRecord, energy: Energy) -> (NormalizedRecord, Vec<String>) {
    let mut warnings = Vec::new();

    let treatment = match energy {
        Energy::Thermal => parse_value(&raw.th_peak_temperature),
        Energy::Microwave => parse_value(&raw.step_number),
        Energy::AlternatingField => parse_value(&raw.af_peak_field),
    };

    let moment = match (
        parse_number(&raw.moment_x),
        parse_number(&raw.moment_y),
        parse_number(&raw.moment_z),
    ) {
        (Some(x), Some(y), Some(z)) => Some(moment_from_cartesian(x, y, z)),
        _ => {
            warnings.push(format!(
                "moment components ({}, {}, {}) could not be parsed",
                raw.moment_x, raw.moment_y, raw.moment_z
            ));
            None
        }
    };

    let timestamp = parse_timestamp(&raw.date, &raw.time);
    if timestamp.is_none() {
        warnings.push(format!(
            "unrecognised measurement date '{}' / time '{}'; use MM-DD-YYYY or MM/DD/YYYY and HH:MM:SS",
            raw.date, raw.time
        ));
    }

    let record = NormalizedRecord {
        treatment,
        lab_field: parse_value(&raw.field_intensity),
        lab_field_dec: parse_value(&raw.field_dec),
        lab_field_inc: parse_value(&raw.field_inc),
        af_peak: parse_value(&raw.af_peak_field),
        th_peak: parse_value(&raw.th_peak_temperature),
        moment,
        timestamp,
        hint: StepHint::parse(&raw.step_type),
        raw,
    };
    (record, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_digits_laws() {
        assert_eq!(normalize_digits("3.00000007"), "3");
        assert_eq!(normalize_digits("2.99999994"), "3");
        assert_eq!(normalize_digits("1.5"), "1.5");
    }

    #[test]
    fn test_normalize_digits_keeps_significant_decimals() {
        assert_eq!(normalize_digits("1.2300000045"), "1.23");
        assert_eq!(normalize_digits("2.5999999912"), "2.6");
        assert_eq!(normalize_digits("19.99999997"), "20");
        assert_eq!(normalize_digits("0.1234"), "0.1234");
        assert_eq!(normalize_digits("0.0000001234"), "0.0000001234");
    }

    #[test]
    fn test_normalize_digits_sign_and_exponent() {
        assert_eq!(normalize_digits("-3.00000007"), "-3");
        assert_eq!(normalize_digits("1.2000000003e-09"), "1.2e-09");
        assert_eq!(normalize_digits("4.9999999991e-07"), "5e-07");
        assert_eq!(normalize_digits("abc"), "abc");
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(3.0), "3");
        assert_eq!(stringify(0.25), "0.25");
        assert_eq!(stringify(1.5e-9), "1.5e-09");
        assert_eq!(stringify(2e20), "2e+20");
        assert_eq!(stringify(0.0), "0");
    }

    #[test]
    fn test_format_sci() {
        assert_eq!(format_sci(5e-5, 3), "5.000e-05");
        assert_eq!(format_sci(0.0, 3), "0.000e+00");
        assert_eq!(format_sci(1.2346e-8, 3), "1.235e-08");
    }

    #[test]
    fn test_parse_value_sentinels() {
        assert_eq!(parse_value("999"), None);
        assert_eq!(parse_value("-99"), None);
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("abc"), None);
        assert_eq!(parse_value("0"), Some(0.0));
        assert_eq!(parse_value(" 40.5 "), Some(40.5));
        assert_eq!(parse_number("999"), Some(999.0));
    }

    #[test]
    fn test_moment_from_cartesian() {
        let m = moment_from_cartesian(0.0, 0.0, 10.0);
        assert!((m.magnitude - 1e-8).abs() < 1e-20);
        assert!((m.inclination - 90.0).abs() < 1e-9);

        let m = moment_from_cartesian(0.0, -5.0, 0.0);
        assert!((m.declination - 270.0).abs() < 1e-9);
        assert!(m.inclination.abs() < 1e-9);

        let m = moment_from_cartesian(0.0, 0.0, 0.0);
        assert_eq!(m.magnitude, 0.0);
        assert_eq!(m.declination, 0.0);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("11-05-2013", "14:03:59"),
            Some("2013:11:05:14:03:59".to_string())
        );
        assert_eq!(
            parse_timestamp("\"01/31/2012\"", "\"09:15:00\""),
            Some("2012:01:31:09:15:00".to_string())
        );
        assert_eq!(parse_timestamp("2013.11.05", "14:03:59"), None);
    }

    #[test]
    fn test_normalize_record_treatment_source() {
        let raw = RawRecord {
            th_peak_temperature: "350".to_string(),
            step_number: "7".to_string(),
            af_peak_field: "999".to_string(),
            field_intensity: "40".to_string(),
            moment_x: "1".to_string(),
            moment_y: "1".to_string(),
            moment_z: "1".to_string(),
            date: "11-05-2013".to_string(),
            time: "14:03:59".to_string(),
            ..Default::default()
        };
        let (thermal, warnings) = normalize_record(raw.clone(), Energy::Thermal);
        assert!(warnings.is_empty());
        assert_eq!(thermal.treatment, Some(350.0));
        assert_eq!(thermal.af_peak, None);
        assert_eq!(thermal.lab_field, Some(40.0));

        let (microwave, _) = normalize_record(raw, Energy::Microwave);
        assert_eq!(microwave.treatment, Some(7.0));
    }
}
