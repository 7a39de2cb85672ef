//! Conversions between UPnP duration strings and seconds.
//!
//! AVTransport reports times as `H+:MM:SS[.F+]`. Renderers that cannot
//! report a value answer `NOT_IMPLEMENTED` or `-:--:--` instead.

use crate::errors::ControlPointError;

/// Largest value `format_duration` can render.
pub const MAX_FORMATTED_SECONDS: u32 = 99 * 3600 + 59 * 60 + 59;

const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
const UNKNOWN_TIME: &str = "-:--:--";

/// Formats seconds as `HH:MM:SS`, clamping at `99:59:59`.
///
/// # Examples
/// ```
/// # use dmccontrol::time_utils::format_duration;
/// assert_eq!(format_duration(0), "00:00:00");
/// assert_eq!(format_duration(3723), "01:02:03");
/// assert_eq!(format_duration(400_000), "99:59:59");
/// ```
pub fn format_duration(seconds: u32) -> String {
    let seconds = seconds.min(MAX_FORMATTED_SECONDS);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Parses `H:MM:SS`, `H:MM:SS.frac`, `MM:SS` or a bare number of seconds.
///
/// Fractional seconds are discarded. Minutes and seconds must be below 60
/// whenever a colon is present.
///
/// # Examples
/// ```
/// # use dmccontrol::time_utils::parse_duration;
/// assert_eq!(parse_duration("1:02:03").unwrap(), 3723);
/// assert_eq!(parse_duration("0:04:10.500").unwrap(), 250);
/// assert_eq!(parse_duration("02:03").unwrap(), 123);
/// assert_eq!(parse_duration("42").unwrap(), 42);
/// assert!(parse_duration("1:2:3:4").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<u32, ControlPointError> {
    let trimmed = input.trim();
    let whole = strip_fraction(trimmed)
        .ok_or_else(|| invalid(input, "bad fractional part"))?;

    let parts: Vec<&str> = whole.split(':').collect();
    if parts.len() > 3 {
        return Err(invalid(input, "expected H:MM:SS, MM:SS or SS"));
    }

    let mut total = 0u32;
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(input, "non numeric component"));
        }
        let value: u32 = part
            .parse()
            .map_err(|_| invalid(input, "component out of range"))?;
        if index > 0 && value >= 60 {
            return Err(invalid(input, "minutes and seconds must be < 60"));
        }
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(value))
            .ok_or_else(|| invalid(input, "value overflows"))?;
    }

    Ok(total)
}

/// Parses a position or duration reported by a renderer.
///
/// Returns `Ok(None)` for the not-implemented sentinels.
pub fn parse_time_value(input: &str) -> Result<Option<u32>, ControlPointError> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case(NOT_IMPLEMENTED) || trimmed == UNKNOWN_TIME {
        return Ok(None);
    }
    parse_duration(trimmed).map(Some)
}

// `.F+` or `.F0/F1`; None when the suffix is not made of digits.
fn strip_fraction(input: &str) -> Option<&str> {
    match input.split_once('.') {
        None => Some(input),
        Some((whole, fraction)) => {
            let digits_ok = !fraction.is_empty()
                && fraction.bytes().all(|b| b.is_ascii_digit() || b == b'/');
            digits_ok.then_some(whole)
        }
    }
}

fn invalid(input: &str, reason: &str) -> ControlPointError {
    ControlPointError::InvalidTimeFormat(format!("'{}': {}", input, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(59), "00:00:59");
        assert_eq!(format_duration(61), "00:01:01");
        assert_eq!(format_duration(3661), "01:01:01");
        assert_eq!(format_duration(MAX_FORMATTED_SECONDS), "99:59:59");
        assert_eq!(format_duration(u32::MAX), "99:59:59");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0:00:00").unwrap(), 0);
        assert_eq!(parse_duration("00:03:25").unwrap(), 205);
        assert_eq!(parse_duration("12:00:01").unwrap(), 43201);
        assert_eq!(parse_duration("0:03:25.250").unwrap(), 205);
        assert_eq!(parse_duration("0:00:07.1/2").unwrap(), 7);
        assert_eq!(parse_duration("03:25").unwrap(), 205);
        assert_eq!(parse_duration(" 180 ").unwrap(), 180);

        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("1:aa:00").is_err());
        assert!(parse_duration("0:61:00").is_err());
        assert!(parse_duration("0:00:60").is_err());
        assert!(parse_duration("1::00").is_err());
        assert!(parse_duration("0:00:01.").is_err());
        assert!(parse_duration("-5").is_err());
        assert!(parse_duration("1:00:00:00").is_err());
    }

    #[test]
    fn test_parse_inverts_format() {
        for n in (0..360_000u32).step_by(37).chain([59, 60, 3599, 3600, 359_999]) {
            assert_eq!(parse_duration(&format_duration(n)).unwrap(), n, "n = {}", n);
        }
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(parse_time_value("NOT_IMPLEMENTED").unwrap(), None);
        assert_eq!(parse_time_value("-:--:--").unwrap(), None);
        assert_eq!(parse_time_value("0:01:00").unwrap(), Some(60));
        assert!(parse_time_value("garbage").is_err());
    }
}
