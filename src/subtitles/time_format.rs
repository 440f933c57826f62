//! Editable time text for cue boundaries.
//!
//! Cue times are edited as `HH:MM:SS.mmm`. Hours are at least two digits wide
//! and unbounded when formatting, but the parser only accepts one or two
//! digits per hour/minute/second group.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Result, YtSubError};

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

fn edit_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2}):(\d{1,2}):(\d{1,2})\.(\d{1,3})$").expect("edit time pattern is valid")
    })
}

/// Split milliseconds into (hours, minutes, seconds, millis)
fn split_ms(ms: u64) -> (u64, u64, u64, u64) {
    (
        ms / MS_PER_HOUR,
        (ms % MS_PER_HOUR) / MS_PER_MINUTE,
        (ms % MS_PER_MINUTE) / MS_PER_SECOND,
        ms % MS_PER_SECOND,
    )
}

/// Format milliseconds as `HH:MM:SS.mmm`
pub fn format_time(ms: u64) -> String {
    format_with_separator(ms, '.')
}

/// Format milliseconds with a custom millisecond separator (`,` for SRT)
pub(crate) fn format_with_separator(ms: u64, separator: char) -> String {
    let (hours, minutes, seconds, millis) = split_ms(ms);
    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, seconds, separator, millis)
}

/// Parse `HH:MM:SS.mmm` into milliseconds.
///
/// A short millisecond group is right-padded, so `"00:00:01.5"` is 1500 ms.
/// Anything that does not match the pattern parses as `0`; use
/// [`is_valid_time`] or [`parse_time_strict`] before trusting the value.
pub fn parse_time(text: &str) -> u64 {
    let Some(caps) = edit_time_regex().captures(text) else {
        return 0;
    };

    let field = |i: usize| caps[i].parse::<u64>().unwrap_or(0);
    let millis = format!("{:0<3}", &caps[4]).parse::<u64>().unwrap_or(0);

    field(1) * MS_PER_HOUR + field(2) * MS_PER_MINUTE + field(3) * MS_PER_SECOND + millis
}

/// Check that the text matches the edit pattern with minutes and seconds below 60
pub fn is_valid_time(text: &str) -> bool {
    let Some(caps) = edit_time_regex().captures(text) else {
        return false;
    };

    let minutes = caps[2].parse::<u64>().unwrap_or(u64::MAX);
    let seconds = caps[3].parse::<u64>().unwrap_or(u64::MAX);
    minutes < 60 && seconds < 60
}

/// Validate and parse in one step
pub fn parse_time_strict(text: &str) -> Result<u64> {
    if is_valid_time(text) {
        Ok(parse_time(text))
    } else {
        Err(YtSubError::InvalidTime(text.to_string()))
    }
}

/// Advisory window check: a window is valid when it has positive length.
///
/// Times are unsigned, so the lower bound of zero always holds.
pub fn is_valid_range(start_ms: u64, end_ms: u64) -> bool {
    end_ms > start_ms
}

/// Compact clock for display: `M:SS` below an hour, `H:MM:SS` above
pub fn format_clock(ms: u64) -> String {
    let (hours, minutes, seconds, _) = split_ms(ms);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00:00.000");
        assert_eq!(format_time(1500), "00:00:01.500");
        assert_eq!(format_time(3_661_001), "01:01:01.001");
        assert_eq!(format_time(100 * MS_PER_HOUR), "100:00:00.000");
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("00:00:01.500"), 1500);
        assert_eq!(parse_time("1:2:3.4"), 3_723_400);
        assert_eq!(parse_time("00:00:00.5"), 500);
        assert_eq!(parse_time("00:00:00.05"), 50);
        assert_eq!(parse_time("abc"), 0);
        assert_eq!(parse_time("00:00:01,500"), 0);
        assert_eq!(parse_time("100:00:00.000"), 0);
    }

    #[test]
    fn test_round_trip_below_a_day() {
        let samples = [0, 1, 999, 1_000, 59_999, 60_000, 3_599_999, 3_600_000, 45_296_789, 86_399_999];
        for ms in samples {
            let text = format_time(ms);
            assert_eq!(parse_time(&text), ms, "round trip failed for {}", text);
            assert!(is_valid_time(&text));
        }

        for ms in (0..86_400_000u64).step_by(7_919_731) {
            assert_eq!(parse_time(&format_time(ms)), ms);
        }
    }

    #[test]
    fn test_is_valid_time() {
        assert!(is_valid_time("00:59:59.999"));
        assert!(is_valid_time("99:00:00.0"));
        assert!(!is_valid_time("61:61:61.000"));
        assert!(!is_valid_time("00:60:00.000"));
        assert!(!is_valid_time("00:00:60.000"));
        assert!(!is_valid_time("abc"));
        assert!(!is_valid_time(""));
    }

    #[test]
    fn test_parse_time_strict() {
        assert_eq!(parse_time_strict("00:01:00.000").unwrap(), 60_000);
        assert!(matches!(
            parse_time_strict("00:61:00.000"),
            Err(YtSubError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_valid_range() {
        assert!(is_valid_range(0, 1));
        assert!(!is_valid_range(1000, 1000));
        assert!(!is_valid_range(2000, 1000));
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(65_000), "1:05");
        assert_eq!(format_clock(3_725_000), "1:02:05");
    }
}
