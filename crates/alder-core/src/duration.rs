//! Go-style duration strings.
//!
//! Session TTLs and lock delays cross the store boundary in Go's duration
//! notation ("10s", "3m4.005s"). Formatting picks the largest unit that keeps
//! the value exact and never wraps hours into days; parsing accepts any
//! combination of `h`, `m`, `s`, `ms`, `us`/`µs`, `ns` components with
//! optional fractions.

use std::time::Duration;

use snafu::Snafu;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Errors from parsing a Go-style duration string.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum DurationParseError {
    /// Input was empty.
    #[snafu(display("empty duration string"))]
    Empty,

    /// A component had no digits or a malformed number.
    #[snafu(display("invalid number in duration '{input}'"))]
    InvalidNumber {
        /// The offending input.
        input: String,
    },

    /// A component carried an unrecognized unit suffix.
    #[snafu(display("unknown unit '{unit}' in duration '{input}'"))]
    UnknownUnit {
        /// The unrecognized unit.
        unit: String,
        /// The offending input.
        input: String,
    },

    /// The value does not fit in a `Duration`.
    #[snafu(display("duration '{input}' overflows"))]
    Overflow {
        /// The offending input.
        input: String,
    },
}

/// Format a duration the way Go's `time.Duration` prints itself.
///
/// Zero is `"0s"`. Sub-second values use the largest of ns/µs/ms that keeps
/// a non-zero integer part; values of a second or more use `h`/`m`/`s` with
/// a fractional seconds part, hours unbounded (26 hours is `"26h..."`).
pub fn format_go_duration(d: Duration) -> String {
    let total = d.as_nanos();
    if total == 0 {
        return "0s".to_string();
    }

    if total < NANOS_PER_SEC {
        let (unit, scale) = if total < 1_000 {
            ("ns", 1)
        } else if total < 1_000_000 {
            ("µs", 1_000)
        } else {
            ("ms", 1_000_000)
        };
        return format!("{}{}{}", total / scale, frac_part(total % scale, scale), unit);
    }

    let secs = total / NANOS_PER_SEC;
    let sub_nanos = total % NANOS_PER_SEC;
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 || hours > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{}{}s", seconds, frac_part(sub_nanos, NANOS_PER_SEC)));
    out
}

/// Render `frac / scale` as a trimmed ".ddd" fraction, or empty when zero.
fn frac_part(frac: u128, scale: u128) -> String {
    if frac == 0 {
        return String::new();
    }
    let digits = scale.ilog10() as usize;
    let mut s = format!("{frac:0width$}", width = digits);
    while s.ends_with('0') {
        s.pop();
    }
    format!(".{s}")
}

/// Parse a Go-style duration string such as `"150ms"` or `"2h3m4.005s"`.
pub fn parse_go_duration(input: &str) -> Result<Duration, DurationParseError> {
    if input.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = input;
    let mut total_nanos: u128 = 0;

    while !rest.is_empty() {
        let digit_len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digit_len == 0 {
            return Err(DurationParseError::InvalidNumber {
                input: input.to_string(),
            });
        }
        let whole: u128 = rest[..digit_len].parse().map_err(|_| DurationParseError::InvalidNumber {
            input: input.to_string(),
        })?;
        rest = &rest[digit_len..];

        let (frac, frac_scale) = if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(|b| b.is_ascii_digit()).count();
            if frac_len == 0 {
                return Err(DurationParseError::InvalidNumber {
                    input: input.to_string(),
                });
            }
            let frac: u128 = after_dot[..frac_len].parse().map_err(|_| DurationParseError::InvalidNumber {
                input: input.to_string(),
            })?;
            rest = &after_dot[frac_len..];
            (frac, 10u128.pow(frac_len as u32))
        } else {
            (0, 1)
        };

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3_600 * NANOS_PER_SEC,
            _ => {
                return Err(DurationParseError::UnknownUnit {
                    unit: unit.to_string(),
                    input: input.to_string(),
                });
            }
        };

        let component = whole
            .checked_mul(unit_nanos)
            .and_then(|n| n.checked_add(frac * unit_nanos / frac_scale))
            .ok_or_else(|| DurationParseError::Overflow {
                input: input.to_string(),
            })?;
        total_nanos = total_nanos.checked_add(component).ok_or_else(|| DurationParseError::Overflow {
            input: input.to_string(),
        })?;
    }

    if total_nanos > u64::MAX as u128 {
        return Err(DurationParseError::Overflow {
            input: input.to_string(),
        });
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}

/// Serde adapter storing a `Duration` as a Go-style duration string.
pub mod go_duration {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use serde::de::Error;

    use super::format_go_duration;
    use super::parse_go_duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_go_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_go_duration(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_formats_as_minimal_unit() {
        assert_eq!(format_go_duration(Duration::ZERO), "0s");
        assert_eq!(parse_go_duration("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_go_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn representative_set_round_trips() {
        let cases = [
            (Duration::from_millis(5), "5ms"),
            (Duration::from_millis(150), "150ms"),
            (Duration::from_millis(4_005), "4.005s"),
            (Duration::from_millis(3 * 60_000 + 4_005), "3m4.005s"),
            (Duration::from_millis((2 * 3600 + 3 * 60) * 1000 + 4_005), "2h3m4.005s"),
            (Duration::from_millis((26 * 3600 + 3 * 60) * 1000 + 4_005), "26h3m4.005s"),
        ];
        for (duration, text) in cases {
            assert_eq!(format_go_duration(duration), text);
            assert_eq!(parse_go_duration(text).unwrap(), duration);
        }
    }

    #[test]
    fn sub_millisecond_units() {
        assert_eq!(format_go_duration(Duration::from_nanos(500)), "500ns");
        assert_eq!(format_go_duration(Duration::from_nanos(1_500)), "1.5µs");
        assert_eq!(parse_go_duration("1.5µs").unwrap(), Duration::from_nanos(1_500));
        assert_eq!(parse_go_duration("1.5us").unwrap(), Duration::from_nanos(1_500));
    }

    #[test]
    fn compound_components_accumulate() {
        assert_eq!(parse_go_duration("1h30m").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse_go_duration("1m500ms").unwrap(), Duration::from_millis(60_500));
    }

    #[test]
    fn malformed_inputs_rejected() {
        assert!(matches!(parse_go_duration(""), Err(DurationParseError::Empty)));
        assert!(matches!(parse_go_duration("ms"), Err(DurationParseError::InvalidNumber { .. })));
        assert!(matches!(parse_go_duration("5x"), Err(DurationParseError::UnknownUnit { .. })));
        assert!(matches!(parse_go_duration("5"), Err(DurationParseError::UnknownUnit { .. })));
        assert!(matches!(parse_go_duration("1.s"), Err(DurationParseError::InvalidNumber { .. })));
    }
}
