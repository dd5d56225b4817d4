//! Parsing of poll interval strings such as `30s`, `5m` or `1h30m`.
//!
//! Accepts a sequence of `<number><unit>` pairs where the number may carry a
//! fractional part and the unit is one of `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`.

use std::fmt;
use std::time::Duration;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const MAX_FRACTION_DIGITS: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    Empty,
    Invalid(String),
    MissingUnit(String),
    UnknownUnit { unit: String, input: String },
    /// Zero or negative intervals would turn the poll loop into a busy loop.
    NotPositive(String),
}

impl fmt::Display for IntervalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalError::Empty => write!(f, "empty interval"),
            IntervalError::Invalid(input) => write!(f, "invalid interval {input:?}"),
            IntervalError::MissingUnit(input) => write!(f, "missing unit in interval {input:?}"),
            IntervalError::UnknownUnit { unit, input } => {
                write!(f, "unknown unit {unit:?} in interval {input:?}")
            }
            IntervalError::NotPositive(input) => {
                write!(f, "interval {input:?} must be greater than zero")
            }
        }
    }
}

impl std::error::Error for IntervalError {}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(60 * 60 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a poll interval. The result is always strictly positive.
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IntervalError::Empty);
    }
    if trimmed.starts_with('-') || trimmed == "0" {
        return Err(IntervalError::NotPositive(input.to_string()));
    }
    let invalid = || IntervalError::Invalid(input.to_string());

    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (whole, after) = split_digits(rest);
        let (fraction, after) = match after.strip_prefix('.') {
            Some(tail) => split_digits(tail),
            None => ("", after),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, tail) = after.split_at(unit_len);
        if unit.is_empty() {
            return Err(IntervalError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| IntervalError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let mut value = if whole.is_empty() {
            0
        } else {
            let whole: u128 = whole.parse().map_err(|_| invalid())?;
            whole.checked_mul(scale).ok_or_else(invalid)?
        };
        if !fraction.is_empty() {
            let digits = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
            let numerator: u128 = digits.parse().map_err(|_| invalid())?;
            value += numerator * scale / 10u128.pow(digits.len() as u32);
        }

        total = total.checked_add(value).ok_or_else(invalid)?;
        rest = tail;
    }

    if total == 0 {
        return Err(IntervalError::NotPositive(input.to_string()));
    }
    let nanos = u64::try_from(total).map_err(|_| invalid())?;
    Ok(Duration::from_nanos(nanos))
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_interval("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_interval("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_interval("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_interval("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_interval("10us"), Ok(Duration::from_micros(10)));
        assert_eq!(parse_interval("10µs"), Ok(Duration::from_micros(10)));
        assert_eq!(parse_interval("7ns"), Ok(Duration::from_nanos(7)));
    }

    #[test]
    fn parses_compound_and_fractional() {
        assert_eq!(parse_interval("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_interval("1m0.5s"), Ok(Duration::from_millis(60_500)));
        assert_eq!(parse_interval("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_interval(".5s"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_interval("+10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_interval(" 45s "), Ok(Duration::from_secs(45)));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(parse_interval(""), Err(IntervalError::Empty));
        assert_eq!(parse_interval("   "), Err(IntervalError::Empty));
        assert!(matches!(parse_interval("soon"), Err(IntervalError::Invalid(_))));
        assert!(matches!(parse_interval("."), Err(IntervalError::Invalid(_))));
        assert!(matches!(parse_interval("+"), Err(IntervalError::Invalid(_))));
    }

    #[test]
    fn rejects_missing_or_unknown_units() {
        assert!(matches!(
            parse_interval("30"),
            Err(IntervalError::MissingUnit(_))
        ));
        assert!(matches!(
            parse_interval("1h30"),
            Err(IntervalError::MissingUnit(_))
        ));
        assert_eq!(
            parse_interval("3d"),
            Err(IntervalError::UnknownUnit {
                unit: "d".to_string(),
                input: "3d".to_string()
            })
        );
    }

    #[test]
    fn rejects_zero_and_negative() {
        assert!(matches!(
            parse_interval("0"),
            Err(IntervalError::NotPositive(_))
        ));
        assert!(matches!(
            parse_interval("0s"),
            Err(IntervalError::NotPositive(_))
        ));
        assert!(matches!(
            parse_interval("-5s"),
            Err(IntervalError::NotPositive(_))
        ));
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(
            parse_interval("99999999999999999999999h"),
            Err(IntervalError::Invalid(_))
        ));
    }
}
