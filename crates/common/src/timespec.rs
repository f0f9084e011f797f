//! Human-readable time expressions
//!
//! Accepts the same vocabulary callers already use for the `time` query
//! parameter: a number followed by an optional unit (`500ms`, `1.5s`,
//! `2 minutes`, `1h`), compound sequences such as `1m30s`, and a bare
//! number, which is read as milliseconds.

use std::time::Duration;
use thiserror::Error;

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = MS_PER_SECOND * 60.0;
const MS_PER_HOUR: f64 = MS_PER_MINUTE * 60.0;
const MS_PER_DAY: f64 = MS_PER_HOUR * 24.0;
const MS_PER_WEEK: f64 = MS_PER_DAY * 7.0;
const MS_PER_YEAR: f64 = MS_PER_DAY * 365.25;

/// Upper bound on the raw expression length
pub const MAX_TIME_EXPRESSION_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeSpecError {
    #[error("time expression is empty")]
    Empty,
    #[error("time expression exceeds {} characters", MAX_TIME_EXPRESSION_LENGTH)]
    TooLong,
    #[error("negative time offsets are not allowed")]
    Negative,
    #[error("expected a number at position {0}")]
    ExpectedNumber(usize),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unknown time unit '{0}'")]
    UnknownUnit(String),
    #[error("every segment of a compound expression needs a unit")]
    MissingUnit,
    #[error("time offset is out of range")]
    OutOfRange,
}

/// Parse a time expression into a non-negative duration
pub fn parse_time_expression(input: &str) -> Result<Duration, TimeSpecError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeSpecError::Empty);
    }
    if trimmed.len() > MAX_TIME_EXPRESSION_LENGTH {
        return Err(TimeSpecError::TooLong);
    }
    if trimmed.starts_with('-') {
        return Err(TimeSpecError::Negative);
    }

    let bytes = trimmed.as_bytes();
    let mut pos = 0;
    let mut total_ms = 0.0_f64;
    let mut segments = 0;
    let mut unitless = false;

    while pos < bytes.len() {
        pos = skip_whitespace(bytes, pos);
        if pos >= bytes.len() {
            break;
        }

        let number_start = pos;
        while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
            pos += 1;
        }
        if pos == number_start {
            return Err(TimeSpecError::ExpectedNumber(number_start));
        }
        let number_text = &trimmed[number_start..pos];
        let value: f64 = number_text
            .parse()
            .map_err(|_| TimeSpecError::InvalidNumber(number_text.to_string()))?;

        pos = skip_whitespace(bytes, pos);
        let unit_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        let unit = &trimmed[unit_start..pos];

        let factor = if unit.is_empty() {
            unitless = true;
            1.0
        } else {
            unit_factor(unit).ok_or_else(|| TimeSpecError::UnknownUnit(unit.to_string()))?
        };

        total_ms += value * factor;
        segments += 1;
    }

    if unitless && segments > 1 {
        return Err(TimeSpecError::MissingUnit);
    }
    if !total_ms.is_finite() {
        return Err(TimeSpecError::OutOfRange);
    }

    Duration::try_from_secs_f64(total_ms / MS_PER_SECOND).map_err(|_| TimeSpecError::OutOfRange)
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

fn unit_factor(unit: &str) -> Option<f64> {
    let factor = match unit.to_ascii_lowercase().as_str() {
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => MS_PER_SECOND,
        "m" | "min" | "mins" | "minute" | "minutes" => MS_PER_MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => MS_PER_HOUR,
        "d" | "day" | "days" => MS_PER_DAY,
        "w" | "week" | "weeks" => MS_PER_WEEK,
        "y" | "yr" | "yrs" | "year" | "years" => MS_PER_YEAR,
        _ => return None,
    };
    Some(factor)
}
