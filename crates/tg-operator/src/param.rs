//! Parsing of string-keyed configuration into typed parameter fields.
//!
//! Operator kinds keep their configuration in a typed struct; these helpers
//! are the adapter `set_param` uses to fill it from key/value strings.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::{OpError, Result};

fn config_error(op: &str, key: &str, value: &str, reason: impl Display) -> OpError {
    OpError::Config {
        op: op.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn parse_usize(op: &str, key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| config_error(op, key, value, e))
}

pub fn parse_f32(op: &str, key: &str, value: &str) -> Result<f32> {
    let v = value
        .trim()
        .parse::<f32>()
        .map_err(|e| config_error(op, key, value, e))?;
    if !v.is_finite() {
        return Err(config_error(op, key, value, "value must be finite"));
    }
    Ok(v)
}

/// Accepts `true`/`false`/`1`/`0`, case-insensitively.
pub fn parse_bool(op: &str, key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(config_error(op, key, value, "expected a boolean")),
    }
}

pub fn parse_enum<T>(op: &str, key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| config_error(op, key, value, e))
}

/// Unwrap a required parameter, reporting it by name when it was never set.
pub fn require<T>(op: &str, key: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| OpError::MissingParam {
        op: op.to_string(),
        key: key.to_string(),
    })
}

/// Error for a key the operator kind does not define.
pub fn unknown_param(op: &str, key: &str) -> OpError {
    OpError::UnknownParam {
        op: op.to_string(),
        key: key.to_string(),
    }
}

/// Error for a value that parsed but violates the parameter's range.
pub fn invalid_value(op: &str, key: &str, value: impl Display, reason: &str) -> OpError {
    config_error(op, key, &value.to_string(), reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Mode {
        Fast,
        Exact,
    }

    impl FromStr for Mode {
        type Err = String;

        fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
            match s {
                "fast" => Ok(Mode::Fast),
                "exact" => Ok(Mode::Exact),
                other => Err(format!("unknown mode '{other}'")),
            }
        }
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_usize("op", "n", " 16 ").unwrap(), 16);
        assert!(parse_usize("op", "n", "-1").is_err());
        assert_eq!(parse_f32("op", "p", "0.25").unwrap(), 0.25);
        assert!(parse_f32("op", "p", "NaN").is_err());
        assert!(parse_f32("op", "p", "abc").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("op", "b", "True").unwrap());
        assert!(parse_bool("op", "b", "1").unwrap());
        assert!(!parse_bool("op", "b", "false").unwrap());
        assert!(parse_bool("op", "b", "yes").is_err());
    }

    #[test]
    fn test_parse_enum() {
        assert_eq!(parse_enum::<Mode>("op", "mode", "exact").unwrap(), Mode::Exact);
        assert_eq!(parse_enum::<Mode>("op", "mode", "fast").unwrap(), Mode::Fast);
        let err = parse_enum::<Mode>("op", "mode", "slow").unwrap_err();
        assert!(err.to_string().contains("unknown mode 'slow'"));
    }

    #[test]
    fn test_require() {
        assert_eq!(require("op", "n", Some(3)).unwrap(), 3);
        assert!(matches!(
            require::<usize>("op", "n", None),
            Err(OpError::MissingParam { .. })
        ));
    }
}
