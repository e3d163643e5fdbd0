//! Per-request generation parameters.
//!
//! Clients send `max_length`, `min_length` and `num_beams` either as JSON
//! values or as form strings. [`GenerationParams::resolve`] coerces them to
//! integers, fills in defaults, repairs an inverted length range, and checks
//! the result against the configured bounds.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::GenerationSettings;

/// Slack added to `min_length` when a request's `max_length` is smaller.
pub const LENGTH_REPAIR_MARGIN: i64 = 50;

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: i64,
        value: i64,
    },

    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        max: i64,
        value: i64,
    },
}

/// Unparsed parameter values as they arrived on the wire.
///
/// Form fields are stored as [`Value::String`].
#[derive(Debug, Clone, Default)]
pub struct RawParams {
    pub max_length: Option<Value>,
    pub min_length: Option<Value>,
    pub num_beams: Option<Value>,
}

/// Validated decoding parameters, echoed back in every summary response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_length: usize,
    pub min_length: usize,
    pub num_beams: usize,
}

impl GenerationParams {
    /// Coerce, default, repair and bound-check raw request parameters.
    pub fn resolve(raw: &RawParams, settings: &GenerationSettings) -> Result<Self, ParamError> {
        let mut max_length = coerce("max_length", raw.max_length.as_ref(), settings.max_length)?;
        let min_length = coerce("min_length", raw.min_length.as_ref(), settings.min_length)?;
        let num_beams = coerce("num_beams", raw.num_beams.as_ref(), settings.num_beams)?;

        if max_length < min_length {
            max_length = min_length.saturating_add(LENGTH_REPAIR_MARGIN);
        }

        check_min("min_length", min_length, 0)?;
        check_min("max_length", max_length, 1)?;
        check_max("max_length", max_length, settings.max_length_limit)?;
        check_min("num_beams", num_beams, 1)?;
        check_max("num_beams", num_beams, settings.max_beams)?;

        // Bounds above guarantee all three are non-negative.
        Ok(Self {
            max_length: max_length as usize,
            min_length: min_length as usize,
            num_beams: num_beams as usize,
        })
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        let settings = GenerationSettings::default();
        Self {
            max_length: settings.max_length as usize,
            min_length: settings.min_length as usize,
            num_beams: settings.num_beams as usize,
        }
    }
}

fn coerce(field: &'static str, value: Option<&Value>, default: i64) -> Result<i64, ParamError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let invalid = || ParamError::InvalidValue {
        field,
        value: render(value),
    };
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(f.trunc() as i64),
                    _ => Err(invalid()),
                }
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(invalid()),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_min(field: &'static str, value: i64, min: i64) -> Result<(), ParamError> {
    if value < min {
        return Err(ParamError::TooSmall { field, min, value });
    }
    Ok(())
}

fn check_max(field: &'static str, value: i64, max: i64) -> Result<(), ParamError> {
    if value > max {
        return Err(ParamError::TooLarge { field, max, value });
    }
    Ok(())
}
