use std::collections::HashMap;

use chrono::{DateTime, Local};

use super::unit::Unit;

/// Named values a template is rendered against.
pub type Values = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number { val: f64, unit: Unit },
    /// Present-or-absent marker; renders as nothing.
    Flag,
    Datetime(DateTime<Local>),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn number(val: impl Into<f64>) -> Self {
        Self::with_unit(val, Unit::None)
    }

    pub fn with_unit(val: impl Into<f64>, unit: Unit) -> Self {
        Self::Number {
            val: val.into(),
            unit,
        }
    }

    pub fn bytes(val: impl Into<f64>) -> Self {
        Self::with_unit(val, Unit::Bytes)
    }

    pub fn bytes_per_second(val: impl Into<f64>) -> Self {
        Self::with_unit(val, Unit::BytesPerSecond)
    }

    pub fn bits(val: impl Into<f64>) -> Self {
        Self::with_unit(val, Unit::Bits)
    }

    pub fn percents(val: impl Into<f64>) -> Self {
        Self::with_unit(val, Unit::Percents)
    }

    pub fn degrees(val: impl Into<f64>) -> Self {
        Self::with_unit(val, Unit::Degrees)
    }

    pub fn seconds(val: impl Into<f64>) -> Self {
        Self::with_unit(val, Unit::Seconds)
    }

    pub fn watts(val: impl Into<f64>) -> Self {
        Self::with_unit(val, Unit::Watts)
    }

    pub fn hertz(val: impl Into<f64>) -> Self {
        Self::with_unit(val, Unit::Hertz)
    }

    pub fn flag() -> Self {
        Self::Flag
    }

    pub fn datetime(at: DateTime<Local>) -> Self {
        Self::Datetime(at)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number { .. } => "number",
            Self::Flag => "flag",
            Self::Datetime(_) => "datetime",
        }
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Self::number(val)
    }
}
