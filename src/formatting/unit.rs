use std::fmt;
use std::str::FromStr;

use super::prefix::PrefixBase;
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    #[default]
    None,
    Bytes,
    BytesPerSecond,
    Bits,
    BitsPerSecond,
    Percents,
    Degrees,
    Seconds,
    Watts,
    Hertz,
}

impl Unit {
    /// Convert `value` expressed in `self` into `target`.
    pub fn convert(self, value: f64, target: Unit) -> Result<f64, RenderError> {
        match (self, target) {
            (a, b) if a == b => Ok(value),
            (Self::Bytes, Self::Bits) | (Self::BytesPerSecond, Self::BitsPerSecond) => {
                Ok(value * 8.0)
            }
            (Self::Bits, Self::Bytes) | (Self::BitsPerSecond, Self::BytesPerSecond) => {
                Ok(value / 8.0)
            }
            (from, to) => Err(RenderError::UnitMismatch {
                from: from.describe().to_string(),
                to: to.describe().to_string(),
            }),
        }
    }

    pub fn default_base(self) -> PrefixBase {
        match self {
            Self::Bytes | Self::BytesPerSecond => PrefixBase::Binary,
            _ => PrefixBase::Decimal,
        }
    }

    /// Prefix levels that make sense for this unit.
    pub fn level_range(self) -> (i32, i32) {
        match self {
            Self::Percents | Self::Degrees => (0, 0),
            Self::Seconds => (-3, 0),
            Self::Watts | Self::Hertz => (-3, 4),
            Self::None | Self::Bytes | Self::BytesPerSecond | Self::Bits | Self::BitsPerSecond => {
                (0, 4)
            }
        }
    }

    /// Whether a number in this unit reads best with a space before its suffix.
    pub fn spaced(self) -> bool {
        !matches!(self, Self::None | Self::Percents | Self::Degrees)
    }

    fn describe(self) -> &'static str {
        match self {
            Self::None => "unitless",
            Self::Bytes => "bytes",
            Self::BytesPerSecond => "bytes/s",
            Self::Bits => "bits",
            Self::BitsPerSecond => "bits/s",
            Self::Percents => "percents",
            Self::Degrees => "degrees",
            Self::Seconds => "seconds",
            Self::Watts => "watts",
            Self::Hertz => "hertz",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "",
            Self::Bytes => "B",
            Self::BytesPerSecond => "B/s",
            Self::Bits => "b",
            Self::BitsPerSecond => "b/s",
            Self::Percents => "%",
            Self::Degrees => "°",
            Self::Seconds => "s",
            Self::Watts => "W",
            Self::Hertz => "Hz",
        })
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" | "none" => Self::None,
            "B" => Self::Bytes,
            "B/s" => Self::BytesPerSecond,
            "b" => Self::Bits,
            "b/s" => Self::BitsPerSecond,
            "%" => Self::Percents,
            "deg" | "°" => Self::Degrees,
            "s" => Self::Seconds,
            "W" => Self::Watts,
            "Hz" => Self::Hertz,
            other => return Err(format!("unknown unit `{other}`")),
        })
    }
}
