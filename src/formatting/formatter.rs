use std::fmt::Debug;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};

use super::RenderContext;
use super::number::{NumberConfig, print_engineering, print_fixed};
use super::value::Value;
use crate::error::{CompileError, RenderError};
use crate::width::{display_width, pad_to_width, truncate_to_width};

pub const DEFAULT_DATETIME_FORMAT: &str = "%a %d/%m %R";

const DEFAULT_ROT_WIDTH: usize = 15;
const DEFAULT_ROT_INTERVAL: f64 = 1.0;
const MIN_ROT_INTERVAL: f64 = 0.1;

const DEFAULT_BAR_WIDTH: usize = 5;
const DEFAULT_BAR_MAX: f64 = 100.0;

const DEFAULT_FIX_PRECISION: usize = 2;
const DEFAULT_ENG_WIDTH: usize = 3;

const BAR_GLYPHS: [char; 9] = [
    ' ', '\u{258f}', '\u{258e}', '\u{258d}', '\u{258c}', '\u{258b}', '\u{258a}', '\u{2589}',
    '\u{2588}',
];

/// Turns one value into text.
pub trait Formatter: Debug + Send + Sync {
    fn format(&self, value: &Value, ctx: &RenderContext) -> Result<String, RenderError>;

    /// How often output changes with time alone, for animated formatters.
    fn interval(&self) -> Option<Duration> {
        None
    }
}

fn mismatch(formatter: &'static str, value: &Value) -> RenderError {
    RenderError::TypeMismatch {
        formatter,
        kind: value.kind(),
    }
}

fn parse_arg<T: std::str::FromStr>(
    formatter: &'static str,
    args: &[String],
    index: usize,
    what: &str,
) -> Result<Option<T>, CompileError> {
    match args.get(index).map(|a| a.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| CompileError::argument(formatter, format!("{what} must be a number, got `{raw}`"))),
    }
}

/// Build a formatter from its name and raw arguments.
pub fn new_formatter(name: &str, args: &[String]) -> Result<Box<dyn Formatter>, CompileError> {
    match name {
        "str" => {
            let min_width = parse_arg("str", args, 0, "min width")?.unwrap_or(0);
            let max_width = match args.get(1).map(|a| a.trim()) {
                None | Some("") | Some("inf") => None,
                Some(_) => parse_arg::<usize>("str", args, 1, "max width")?,
            };
            if let Some(max) = max_width {
                if max < min_width {
                    return Err(CompileError::argument(
                        "str",
                        "max width must not be smaller than min width",
                    ));
                }
            }
            Ok(Box::new(StrFormatter {
                min_width,
                max_width,
            }))
        }
        "rot-str" => {
            let width = parse_arg("rot-str", args, 0, "width")?.unwrap_or(DEFAULT_ROT_WIDTH);
            let interval: f64 =
                parse_arg("rot-str", args, 1, "interval")?.unwrap_or(DEFAULT_ROT_INTERVAL);
            if !(interval >= MIN_ROT_INTERVAL) {
                return Err(CompileError::argument(
                    "rot-str",
                    format!("interval must be at least {MIN_ROT_INTERVAL} seconds"),
                ));
            }
            let interval = Duration::try_from_secs_f64(interval).map_err(|_| {
                CompileError::argument("rot-str", format!("interval {interval} is out of range"))
            })?;
            Ok(Box::new(RotStrFormatter { width, interval }))
        }
        "bar" => {
            let width = parse_arg("bar", args, 0, "width")?.unwrap_or(DEFAULT_BAR_WIDTH);
            let max_value: f64 = parse_arg("bar", args, 1, "max value")?.unwrap_or(DEFAULT_BAR_MAX);
            if max_value <= 0.0 {
                return Err(CompileError::argument("bar", "max value must be positive"));
            }
            Ok(Box::new(BarFormatter { width, max_value }))
        }
        "eng" => {
            let width = parse_arg("eng", args, 0, "width")?.unwrap_or(DEFAULT_ENG_WIDTH);
            let number = NumberConfig::parse(
                "eng",
                args.get(1).map(String::as_str),
                args.get(2).map(String::as_str),
            )?;
            Ok(Box::new(EngFormatter { width, number }))
        }
        "fix" => {
            let precision = parse_arg("fix", args, 0, "precision")?.unwrap_or(DEFAULT_FIX_PRECISION);
            let number = NumberConfig::parse(
                "fix",
                args.get(1).map(String::as_str),
                args.get(2).map(String::as_str),
            )?;
            let trim = match args.get(3).map(|a| a.trim()) {
                None | Some("") => false,
                Some("trim") => true,
                Some(other) => {
                    return Err(CompileError::argument(
                        "fix",
                        format!("expected `trim`, got `{other}`"),
                    ));
                }
            };
            Ok(Box::new(FixFormatter {
                precision,
                trim,
                number,
            }))
        }
        "flag" => Ok(Box::new(FlagFormatter)),
        "datetime" => {
            let format = match args.first() {
                Some(format) if !format.is_empty() => format.clone(),
                _ => DEFAULT_DATETIME_FORMAT.to_string(),
            };
            Ok(Box::new(DatetimeFormatter::new(format)?))
        }
        other => Err(CompileError::UnknownFormatter(other.to_string())),
    }
}

/// Formatter used when a placeholder names none.
pub fn default_format(value: &Value, ctx: &RenderContext) -> Result<String, RenderError> {
    match value {
        Value::Text(_) => StrFormatter::default().format(value, ctx),
        Value::Number { .. } => FixFormatter::default().format(value, ctx),
        Value::Flag => FlagFormatter.format(value, ctx),
        Value::Datetime(at) => Ok(at.format(DEFAULT_DATETIME_FORMAT).to_string()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StrFormatter {
    min_width: usize,
    max_width: Option<usize>,
}

impl Formatter for StrFormatter {
    fn format(&self, value: &Value, _ctx: &RenderContext) -> Result<String, RenderError> {
        let Value::Text(text) = value else {
            return Err(mismatch("str", value));
        };
        let text = match self.max_width {
            Some(max) if display_width(text) > max => truncate_to_width(text, max),
            _ => text.clone(),
        };
        Ok(pad_to_width(&text, self.min_width))
    }
}

/// Scrolls text longer than `width` one character per `interval`.
#[derive(Debug, Clone, Copy)]
pub struct RotStrFormatter {
    width: usize,
    interval: Duration,
}

impl Formatter for RotStrFormatter {
    fn format(&self, value: &Value, ctx: &RenderContext) -> Result<String, RenderError> {
        let Value::Text(text) = value else {
            return Err(mismatch("rot-str", value));
        };
        if display_width(text) <= self.width {
            return Ok(pad_to_width(text, self.width));
        }

        // One extra character for the `|` marking the wrap point.
        let cycle = text.chars().count() + 1;
        let step = (ctx.elapsed.as_secs_f64() / self.interval.as_secs_f64()) as usize % cycle;
        let rotated: String = text
            .chars()
            .chain(Some('|'))
            .chain(text.chars())
            .skip(step)
            .collect();
        Ok(pad_to_width(&truncate_to_width(&rotated, self.width), self.width))
    }

    fn interval(&self) -> Option<Duration> {
        Some(self.interval)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BarFormatter {
    width: usize,
    max_value: f64,
}

impl Formatter for BarFormatter {
    fn format(&self, value: &Value, _ctx: &RenderContext) -> Result<String, RenderError> {
        let Value::Number { val, .. } = value else {
            return Err(mismatch("bar", value));
        };
        let ratio = if val.is_nan() {
            0.0
        } else {
            (val / self.max_value).clamp(0.0, 1.0)
        };
        let filled = ratio * self.width as f64;
        Ok((0..self.width)
            .map(|i| {
                let cell = (filled - i as f64).clamp(0.0, 1.0);
                BAR_GLYPHS[(cell * 8.0) as usize]
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngFormatter {
    width: usize,
    number: NumberConfig,
}

impl Formatter for EngFormatter {
    fn format(&self, value: &Value, _ctx: &RenderContext) -> Result<String, RenderError> {
        let Value::Number { val, unit } = value else {
            return Err(mismatch("eng", value));
        };
        self.number
            .render(*val, *unit, |mantissa, _| print_engineering(mantissa, self.width))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixFormatter {
    precision: usize,
    trim: bool,
    number: NumberConfig,
}

impl Default for FixFormatter {
    fn default() -> Self {
        Self {
            precision: DEFAULT_FIX_PRECISION,
            trim: false,
            number: NumberConfig::default(),
        }
    }
}

impl Formatter for FixFormatter {
    fn format(&self, value: &Value, _ctx: &RenderContext) -> Result<String, RenderError> {
        let Value::Number { val, unit } = value else {
            return Err(mismatch("fix", value));
        };
        self.number.render(*val, *unit, |mantissa, prefix| {
            print_fixed(mantissa, prefix, self.precision, self.trim)
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FlagFormatter;

impl Formatter for FlagFormatter {
    fn format(&self, value: &Value, _ctx: &RenderContext) -> Result<String, RenderError> {
        match value {
            Value::Flag => Ok(String::new()),
            other => Err(mismatch("flag", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatetimeFormatter {
    format: String,
}

impl DatetimeFormatter {
    fn new(format: String) -> Result<Self, CompileError> {
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(CompileError::argument(
                "datetime",
                format!("invalid strftime format `{format}`"),
            ));
        }
        Ok(Self { format })
    }
}

impl Formatter for DatetimeFormatter {
    fn format(&self, value: &Value, _ctx: &RenderContext) -> Result<String, RenderError> {
        let Value::Datetime(at) = value else {
            return Err(mismatch("datetime", value));
        };
        Ok(at.format(&self.format).to_string())
    }
}
