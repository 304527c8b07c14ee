//! Shared number rendering for the `fix` and `eng` formatters.
//!
//! Both pick a prefix the same way and only differ in how the scaled
//! mantissa is printed.

use super::prefix::{Prefix, PrefixBase, auto_level};
use super::unit::Unit;
use crate::error::{CompileError, RenderError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PrefixChoice {
    /// Unit decides between SI and binary.
    Auto,
    AutoSi,
    AutoBin,
    /// Never scale below this prefix.
    Min(Prefix),
    Forced(Prefix),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NumberConfig {
    pub unit: Option<Unit>,
    pub unit_space: bool,
    pub unit_hidden: bool,
    pub prefix: PrefixChoice,
    /// `None` means the unit's own convention.
    pub prefix_space: Option<bool>,
    pub prefix_hidden: bool,
}

impl Default for NumberConfig {
    fn default() -> Self {
        Self {
            unit: None,
            unit_space: false,
            unit_hidden: false,
            prefix: PrefixChoice::Auto,
            prefix_space: None,
            prefix_hidden: false,
        }
    }
}

/// Strip the ` `, `_` and `!` modifiers off a unit or prefix argument.
fn modifiers<'a>(mut arg: &'a str, allow_forced: bool) -> (&'a str, bool, bool, bool) {
    let space = arg.starts_with(' ');
    if space {
        arg = &arg[1..];
    }
    let hidden = arg.starts_with('_');
    if hidden {
        arg = &arg[1..];
    }
    let forced = allow_forced && arg.starts_with('!');
    if forced {
        arg = &arg[1..];
    }
    (arg, space, hidden, forced)
}

impl NumberConfig {
    pub fn parse(
        formatter: &'static str,
        unit: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<Self, CompileError> {
        let mut config = Self::default();

        if let Some(raw) = unit {
            let (name, space, hidden, _) = modifiers(raw, false);
            config.unit_space = space;
            config.unit_hidden = hidden;
            if name != "auto" {
                config.unit = Some(
                    name.parse()
                        .map_err(|msg: String| CompileError::argument(formatter, msg))?,
                );
            }
        }

        if let Some(raw) = prefix {
            let (name, space, hidden, forced) = modifiers(raw, true);
            config.prefix_space = Some(space);
            config.prefix_hidden = hidden;
            config.prefix = match name {
                "auto" => PrefixChoice::Auto,
                "auto_si" => PrefixChoice::AutoSi,
                "auto_bin" => PrefixChoice::AutoBin,
                other => {
                    let prefix: Prefix = other
                        .parse()
                        .map_err(|msg: String| CompileError::argument(formatter, msg))?;
                    if forced {
                        PrefixChoice::Forced(prefix)
                    } else {
                        PrefixChoice::Min(prefix)
                    }
                }
            };
        }

        Ok(config)
    }

    fn base(&self, unit: Unit) -> PrefixBase {
        match self.prefix {
            PrefixChoice::Auto => unit.default_base(),
            PrefixChoice::AutoSi => PrefixBase::Decimal,
            PrefixChoice::AutoBin => PrefixBase::Binary,
            PrefixChoice::Min(p) | PrefixChoice::Forced(p) => match p {
                Prefix::One => unit.default_base(),
                other => other.base(),
            },
        }
    }

    /// Render `val` (expressed in `unit`) printing each mantissa with `print`.
    pub fn render<F>(&self, mut val: f64, mut unit: Unit, print: F) -> Result<String, RenderError>
    where
        F: Fn(f64, Prefix) -> String,
    {
        if let Some(target) = self.unit {
            val = unit.convert(val, target)?;
            unit = target;
        }

        if val.is_nan() {
            return Ok("-".to_string());
        }
        if val.is_infinite() {
            return Ok(if val > 0.0 { "∞" } else { "-∞" }.to_string());
        }

        let base = self.base(unit);
        let (family_lo, family_hi) = base.levels();
        let (unit_lo, unit_hi) = unit.level_range();

        let (level, hi) = match self.prefix {
            PrefixChoice::Forced(p) => (p.level(), p.level()),
            PrefixChoice::Min(p) => {
                let lo = p.level().max(family_lo);
                let hi = unit_hi.min(family_hi).max(lo);
                (auto_level(val, base).clamp(lo, hi), hi)
            }
            _ => {
                let lo = unit_lo.max(family_lo);
                let hi = unit_hi.min(family_hi);
                (auto_level(val, base).clamp(lo, hi), hi)
            }
        };

        let mut level = level;
        loop {
            let prefix = Prefix::from_level(level, base);
            let text = print(prefix.apply(val), prefix);
            let overflowed = text
                .trim()
                .parse::<f64>()
                .map(|rounded| rounded.abs() >= base.step())
                .unwrap_or(false);
            if overflowed && level < hi {
                level += 1;
                continue;
            }
            return Ok(self.attach_suffix(text, prefix, unit));
        }
    }

    fn attach_suffix(&self, mut out: String, prefix: Prefix, unit: Unit) -> String {
        let prefix_text = if self.prefix_hidden {
            String::new()
        } else {
            prefix.to_string()
        };
        let unit_text = if self.unit_hidden {
            String::new()
        } else {
            unit.to_string()
        };
        if prefix_text.is_empty() && unit_text.is_empty() {
            return out;
        }

        let prefix_space = self.prefix_space.unwrap_or_else(|| unit.spaced());
        if prefix_space || (prefix_text.is_empty() && self.unit_space) {
            out.push(' ');
        }
        out.push_str(&prefix_text);
        if !prefix_text.is_empty() && self.unit_space && !unit_text.is_empty() {
            out.push(' ');
        }
        out.push_str(&unit_text);
        out
    }
}

/// Fixed-point mantissa; integral unscaled values drop their fraction.
pub(crate) fn print_fixed(mantissa: f64, prefix: Prefix, precision: usize, trim: bool) -> String {
    let precision = if prefix == Prefix::One && mantissa.fract() == 0.0 {
        0
    } else {
        precision
    };
    let mut text = format!("{mantissa:.precision$}");
    if trim && text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    normalize_zero(text)
}

/// Mantissa printed in `width` significant characters.
pub(crate) fn print_engineering(mantissa: f64, width: usize) -> String {
    let mut digits = (mantissa.abs().max(1.0).log10().floor() + 1.0) as isize;
    if mantissa < 0.0 {
        digits += 1;
    }
    let text = match width as isize - digits {
        isize::MIN..=0 => format!("{}", mantissa.trunc()),
        1 => format!(" {}", mantissa.trunc()),
        spare => format!("{:.*}", spare as usize - 1, mantissa),
    };
    normalize_zero(text)
}

fn normalize_zero(text: String) -> String {
    let body = text.trim_start();
    match body.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => {
            let pad = &text[..text.len() - body.len()];
            format!("{pad}{rest}")
        }
        _ => text,
    }
}
