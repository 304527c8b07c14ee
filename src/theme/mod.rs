//! Colours, separators and icons shared by every block.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::widget::State;

pub const DEFAULT_ICONS_FORMAT: &str = " {icon} ";

/// `#RRGGBB` or `#RRGGBBAA`, as the bar host expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Color {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = value
            .strip_prefix('#')
            .is_some_and(|hex| matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()));
        if valid {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidColor(value))
        }
    }
}

impl TryFrom<&str> for Color {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl Color {
    fn channels(&self) -> [u8; 4] {
        let hex = self.0.trim_start_matches('#');
        let channel = |at: usize| {
            hex.get(at..at + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .unwrap_or(u8::MAX)
        };
        [channel(0), channel(2), channel(4), channel(6)]
    }

    /// Channel-wise saturating sum; a missing alpha counts as opaque.
    pub fn tinted(&self, tint: &Color) -> Color {
        let [r, g, b, a] = self.channels();
        let [tr, tg, tb, ta] = tint.channels();
        let (r, g, b, a) = (
            r.saturating_add(tr),
            g.saturating_add(tg),
            b.saturating_add(tb),
            a.saturating_add(ta),
        );
        if a == u8::MAX {
            Color(format!("#{r:02x}{g:02x}{b:02x}"))
        } else {
            Color(format!("#{r:02x}{g:02x}{b:02x}{a:02x}"))
        }
    }
}

/// Apply `tint` to an optional colour. No colour takes the tint as is.
pub fn tint(color: Option<&Color>, tint: Option<&Color>) -> Option<Color> {
    match (color, tint) {
        (Some(color), Some(tint)) => Some(color.tinted(tint)),
        (color, tint) => color.or(tint).cloned(),
    }
}

/// Separator colour: fixed, or `auto` to follow the neighbouring blocks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SeparatorColor {
    Auto,
    Fixed(Color),
}

impl TryFrom<String> for SeparatorColor {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "auto" {
            Ok(Self::Auto)
        } else {
            Color::try_from(value).map(Self::Fixed)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-state colours. `None` leaves the host default in place.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Theme {
    pub idle_bg: Option<Color>,
    pub idle_fg: Option<Color>,
    pub info_bg: Option<Color>,
    pub info_fg: Option<Color>,
    pub good_bg: Option<Color>,
    pub good_fg: Option<Color>,
    pub warning_bg: Option<Color>,
    pub warning_fg: Option<Color>,
    pub critical_bg: Option<Color>,
    pub critical_fg: Option<Color>,
    /// Custom separator text. `None` keeps the host's native separator.
    pub separator: Option<String>,
    /// `auto` takes the last background of the block before the separator.
    pub separator_bg: Option<SeparatorColor>,
    /// `auto` takes the first background of the block after the separator.
    pub separator_fg: Option<SeparatorColor>,
    /// Added to every second visible block, counted from the right.
    pub alternating_tint_bg: Option<Color>,
    pub alternating_tint_fg: Option<Color>,
}

impl Default for Theme {
    fn default() -> Self {
        let color = |hex: &str| Some(Color(hex.to_string()));
        Self {
            idle_bg: None,
            idle_fg: None,
            info_bg: None,
            info_fg: color("#88c0d0"),
            good_bg: None,
            good_fg: color("#a3be8c"),
            warning_bg: None,
            warning_fg: color("#ebcb8b"),
            critical_bg: None,
            critical_fg: color("#bf616a"),
            separator: None,
            separator_bg: None,
            separator_fg: None,
            alternating_tint_bg: None,
            alternating_tint_fg: None,
        }
    }
}

impl Theme {
    /// Background and foreground for a segment in `state`.
    pub fn colors(&self, state: State) -> (Option<&Color>, Option<&Color>) {
        let (bg, fg) = match state {
            State::Idle => (&self.idle_bg, &self.idle_fg),
            State::Info => (&self.info_bg, &self.info_fg),
            State::Good => (&self.good_bg, &self.good_fg),
            State::Warning => (&self.warning_bg, &self.warning_fg),
            State::Critical => (&self.critical_bg, &self.critical_fg),
        };
        (bg.as_ref(), fg.as_ref())
    }

    /// Replace individual keys, as a block's `theme_overrides` table does.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> Result<(), ConfigError> {
        for (key, value) in overrides {
            match key.as_str() {
                "separator" => self.separator = Some(value.clone()),
                "separator_bg" => self.separator_bg = Some(SeparatorColor::try_from(value.clone())?),
                "separator_fg" => self.separator_fg = Some(SeparatorColor::try_from(value.clone())?),
                _ => *self.color_slot(key)? = Some(Color::try_from(value.as_str())?),
            }
        }
        Ok(())
    }

    fn color_slot(&mut self, key: &str) -> Result<&mut Option<Color>, ConfigError> {
        Ok(match key {
            "idle_bg" => &mut self.idle_bg,
            "idle_fg" => &mut self.idle_fg,
            "info_bg" => &mut self.info_bg,
            "info_fg" => &mut self.info_fg,
            "good_bg" => &mut self.good_bg,
            "good_fg" => &mut self.good_fg,
            "warning_bg" => &mut self.warning_bg,
            "warning_fg" => &mut self.warning_fg,
            "critical_bg" => &mut self.critical_bg,
            "critical_fg" => &mut self.critical_fg,
            "alternating_tint_bg" => &mut self.alternating_tint_bg,
            "alternating_tint_fg" => &mut self.alternating_tint_fg,
            other => return Err(ConfigError::UnknownThemeKey(other.to_string())),
        })
    }
}

/// Icon name to glyph table.
pub type Icons = HashMap<String, String>;

/// Read-only configuration handed to every block and to the renderer.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    pub theme: Arc<Theme>,
    pub icons: Arc<Icons>,
    pub icons_format: Arc<str>,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(Theme::default(), Icons::new(), DEFAULT_ICONS_FORMAT)
    }
}

impl SharedConfig {
    pub fn new(theme: Theme, icons: Icons, icons_format: &str) -> Self {
        Self {
            theme: Arc::new(theme),
            icons: Arc::new(icons),
            icons_format: Arc::from(icons_format),
        }
    }

    /// Copy with block-level overrides applied. Unchanged parts stay shared.
    pub fn with_overrides(
        &self,
        theme_overrides: Option<&HashMap<String, String>>,
        icons_format: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut shared = self.clone();
        if let Some(overrides) = theme_overrides {
            let mut theme = (*self.theme).clone();
            theme.apply_overrides(overrides)?;
            shared.theme = Arc::new(theme);
        }
        if let Some(format) = icons_format {
            shared.icons_format = Arc::from(format);
        }
        Ok(shared)
    }

    /// Icon glyph wrapped in the icon format, or `None` when unknown.
    pub fn get_icon(&self, name: &str) -> Option<String> {
        self.icons
            .get(name)
            .map(|glyph| self.icons_format.replace("{icon}", glyph))
    }
}
