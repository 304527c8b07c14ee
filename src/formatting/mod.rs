//! Template formatting engine.
//!
//! Templates are compiled once, when a block is built, and rendered against a
//! [`Values`] map every time the bar is composed. The grammar:
//!
//! ```text
//! template    := alternative ('|' alternative)*
//! alternative := (text | '{' template '}' | placeholder)*
//! placeholder := '$' name ('.' formatter '(' args ')')?
//! ```
//!
//! `\` escapes the next character. The first alternative that renders without
//! error wins, which makes `{$flag text|}` a conditional group.

mod formatter;
mod number;
mod prefix;
mod template;
mod unit;
mod value;

use std::time::Duration;

use serde::Deserialize;

pub use formatter::{DEFAULT_DATETIME_FORMAT, Formatter, new_formatter};
pub use prefix::{Prefix, PrefixBase};
pub use template::FormatTemplate;
pub use unit::Unit;
pub use value::{Value, Values};

use crate::error::{CompileError, RenderError};

/// Time-dependent inputs to rendering. Keeps output a pure function of
/// template, values and context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderContext {
    /// Time since the runtime started.
    pub elapsed: Duration,
}

/// Full and optional short template of one segment.
#[derive(Debug)]
pub struct Format {
    full: FormatTemplate,
    short: Option<FormatTemplate>,
}

impl Format {
    pub fn compile(full: &str, short: Option<&str>) -> Result<Self, CompileError> {
        Ok(Self {
            full: FormatTemplate::compile(full)?,
            short: short.map(FormatTemplate::compile).transpose()?,
        })
    }

    pub fn render(&self, values: &Values) -> Result<(String, Option<String>), RenderError> {
        self.render_with(values, &RenderContext::default())
    }

    pub fn render_with(
        &self,
        values: &Values,
        ctx: &RenderContext,
    ) -> Result<(String, Option<String>), RenderError> {
        let full = self.full.render_with(values, ctx)?;
        let short = match &self.short {
            Some(short) => Some(short.render_with(values, ctx)?),
            None => None,
        };
        Ok((full, short))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.full.contains_key(key)
            || self
                .short
                .as_ref()
                .is_some_and(|short| short.contains_key(key))
    }

    pub fn interval(&self) -> Option<Duration> {
        let short = self.short.as_ref().and_then(FormatTemplate::interval);
        match (self.full.interval(), short) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Format as written in a block's configuration: either a bare string or a
/// `{ full, short }` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FormatConfig {
    #[default]
    Unset,
    Full(String),
    Table {
        full: Option<String>,
        short: Option<String>,
    },
}

impl FormatConfig {
    /// Compile, falling back to `default_full` when no full template is set.
    pub fn with_default(&self, default_full: &str) -> Result<Format, CompileError> {
        self.with_defaults(default_full, None)
    }

    /// Like [`with_default`](Self::with_default), also filling in a short
    /// template when none is configured.
    pub fn with_defaults(
        &self,
        default_full: &str,
        default_short: Option<&str>,
    ) -> Result<Format, CompileError> {
        match self {
            Self::Unset => Format::compile(default_full, default_short),
            Self::Full(full) => Format::compile(full, default_short),
            Self::Table { full, short } => Format::compile(
                full.as_deref().unwrap_or(default_full),
                short.as_deref().or(default_short),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_template_renders_alongside_full() {
        let format = Format::compile("$name is $state", Some("$state")).unwrap();
        let values: Values = [
            ("name".to_string(), Value::text("disk")),
            ("state".to_string(), Value::text("full")),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            format.render(&values).unwrap(),
            ("disk is full".to_string(), Some("full".to_string()))
        );
    }

    #[test]
    fn compile_error_in_short_is_reported() {
        assert!(Format::compile("ok", Some("{broken")).is_err());
    }

    #[test]
    fn config_accepts_string_or_table() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default)]
            format: FormatConfig,
        }

        let plain: Holder = toml::from_str("format = \"$a\"").unwrap();
        assert_eq!(plain.format, FormatConfig::Full("$a".to_string()));

        let table: Holder = toml::from_str("format = { short = \"$b\" }").unwrap();
        let format = table.format.with_default("$a").unwrap();
        assert!(format.contains_key("a"));
        assert!(format.contains_key("b"));

        let unset: Holder = toml::from_str("").unwrap();
        assert_eq!(unset.format, FormatConfig::Unset);
    }
}
