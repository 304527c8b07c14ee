use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::formatting::{Format, RenderContext, Values};
use crate::theme::SharedConfig;

/// Severity of a segment; selects the theme colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    #[serde(alias = "Idle")]
    Idle,
    #[serde(alias = "Info")]
    Info,
    #[serde(alias = "Good")]
    Good,
    #[serde(alias = "Warning")]
    Warning,
    #[serde(alias = "Critical")]
    Critical,
}

/// Padding around a segment's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spacing {
    /// Leading space (or the icon) and a trailing space.
    Normal,
    /// Trailing space only.
    Inline,
    /// No padding; only the icon, if any.
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Minimum width hint: pixels, or the width of a sample string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum MinWidth {
    Pixels(u32),
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub enum Content {
    #[default]
    Empty,
    Text {
        full: String,
        short: Option<String>,
    },
    /// Rendered by the runtime each time the bar is composed.
    Format {
        format: Arc<Format>,
        values: Arc<Values>,
    },
}

/// One clickable piece of a widget.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    content: Content,
    icon: Option<String>,
    state: State,
    spacing: Option<Spacing>,
    min_width: Option<MinWidth>,
    align: Option<Align>,
    instance: Option<usize>,
    separator: Option<bool>,
    separator_block_width: Option<u32>,
}

impl Segment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(full: impl Into<String>) -> Self {
        Self {
            content: Content::Text {
                full: full.into(),
                short: None,
            },
            ..Self::default()
        }
    }

    pub fn formatted(format: Arc<Format>, values: Values) -> Self {
        Self {
            content: Content::Format {
                format,
                values: Arc::new(values),
            },
            ..Self::default()
        }
    }

    pub fn with_short_text(mut self, short: impl Into<String>) -> Self {
        let short = short.into();
        match &mut self.content {
            Content::Text { short: slot, .. } => *slot = Some(short),
            other => {
                *other = Content::Text {
                    full: String::new(),
                    short: Some(short),
                }
            }
        }
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    pub fn with_spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = Some(spacing);
        self
    }

    pub fn with_min_width(mut self, min_width: MinWidth) -> Self {
        self.min_width = Some(min_width);
        self
    }

    pub fn with_align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn with_instance(mut self, instance: usize) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn with_separator(mut self, separator: bool) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn with_separator_block_width(mut self, width: u32) -> Self {
        self.separator_block_width = Some(width);
        self
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn instance(&self) -> Option<usize> {
        self.instance
    }

    fn interval(&self) -> Option<Duration> {
        match &self.content {
            Content::Format { format, .. } => format.interval(),
            _ => None,
        }
    }

    /// Compose the final text. `Ok(None)` means nothing visible to show.
    pub fn render(
        &self,
        shared: &SharedConfig,
        ctx: &RenderContext,
    ) -> Result<Option<RenderedSegment>, RenderError> {
        let (text, short) = match &self.content {
            Content::Empty => (String::new(), None),
            Content::Text { full, short } => (full.clone(), short.clone()),
            Content::Format { format, values } => format.render_with(values, ctx)?,
        };
        let icon = self.icon.as_deref().and_then(|name| shared.get_icon(name));
        if text.is_empty() && icon.is_none() {
            return Ok(None);
        }
        Ok(Some(self.compose(text, short, icon)))
    }

    /// Stand-in shown when the segment's format failed to render.
    pub fn render_error(&self, shared: &SharedConfig, message: &str) -> RenderedSegment {
        let icon = self.icon.as_deref().and_then(|name| shared.get_icon(name));
        let mut rendered = self.compose(message.to_string(), Some("ERR".to_string()), icon);
        rendered.state = State::Critical;
        rendered
    }

    fn compose(&self, text: String, short: Option<String>, icon: Option<String>) -> RenderedSegment {
        let spacing = self.spacing.unwrap_or(if text.is_empty() {
            Spacing::Hidden
        } else {
            Spacing::Normal
        });
        let lead = icon.unwrap_or_else(|| match spacing {
            Spacing::Normal => " ".to_string(),
            Spacing::Inline | Spacing::Hidden => String::new(),
        });
        let trail = match spacing {
            Spacing::Normal | Spacing::Inline => " ",
            Spacing::Hidden => "",
        };

        RenderedSegment {
            full_text: format!("{lead}{text}{trail}"),
            short_text: short.map(|short| format!("{lead}{short}{trail}")),
            state: self.state,
            min_width: self.min_width.clone(),
            align: self.align,
            instance: self.instance,
            separator: self.separator,
            separator_block_width: self.separator_block_width,
        }
    }
}

/// Text and attributes of a segment after rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSegment {
    pub full_text: String,
    pub short_text: Option<String>,
    pub state: State,
    pub min_width: Option<MinWidth>,
    pub align: Option<Align>,
    pub instance: Option<usize>,
    pub separator: Option<bool>,
    pub separator_block_width: Option<u32>,
}

/// Immutable snapshot of everything a block shows. Replaces the block's
/// previous widget as a whole.
#[derive(Debug, Clone, Default)]
pub struct Widget {
    segments: Vec<Segment>,
}

impl Widget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(segment: Segment) -> Self {
        Self {
            segments: vec![segment],
        }
    }

    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Smallest animation interval across the widget's formats.
    pub fn interval(&self) -> Option<Duration> {
        self.segments.iter().filter_map(Segment::interval).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::Value;
    use crate::theme::{Icons, Theme};

    fn shared() -> SharedConfig {
        let icons = Icons::from([("net".to_string(), "N".to_string())]);
        SharedConfig::new(Theme::default(), icons, "{icon} ")
    }

    fn render(segment: &Segment) -> Option<RenderedSegment> {
        segment.render(&shared(), &RenderContext::default()).unwrap()
    }

    #[test]
    fn normal_spacing_pads_both_sides() {
        let rendered = render(&Segment::text("up")).unwrap();
        assert_eq!(rendered.full_text, " up ");
    }

    #[test]
    fn icon_replaces_leading_space() {
        let rendered = render(&Segment::text("up").with_icon("net")).unwrap();
        assert_eq!(rendered.full_text, "N up ");
    }

    #[test]
    fn icon_only_segment_is_hidden_spacing() {
        let rendered = render(&Segment::empty().with_icon("net")).unwrap();
        assert_eq!(rendered.full_text, "N ");
        assert!(render(&Segment::empty()).is_none());
    }

    #[test]
    fn inline_spacing_and_short_text() {
        let rendered = render(
            &Segment::text("long")
                .with_short_text("s")
                .with_spacing(Spacing::Inline),
        )
        .unwrap();
        assert_eq!(rendered.full_text, "long ");
        assert_eq!(rendered.short_text.as_deref(), Some("s "));
    }

    #[test]
    fn formatted_segment_renders_values() {
        let format = Arc::new(Format::compile("$used", None).unwrap());
        let values = Values::from([("used".to_string(), Value::bytes(1536))]);
        let rendered = render(&Segment::formatted(format, values).with_instance(2)).unwrap();
        assert_eq!(rendered.full_text, " 1.50 KiB ");
        assert_eq!(rendered.instance, Some(2));
    }

    #[test]
    fn format_failure_propagates_and_has_placeholder() {
        let format = Arc::new(Format::compile("$missing", None).unwrap());
        let segment = Segment::formatted(format, Values::new());
        assert!(segment.render(&shared(), &RenderContext::default()).is_err());

        let placeholder = segment.render_error(&shared(), "format error");
        assert_eq!(placeholder.state, State::Critical);
        assert_eq!(placeholder.full_text, " format error ");
    }

    #[test]
    fn widget_interval_tracks_animated_formats() {
        let animated = Arc::new(Format::compile("$t.rot-str(5,2)", None).unwrap());
        let widget = Widget::single(Segment::text("x"))
            .with_segment(Segment::formatted(animated, Values::new()));
        assert_eq!(widget.interval(), Some(Duration::from_secs(2)));
        assert_eq!(Widget::new().interval(), None);
    }
}
