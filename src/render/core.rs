use blake3::Hash;

use crate::error::{ProtocolError, RenderError};
use crate::formatting::RenderContext;
use crate::protocol::{I3BarBlock, encode_line};
use crate::registry::{Slot, WidgetTable};
use crate::theme::{Color, SeparatorColor, tint};
use crate::widget::RenderedSegment;

/// A segment whose format failed; it was replaced by an error placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFault {
    pub block: usize,
    pub error: RenderError,
}

/// Result of composing the bar once.
#[derive(Debug, Clone)]
pub struct Frame {
    pub line: String,
    pub segments: usize,
    /// `false` when the line is identical to the previous frame.
    pub changed: bool,
    pub faults: Vec<SegmentFault>,
}

/// Turns slots into protocol blocks and remembers the last line it produced.
#[derive(Debug, Default)]
pub struct BarRenderer {
    last: Option<Hash>,
}

impl BarRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, table: &WidgetTable, ctx: &RenderContext) -> Result<Frame, ProtocolError> {
        let mut faults = Vec::new();
        let blocks = compose(table, ctx, &mut faults);
        let line = encode_line(&blocks)?;

        let hash = blake3::hash(line.as_bytes());
        let changed = self.last.map(|last| last != hash).unwrap_or(true);
        self.last = Some(hash);

        Ok(Frame {
            line,
            segments: blocks.len(),
            changed,
            faults,
        })
    }
}

/// Every slot with a visible widget, in table order.
pub(crate) fn compose(table: &WidgetTable, ctx: &RenderContext, faults: &mut Vec<SegmentFault>) -> Vec<I3BarBlock> {
    let visible: Vec<_> = table
        .slots()
        .iter()
        .enumerate()
        .map(|(index, slot)| (index, slot, render_slot(index, slot, ctx, faults)))
        .filter(|(_, _, rendered)| !rendered.is_empty())
        .collect();

    let mut blocks = Vec::new();
    let mut last_bg = None;
    let count = visible.len();
    for (position, (index, slot, rendered)) in visible.into_iter().enumerate() {
        // Every second block is tinted, counting from the rightmost, which never is.
        let tinted = (count - 1 - position) % 2 == 1;
        push_slot(&mut blocks, index, slot, rendered, tinted, &mut last_bg);
    }
    blocks
}

fn render_slot(
    index: usize,
    slot: &Slot,
    ctx: &RenderContext,
    faults: &mut Vec<SegmentFault>,
) -> Vec<RenderedSegment> {
    let Some(widget) = slot.widget() else {
        return Vec::new();
    };
    widget
        .segments()
        .iter()
        .filter_map(|segment| match segment.render(&slot.shared, ctx) {
            Ok(rendered) => rendered,
            Err(error) => {
                let placeholder = segment.render_error(&slot.shared, &error.to_string());
                faults.push(SegmentFault { block: index, error });
                Some(placeholder)
            }
        })
        .collect()
}

fn push_slot(
    blocks: &mut Vec<I3BarBlock>,
    index: usize,
    slot: &Slot,
    rendered: Vec<RenderedSegment>,
    tinted: bool,
    last_bg: &mut Option<Color>,
) {
    let theme = &slot.shared.theme;
    let custom_separator = theme.separator.is_some();

    let colored: Vec<_> = rendered
        .into_iter()
        .map(|segment| {
            let (bg, fg) = theme.colors(segment.state);
            if tinted {
                let bg = tint(bg, theme.alternating_tint_bg.as_ref());
                let fg = tint(fg, theme.alternating_tint_fg.as_ref());
                (segment, bg, fg)
            } else {
                (segment, bg.cloned(), fg.cloned())
            }
        })
        .collect();

    if let Some(separator) = &theme.separator {
        let fg = match &theme.separator_fg {
            Some(SeparatorColor::Auto) => colored.first().and_then(|(_, bg, _)| bg.clone()),
            Some(SeparatorColor::Fixed(color)) => Some(color.clone()),
            None => None,
        };
        let bg = match &theme.separator_bg {
            Some(SeparatorColor::Auto) => last_bg.clone(),
            Some(SeparatorColor::Fixed(color)) => Some(color.clone()),
            None => None,
        };
        blocks.push(I3BarBlock {
            full_text: separator.clone(),
            color: fg.as_ref().map(ToString::to_string),
            background: bg.as_ref().map(ToString::to_string),
            separator: Some(false),
            separator_block_width: Some(0),
            ..I3BarBlock::default()
        });
    }
    *last_bg = colored.last().and_then(|(_, bg, _)| bg.clone());

    let last = colored.len() - 1;
    let name = index.to_string();
    for (position, (segment, bg, fg)) in colored.into_iter().enumerate() {
        // Segments of one block sit flush against each other; only the
        // block's last segment keeps the host's separator.
        let joined = custom_separator || position < last;
        blocks.push(I3BarBlock {
            full_text: segment.full_text,
            short_text: segment.short_text,
            color: fg.as_ref().map(ToString::to_string),
            background: bg.as_ref().map(ToString::to_string),
            min_width: segment.min_width,
            align: segment.align,
            name: Some(name.clone()),
            instance: segment.instance.map(|instance| instance.to_string()),
            separator: segment.separator.or(joined.then_some(false)),
            separator_block_width: segment.separator_block_width.or(joined.then_some(0)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::formatting::{Format, Value, Values};
    use crate::theme::{SharedConfig, Theme};
    use crate::widget::{Segment, State, Widget};

    fn table(widgets: Vec<Option<Widget>>) -> WidgetTable {
        let mut table = WidgetTable::new();
        for (index, widget) in widgets.into_iter().enumerate() {
            table.push_slot("text", SharedConfig::default());
            if let Some(widget) = widget {
                table.apply(index, widget);
            }
        }
        table
    }

    fn blocks(table: &WidgetTable) -> Vec<I3BarBlock> {
        compose(table, &RenderContext::default(), &mut Vec::new())
    }

    #[test]
    fn slots_render_in_configuration_order_and_skip_missing() {
        let table = table(vec![
            Some(Widget::single(Segment::text("a"))),
            None,
            Some(Widget::single(Segment::text("c"))),
        ]);
        let blocks = blocks(&table);
        let names: Vec<_> = blocks.iter().map(|block| block.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["0", "2"]);
        assert_eq!(blocks[0].full_text, " a ");
    }

    #[test]
    fn native_separator_only_after_last_segment() {
        let widget = Widget::single(Segment::text("a").with_instance(0))
            .with_segment(Segment::text("b").with_instance(1));
        let blocks = blocks(&table(vec![Some(widget)]));
        assert_eq!(blocks[0].separator, Some(false));
        assert_eq!(blocks[0].separator_block_width, Some(0));
        assert_eq!(blocks[1].separator, None);
        assert_eq!(blocks[1].instance.as_deref(), Some("1"));
    }

    #[test]
    fn custom_separator_precedes_each_block() {
        let mut theme = Theme::default();
        theme
            .apply_overrides(&HashMap::from([
                ("separator".to_string(), "|".to_string()),
                ("separator_fg".to_string(), "#112233".to_string()),
            ]))
            .unwrap();
        let shared = SharedConfig::new(theme, Default::default(), " {icon} ");
        let mut table = WidgetTable::new();
        table.push_slot("text", shared.clone());
        table.push_slot("text", shared);
        table.apply(0, Widget::single(Segment::text("a")));
        table.apply(1, Widget::single(Segment::text("b").with_separator(true)));

        let blocks = blocks(&table);
        let texts: Vec<_> = blocks.iter().map(|block| block.full_text.as_str()).collect();
        assert_eq!(texts, vec!["|", " a ", "|", " b "]);
        assert_eq!(blocks[0].color.as_deref(), Some("#112233"));
        assert_eq!(blocks[0].name, None);
        assert_eq!(blocks[1].separator, Some(false));
        assert_eq!(blocks[3].separator, Some(true));
    }

    fn themed(overrides: &[(&str, &str)]) -> SharedConfig {
        let mut theme = Theme::default();
        let overrides: HashMap<String, String> = overrides
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        theme.apply_overrides(&overrides).unwrap();
        SharedConfig::new(theme, Default::default(), " {icon} ")
    }

    fn themed_table(shared: &SharedConfig, widgets: Vec<Option<Widget>>) -> WidgetTable {
        let mut table = WidgetTable::new();
        for (index, widget) in widgets.into_iter().enumerate() {
            table.push_slot("text", shared.clone());
            if let Some(widget) = widget {
                table.apply(index, widget);
            }
        }
        table
    }

    #[test]
    fn alternating_tint_skips_the_rightmost_block() {
        let shared = themed(&[
            ("idle_bg", "#101010"),
            ("alternating_tint_bg", "#050505"),
            ("alternating_tint_fg", "#202020"),
        ]);
        let text = |t: &str| Some(Widget::single(Segment::text(t)));
        let table = themed_table(&shared, vec![text("a"), None, text("b"), text("c")]);
        let backgrounds: Vec<_> = blocks(&table)
            .into_iter()
            .map(|block| (block.full_text, block.background, block.color))
            .collect();
        assert_eq!(
            backgrounds,
            vec![
                (" a ".to_string(), Some("#101010".to_string()), None),
                (" b ".to_string(), Some("#151515".to_string()), Some("#202020".to_string())),
                (" c ".to_string(), Some("#101010".to_string()), None),
            ]
        );
    }

    #[test]
    fn auto_separator_colors_follow_neighbours() {
        let shared = themed(&[
            ("separator", "<"),
            ("separator_fg", "auto"),
            ("separator_bg", "auto"),
            ("idle_bg", "#111111"),
            ("critical_bg", "#220000"),
        ]);
        let table = themed_table(
            &shared,
            vec![
                Some(Widget::single(Segment::text("a"))),
                Some(
                    Widget::single(Segment::text("b").with_state(State::Critical))
                        .with_segment(Segment::text("c")),
                ),
                Some(Widget::single(Segment::text("d"))),
            ],
        );
        let separators: Vec<_> = blocks(&table)
            .into_iter()
            .filter(|block| block.name.is_none())
            .map(|block| (block.color, block.background))
            .collect();
        assert_eq!(
            separators,
            vec![
                (Some("#111111".to_string()), None),
                (Some("#220000".to_string()), Some("#111111".to_string())),
                (Some("#111111".to_string()), Some("#111111".to_string())),
            ]
        );
    }

    #[test]
    fn state_selects_theme_colors() {
        let widget = Widget::single(Segment::text("x").with_state(State::Critical));
        let blocks = blocks(&table(vec![Some(widget)]));
        assert_eq!(blocks[0].color.as_deref(), Some("#bf616a"));
        assert_eq!(blocks[0].background, None);
    }

    #[test]
    fn render_errors_become_placeholders() {
        let format = Arc::new(Format::compile("$missing", None).unwrap());
        let values = Values::from([("other".to_string(), Value::text("x"))]);
        let table = table(vec![Some(Widget::single(Segment::formatted(format, values)))]);

        let mut faults = Vec::new();
        let blocks = compose(&table, &RenderContext::default(), &mut faults);
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].block, 0);
        assert_eq!(blocks[0].short_text.as_deref(), Some(" ERR "));
        assert_eq!(blocks[0].color.as_deref(), Some("#bf616a"));
    }

    #[test]
    fn identical_frames_are_flagged_unchanged() {
        let mut table = table(vec![Some(Widget::single(Segment::text("a")))]);
        let mut renderer = BarRenderer::new();
        let ctx = RenderContext::default();

        assert!(renderer.render(&table, &ctx).unwrap().changed);
        assert!(!renderer.render(&table, &ctx).unwrap().changed);

        table.apply(0, Widget::single(Segment::text("b")));
        let frame = renderer.render(&table, &ctx).unwrap();
        assert!(frame.changed);
        assert_eq!(frame.segments, 1);
    }
}
