use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::parse_params;
use crate::block::{Block, BlockApi, BlockContext};
use crate::error::BlockResult;
use crate::formatting::{Format, FormatConfig, Values};
use crate::widget::{Segment, State, Widget};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TextConfig {
    format: FormatConfig,
    state: State,
    icon: Option<String>,
}

/// Fixed text. Re-sent on every click or refresh.
#[derive(Debug)]
pub struct TextBlock {
    format: Arc<Format>,
    state: State,
    icon: Option<String>,
}

impl TextBlock {
    pub fn new(format: Format, state: State, icon: Option<String>) -> Self {
        Self {
            format: Arc::new(format),
            state,
            icon,
        }
    }

    fn widget(&self) -> Widget {
        let mut segment = Segment::formatted(Arc::clone(&self.format), Values::new()).with_state(self.state);
        if let Some(icon) = &self.icon {
            segment = segment.with_icon(icon.clone());
        }
        Widget::single(segment)
    }
}

pub(crate) fn factory(_ctx: &BlockContext, params: toml::Table) -> BlockResult<Box<dyn Block>> {
    let config: TextConfig = parse_params(params)?;
    let format = config.format.with_default("")?;
    Ok(Box::new(TextBlock::new(format, config.state, config.icon)))
}

#[async_trait]
impl Block for TextBlock {
    fn kind(&self) -> &str {
        "text"
    }

    async fn run(self: Box<Self>, mut api: BlockApi) -> BlockResult<()> {
        loop {
            api.set_widget(self.widget()).await?;
            if api.next_event().await.is_none() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockEvent;
    use crate::block::testing::harness;
    use crate::formatting::RenderContext;
    use crate::theme::SharedConfig;

    #[tokio::test]
    async fn resends_on_refresh_and_stops_cleanly() {
        let block = TextBlock::new(Format::compile("hello", None).unwrap(), State::Good, None);
        let mut h = harness(3);
        let task = tokio::spawn(Box::new(block).run(h.api));

        let first = h.updates.recv().await.unwrap();
        let rendered = first.widget.segments()[0]
            .render(&SharedConfig::default(), &RenderContext::default())
            .unwrap()
            .unwrap();
        assert_eq!(rendered.full_text, " hello ");
        assert_eq!(rendered.state, State::Good);

        h.events.send(BlockEvent::Refresh).await.unwrap();
        assert!(h.updates.recv().await.is_some());

        h.stop.cancel();
        task.await.unwrap().unwrap();
    }
}
