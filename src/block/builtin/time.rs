use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use tokio::time::MissedTickBehavior;

use super::{interval_from_secs, parse_params};
use crate::block::{Block, BlockApi, BlockContext, Wake};
use crate::error::BlockResult;
use crate::formatting::{Format, FormatConfig, Value, Values};
use crate::widget::{Segment, Widget};

const DEFAULT_FORMAT: &str = "$timestamp.datetime(%a %d/%m %R)";

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TimeConfig {
    format: FormatConfig,
    interval: f64,
    icon: Option<String>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            format: FormatConfig::default(),
            interval: 10.0,
            icon: Some("time".to_string()),
        }
    }
}

/// Local wall clock, exposed to the format as `$timestamp`.
#[derive(Debug)]
pub struct TimeBlock {
    format: Arc<Format>,
    interval: Duration,
    icon: Option<String>,
}

impl TimeBlock {
    pub fn new(format: Format, interval: Duration, icon: Option<String>) -> Self {
        Self {
            format: Arc::new(format),
            interval,
            icon,
        }
    }

    fn widget(&self) -> Widget {
        let values = Values::from([("timestamp".to_string(), Value::datetime(Local::now()))]);
        let mut segment = Segment::formatted(Arc::clone(&self.format), values);
        if let Some(icon) = &self.icon {
            segment = segment.with_icon(icon.clone());
        }
        Widget::single(segment)
    }
}

pub(crate) fn factory(_ctx: &BlockContext, params: toml::Table) -> BlockResult<Box<dyn Block>> {
    let config: TimeConfig = parse_params(params)?;
    let interval = interval_from_secs(config.interval)?;
    let format = config.format.with_default(DEFAULT_FORMAT)?;
    Ok(Box::new(TimeBlock::new(format, interval, config.icon)))
}

#[async_trait]
impl Block for TimeBlock {
    fn kind(&self) -> &str {
        "time"
    }

    async fn run(self: Box<Self>, mut api: BlockApi) -> BlockResult<()> {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            match api.wait(&mut timer).await {
                Wake::Stop => return Ok(()),
                Wake::Tick | Wake::Event(_) => api.set_widget(self.widget()).await?,
            }
        }
    }
}
