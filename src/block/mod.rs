//! Block contract and the handle a block task uses to talk to the runtime.
//!
//! Every block runs as its own tokio task. It pushes whole [`Widget`]s to the
//! runtime through its [`WidgetSender`] and receives [`BlockEvent`]s (clicks
//! and refresh nudges) on a private channel.

mod builtin;
mod registry;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;

use crate::error::{BlockError, BlockResult};
use crate::logging::Logger;
use crate::protocol::ClickEvent;
use crate::theme::SharedConfig;
use crate::widget::Widget;

pub use builtin::{CustomBlock, TextBlock, TimeBlock};
pub use registry::{BlockContext, BlockFactory, BlockRegistry};

/// Capacity of each block's event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something that produces widgets until the bar shuts down.
#[async_trait]
pub trait Block: Send {
    fn kind(&self) -> &str;

    async fn run(self: Box<Self>, api: BlockApi) -> BlockResult<()>;
}

/// Delivered to a block on its event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEvent {
    Click(ClickEvent),
    Refresh,
}

/// Outcome of [`BlockApi::wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    Tick,
    Event(BlockEvent),
    Stop,
}

#[derive(Debug)]
pub(crate) struct BlockUpdate {
    pub block: usize,
    pub widget: Widget,
}

/// Producer half of a block's update channel, bound to the block's index.
#[derive(Debug, Clone)]
pub struct WidgetSender {
    block: usize,
    tx: mpsc::Sender<BlockUpdate>,
}

impl WidgetSender {
    pub(crate) fn new(block: usize, tx: mpsc::Sender<BlockUpdate>) -> Self {
        Self { block, tx }
    }

    pub async fn send(&self, widget: Widget) -> BlockResult<()> {
        self.tx
            .send(BlockUpdate {
                block: self.block,
                widget,
            })
            .await
            .map_err(|_| BlockError::ChannelClosed)
    }
}

/// Everything a running block may touch.
pub struct BlockApi {
    id: usize,
    shared: SharedConfig,
    logger: Logger,
    updates: WidgetSender,
    events: mpsc::Receiver<BlockEvent>,
    stop: CancellationToken,
    exit: CancellationToken,
}

impl BlockApi {
    pub(crate) fn new(
        id: usize,
        shared: SharedConfig,
        logger: Logger,
        updates: WidgetSender,
        events: mpsc::Receiver<BlockEvent>,
        stop: CancellationToken,
        exit: CancellationToken,
    ) -> Self {
        Self {
            id,
            shared,
            logger,
            updates,
            events,
            stop,
            exit,
        }
    }

    /// Position of this block in the configuration.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn shared(&self) -> &SharedConfig {
        &self.shared
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Replace this block's widget on the bar.
    pub async fn set_widget(&self, widget: Widget) -> BlockResult<()> {
        self.updates.send(widget).await
    }

    pub fn widget_sender(&self) -> WidgetSender {
        self.updates.clone()
    }

    /// Next click or refresh. `None` once the runtime asks blocks to stop.
    pub async fn next_event(&mut self) -> Option<BlockEvent> {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => None,
            event = self.events.recv() => match event {
                Some(event) => Some(event),
                None => {
                    self.stop.cancelled().await;
                    None
                }
            },
        }
    }

    /// Wait for whichever comes first: a timer tick, an event, or shutdown.
    pub async fn wait(&mut self, timer: &mut Interval) -> Wake {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => Wake::Stop,
            event = self.events.recv(), if !self.events.is_closed() => match event {
                Some(event) => Wake::Event(event),
                None => Wake::Tick,
            },
            _ = timer.tick() => Wake::Tick,
        }
    }

    /// Sleep for `period` unless an event or shutdown arrives first.
    pub async fn wait_for(&mut self, period: Duration) -> Wake {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => Wake::Stop,
            event = self.events.recv(), if !self.events.is_closed() => match event {
                Some(event) => Wake::Event(event),
                None => Wake::Tick,
            },
            _ = tokio::time::sleep(period) => Wake::Tick,
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Ask the whole bar to shut down.
    pub fn request_exit(&self) {
        self.exit.cancel();
    }
}

impl std::fmt::Debug for BlockApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockApi")
            .field("id", &self.id)
            .field("stopping", &self.stop.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A detached API plus the runtime-side ends of its channels.
    pub(crate) struct Harness {
        pub api: BlockApi,
        pub updates: mpsc::Receiver<BlockUpdate>,
        pub events: mpsc::Sender<BlockEvent>,
        pub stop: CancellationToken,
        pub exit: CancellationToken,
    }

    pub(crate) fn harness(id: usize) -> Harness {
        let (update_tx, updates) = mpsc::channel(16);
        let (events, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stop = CancellationToken::new();
        let exit = CancellationToken::new();
        let api = BlockApi::new(
            id,
            SharedConfig::default(),
            Logger::disabled(),
            WidgetSender::new(id, update_tx),
            event_rx,
            stop.clone(),
            exit.clone(),
        );
        Harness {
            api,
            updates,
            events,
            stop,
            exit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::harness;
    use super::*;
    use crate::protocol::MouseButton;
    use crate::widget::Segment;

    #[tokio::test]
    async fn widgets_are_tagged_with_the_block_index() {
        let mut h = harness(7);
        h.api.set_widget(Widget::single(Segment::text("x"))).await.unwrap();
        let update = h.updates.recv().await.unwrap();
        assert_eq!(update.block, 7);
        assert_eq!(update.widget.segments().len(), 1);
    }

    #[tokio::test]
    async fn next_event_yields_events_then_none_on_stop() {
        let mut h = harness(0);
        let click = ClickEvent::new(0, MouseButton::Left);
        h.events.send(BlockEvent::Click(click.clone())).await.unwrap();
        assert_eq!(h.api.next_event().await, Some(BlockEvent::Click(click)));

        h.stop.cancel();
        assert_eq!(h.api.next_event().await, None);
        assert!(h.api.is_stopping());
    }

    #[tokio::test]
    async fn wait_prefers_events_over_ticks() {
        let mut h = harness(0);
        h.events.send(BlockEvent::Refresh).await.unwrap();
        assert_eq!(
            h.api.wait_for(Duration::from_secs(60)).await,
            Wake::Event(BlockEvent::Refresh)
        );
        assert_eq!(h.api.wait_for(Duration::from_millis(5)).await, Wake::Tick);
    }

    #[tokio::test]
    async fn request_exit_cancels_the_exit_token() {
        let h = harness(0);
        h.api.request_exit();
        assert!(h.exit.is_cancelled());
    }

    #[tokio::test]
    async fn closed_update_channel_is_reported() {
        let h = harness(1);
        drop(h.updates);
        assert!(matches!(
            h.api.set_widget(Widget::new()).await,
            Err(BlockError::ChannelClosed)
        ));
    }
}
