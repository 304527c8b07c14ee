use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::logging::{LogLevel, Logger, json_str};
use crate::protocol::{ReaderOptions, read_events};
use crate::runtime::{BarRuntime, ExitReason, RuntimeEvent, signals};

/// Capacity of the channel carrying clicks and signals into the runtime.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Wires a `BarRuntime` to the host: clicks from `input`, bar lines to the
/// runtime's output, and optionally OS signals.
pub struct StdioDriver<R, W> {
    runtime: BarRuntime<W>,
    input: R,
    reader: ReaderOptions,
    signals: Option<Vec<i32>>,
    logger: Logger,
}

impl<R, W> StdioDriver<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    pub fn new(runtime: BarRuntime<W>, input: R, logger: Logger) -> Self {
        Self {
            runtime,
            input,
            reader: ReaderOptions::default(),
            signals: None,
            logger,
        }
    }

    pub fn reader_options(mut self, options: ReaderOptions) -> Self {
        self.reader = options;
        self
    }

    /// Listen for the fixed signals plus `SIGRTMIN + n` for each `n` in `custom`.
    pub fn with_signals(mut self, custom: Vec<i32>) -> Self {
        self.signals = Some(custom);
        self
    }

    pub async fn run(self) -> Result<ExitReason> {
        let Self {
            runtime,
            input,
            reader,
            signals,
            logger,
        } = self;

        let (tx, rx) = mpsc::channel::<RuntimeEvent>(EVENT_QUEUE_CAPACITY);
        let mut helpers: Vec<JoinHandle<()>> = Vec::new();
        if let Some(custom) = signals {
            helpers.extend(signals::spawn_listeners(&tx, &custom, &logger)?);
        }
        let reader_logger = logger.clone();
        helpers.push(tokio::spawn(async move {
            if let Err(err) = read_events(BufReader::new(input), tx, reader, reader_logger.clone()).await {
                reader_logger.emit(
                    LogLevel::Warn,
                    "bar::protocol",
                    "input_failed",
                    [json_str("error", err.to_string())],
                );
            }
        }));

        let result = runtime.run(rx).await;
        helpers.iter().for_each(JoinHandle::abort);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::block::{Block, BlockApi, BlockEvent};
    use crate::error::BlockResult;
    use crate::runtime::{RuntimeConfig, SlotOptions};
    use crate::widget::{Segment, Widget};

    /// Shows how many clicks it has seen.
    struct Counter;

    #[async_trait]
    impl Block for Counter {
        fn kind(&self) -> &str {
            "counter"
        }

        async fn run(self: Box<Self>, mut api: BlockApi) -> BlockResult<()> {
            let mut clicks = 0;
            api.set_widget(Widget::single(Segment::text(clicks.to_string()))).await?;
            while let Some(event) = api.next_event().await {
                if let BlockEvent::Click(_) = event {
                    clicks += 1;
                    api.set_widget(Widget::single(Segment::text(clicks.to_string()))).await?;
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn clicks_from_input_reach_the_block() {
        let (mut host_in, bar_in) = tokio::io::duplex(1024);
        let (bar_out, mut host_out) = tokio::io::duplex(8192);

        let mut runtime = BarRuntime::new(bar_out, RuntimeConfig::default());
        runtime.spawn_block(Box::new(Counter), SlotOptions::default());
        let shutdown = runtime.shutdown_token();
        let driver = StdioDriver::new(runtime, bar_in, Logger::disabled());
        let task = tokio::spawn(driver.run());

        host_in.write_all(b"[\n{\"name\":\"0\",\"button\":1}\n").await.unwrap();

        let mut seen = String::new();
        let mut buf = [0u8; 1024];
        while !seen.contains("\" 1 \"") {
            let n = host_out.read(&mut buf).await.unwrap();
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
        shutdown.cancel();
        assert_eq!(task.await.unwrap().unwrap(), ExitReason::Shutdown);

        host_out.read_to_string(&mut seen).await.unwrap();
        assert!(seen.starts_with("{\"version\":1,\"click_events\":true}\n[\n"));
        assert!(seen.ends_with("[]\n]\n"));
    }
}
