//! The aggregation loop: owns the widget table, merges block updates,
//! renders the bar and routes host events.

pub mod audit;
pub mod driver;
pub mod signals;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use self::audit::{RuntimeAudit, RuntimeAuditEventBuilder, RuntimeAuditStage};
use crate::block::{
    Block, BlockApi, BlockContext, BlockRegistry, BlockUpdate, EVENT_CHANNEL_CAPACITY, WidgetSender,
};
use crate::config::BlockSpec;
use crate::error::{BarError, BlockResult, ProtocolError, Result};
use crate::formatting::RenderContext;
use crate::logging::{LogLevel, Logger, json_kv, json_str};
use crate::metrics::RuntimeMetrics;
use crate::protocol::{ClickEvent, Header, ProtocolWriter};
use crate::registry::WidgetTable;
use crate::render::BarRenderer;
use crate::routing::{BarSignal, ClickHandler, ClickRouter};
use crate::theme::SharedConfig;
use crate::widget::{Segment, State, Widget};

const TARGET: &str = "bar::runtime";

/// Capacity of the shared block → runtime update channel.
pub const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Configuration knobs for the runtime loop.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub logger: Logger,
    /// Metrics accumulator used for periodic snapshots.
    pub metrics: Option<Arc<Mutex<RuntimeMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
    pub audit: Option<Arc<dyn RuntimeAudit>>,
    /// How long stopping blocks get before they are abandoned.
    pub shutdown_grace: Duration,
    /// Ask the host not to pause the process while the bar is hidden.
    pub never_pause: bool,
    /// Write the protocol header. Off when continuing a stream after restart.
    pub write_header: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            logger: Logger::disabled(),
            metrics: None,
            metrics_interval: Duration::from_secs(60),
            metrics_target: "bar::runtime.metrics".to_string(),
            audit: None,
            shutdown_grace: Duration::from_millis(500),
            never_pause: false,
            write_header: true,
        }
    }
}

impl RuntimeConfig {
    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(RuntimeMetrics::new())));
        }
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Arc<Mutex<RuntimeMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Input to the runtime from the host reader and the signal listeners.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Click(ClickEvent),
    Signal(BarSignal),
    Shutdown,
}

/// Why [`BarRuntime::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Shutdown,
    /// The caller should re-execute the binary without writing a new header.
    Restart,
}

/// Per-slot settings besides the block itself.
#[derive(Debug, Clone, Default)]
pub struct SlotOptions {
    pub shared: SharedConfig,
    pub handlers: Vec<ClickHandler>,
    /// `n` of `SIGRTMIN + n` that refreshes this block.
    pub signal: Option<i32>,
}

type Joined = (usize, std::result::Result<BlockResult<()>, JoinError>);

pub struct BarRuntime<W> {
    config: RuntimeConfig,
    table: WidgetTable,
    router: ClickRouter,
    renderer: BarRenderer,
    writer: ProtocolWriter<W>,
    update_tx: mpsc::Sender<BlockUpdate>,
    update_rx: mpsc::Receiver<BlockUpdate>,
    tasks: JoinSet<Joined>,
    stop: CancellationToken,
    exit: CancellationToken,
    started: Instant,
    animation: Option<(Duration, Interval)>,
}

impl<W> BarRuntime<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(output: W, config: RuntimeConfig) -> Self {
        let (update_tx, update_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let router = ClickRouter::new(config.logger.clone());
        Self {
            config,
            table: WidgetTable::new(),
            router,
            renderer: BarRenderer::new(),
            writer: ProtocolWriter::new(output),
            update_tx,
            update_rx,
            tasks: JoinSet::new(),
            stop: CancellationToken::new(),
            exit: CancellationToken::new(),
            started: Instant::now(),
            animation: None,
        }
    }

    pub fn config_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.config
    }

    /// Index the next slot will get.
    pub fn next_index(&self) -> usize {
        self.table.len()
    }

    /// Token that stops the runtime when cancelled, same as `request_exit` from a block.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.exit.clone()
    }

    /// Give `block` the next slot and start its task.
    pub fn spawn_block(&mut self, block: Box<dyn Block>, options: SlotOptions) -> usize {
        let kind = block.kind().to_string();
        let index = self.table.push_slot(kind.clone(), options.shared.clone());
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.router.add_route(Some(event_tx), options.handlers, options.signal);

        let api = BlockApi::new(
            index,
            options.shared,
            self.config.logger.clone(),
            WidgetSender::new(index, self.update_tx.clone()),
            event_rx,
            self.stop.clone(),
            self.exit.clone(),
        );
        let handle = tokio::spawn(block.run(api));
        self.tasks.spawn(async move { (index, handle.await) });

        self.log(
            LogLevel::Debug,
            "block_spawned",
            [json_kv("block", index), json_str("kind", kind.clone())],
        );
        self.audit(
            RuntimeAuditEventBuilder::new(RuntimeAuditStage::BlockSpawned)
                .detail("block", index)
                .detail("kind", kind),
        );
        index
    }

    /// Fill the next slot with an error segment for a block that could not be built.
    pub fn push_failed_block(&mut self, kind: &str, shared: SharedConfig, message: &str) -> usize {
        let index = self.table.push_slot(kind, shared);
        self.router.add_route(None, Vec::new(), None);
        let segment = Segment::text(format!("{kind}: {message}"))
            .with_short_text(kind)
            .with_state(State::Critical);
        self.table.apply(index, Widget::single(segment));

        self.log(
            LogLevel::Error,
            "block_failed",
            [
                json_kv("block", index),
                json_str("kind", kind),
                json_str("error", message),
            ],
        );
        self.audit(
            RuntimeAuditEventBuilder::new(RuntimeAuditStage::BlockFailed)
                .detail("block", index)
                .detail("kind", kind),
        );
        index
    }

    /// Build and start every configured block in order. Returns how many
    /// could not be built; those slots show an error segment instead.
    pub fn spawn_configured(
        &mut self,
        registry: &BlockRegistry,
        base: &SharedConfig,
        specs: Vec<BlockSpec>,
    ) -> usize {
        let mut failed = 0;
        for spec in specs {
            let shared = match spec.shared(base) {
                Ok(shared) => shared,
                Err(err) => {
                    self.push_failed_block(&spec.kind, base.clone(), &err.to_string());
                    failed += 1;
                    continue;
                }
            };
            let ctx = BlockContext {
                id: self.next_index(),
                shared: shared.clone(),
                logger: self.config.logger.clone(),
            };
            match registry.build(&spec.kind, &ctx, spec.params) {
                Ok(block) => {
                    let options = SlotOptions {
                        shared,
                        handlers: spec.click,
                        signal: spec.signal,
                    };
                    self.spawn_block(block, options);
                }
                Err(err) => {
                    self.push_failed_block(&spec.kind, shared, &err.to_string());
                    failed += 1;
                }
            }
        }
        failed
    }

    /// Drive the bar until shutdown, restart, or loss of the output pipe.
    pub async fn run(mut self, events: mpsc::Receiver<RuntimeEvent>) -> Result<ExitReason> {
        match self.event_loop(events).await {
            Ok(reason) => self.finalize(reason).await,
            Err(err) => {
                self.stop.cancel();
                self.log(LogLevel::Error, "runtime_failed", [json_str("error", err.to_string())]);
                self.audit(
                    RuntimeAuditEventBuilder::new(RuntimeAuditStage::RuntimeStopped)
                        .detail("reason", "error"),
                );
                Err(err)
            }
        }
    }

    async fn event_loop(&mut self, mut events: mpsc::Receiver<RuntimeEvent>) -> Result<ExitReason> {
        self.bootstrap().await?;

        let exit = self.exit.clone();
        let mut metrics_tick = self.metrics_ticker();
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;
                _ = exit.cancelled() => return Ok(ExitReason::Shutdown),
                Some(update) = self.update_rx.recv() => {
                    self.merge_updates(update);
                    self.render().await?;
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.handle_joined(joined);
                }
                event = events.recv(), if events_open => match event {
                    Some(RuntimeEvent::Click(click)) => self.route_click(click),
                    Some(RuntimeEvent::Signal(BarSignal::Restart)) => return Ok(ExitReason::Restart),
                    Some(RuntimeEvent::Signal(signal)) => self.dispatch_signal(signal),
                    Some(RuntimeEvent::Shutdown) => return Ok(ExitReason::Shutdown),
                    None => events_open = false,
                },
                _ = tick(&mut self.animation) => self.render().await?,
                _ = tick_metrics(&mut metrics_tick) => self.emit_metrics(),
            }
        }
    }

    async fn bootstrap(&mut self) -> Result<()> {
        self.ensure_metrics_initialized();
        self.started = Instant::now();
        if self.config.write_header {
            self.writer
                .write_header(&Header::new(self.config.never_pause))
                .await
                .map_err(output_error)?;
        }
        self.log(
            LogLevel::Info,
            "runtime_started",
            [
                json_kv("blocks", self.table.len()),
                json_kv("header", self.config.write_header),
            ],
        );
        self.audit(
            RuntimeAuditEventBuilder::new(RuntimeAuditStage::RuntimeStarted)
                .detail("blocks", self.table.len()),
        );

        // Slots that failed to build already hold their error segment.
        if self.table.has_dirty() {
            self.render().await?;
        }
        Ok(())
    }

    /// Apply `first` and everything else already queued. Last writer wins per block.
    fn merge_updates(&mut self, first: BlockUpdate) {
        let mut seen = HashSet::new();
        let mut applied = 0usize;
        let mut coalesced = 0usize;
        let mut next = Some(first);
        while let Some(update) = next {
            if !seen.insert(update.block) {
                coalesced += 1;
            }
            self.table.apply(update.block, update.widget);
            applied += 1;
            next = self.update_rx.try_recv().ok();
        }

        self.with_metrics(|metrics| metrics.record_widget_updates(applied, coalesced));
        if applied > 1 {
            self.log(
                LogLevel::Trace,
                "updates_coalesced",
                [json_kv("applied", applied), json_kv("blocks", seen.len())],
            );
            self.audit(
                RuntimeAuditEventBuilder::new(RuntimeAuditStage::UpdatesCoalesced)
                    .detail("applied", applied)
                    .detail("blocks", seen.len()),
            );
        }
    }

    async fn render(&mut self) -> Result<()> {
        self.table.take_dirty();
        let ctx = RenderContext {
            elapsed: self.started.elapsed(),
        };
        let frame = self.renderer.render(&self.table, &ctx)?;

        for fault in &frame.faults {
            self.log(
                LogLevel::Warn,
                "format_failed",
                [
                    json_kv("block", fault.block),
                    json_str("error", fault.error.to_string()),
                ],
            );
        }
        let format_errors = frame.faults.len();
        self.with_metrics(|metrics| {
            metrics.record_format_errors(format_errors);
            metrics.record_render(frame.changed);
        });

        if frame.changed {
            self.writer.write_line(&frame.line).await.map_err(output_error)?;
            self.audit(
                RuntimeAuditEventBuilder::new(RuntimeAuditStage::RenderCommitted)
                    .detail("segments", frame.segments)
                    .detail("line", frame.line.clone()),
            );
        } else {
            self.audit(RuntimeAuditEventBuilder::new(RuntimeAuditStage::RenderSkipped));
        }

        self.refresh_animation();
        Ok(())
    }

    fn refresh_animation(&mut self) {
        let wanted = self.table.animation_interval();
        let current = self.animation.as_ref().map(|(period, _)| *period);
        if wanted == current {
            return;
        }
        self.animation = wanted.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            (period, interval)
        });
    }

    fn handle_joined(&mut self, joined: std::result::Result<Joined, JoinError>) {
        let Ok((index, outcome)) = joined else {
            return;
        };
        let kind = self
            .table
            .slot(index)
            .map(|slot| slot.kind.clone())
            .unwrap_or_default();

        let error = match outcome {
            Ok(Ok(())) => {
                self.log(
                    LogLevel::Debug,
                    "block_finished",
                    [json_kv("block", index), json_str("kind", kind)],
                );
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(join) if join.is_panic() => "block task panicked".to_string(),
            Err(join) => join.to_string(),
        };

        if self.table.mark_faulted(index) {
            self.with_metrics(RuntimeMetrics::record_fault);
            self.log(
                LogLevel::Warn,
                "block_faulted",
                [
                    json_kv("block", index),
                    json_str("kind", kind.clone()),
                    json_str("error", error.clone()),
                ],
            );
            self.audit(
                RuntimeAuditEventBuilder::new(RuntimeAuditStage::BlockFaulted)
                    .detail("block", index)
                    .detail("kind", kind)
                    .detail("error", error),
            );
        }
    }

    fn route_click(&mut self, click: ClickEvent) {
        let block = click.block;
        let button = click.button.code();
        let outcome = self.router.route(click);
        let routed = !outcome.is_dropped();

        self.with_metrics(|metrics| {
            metrics.record_event();
            metrics.record_click(routed);
        });
        self.log(
            LogLevel::Debug,
            "click_routed",
            [
                json_kv("block", block),
                json_kv("button", button),
                json_str("outcome", format!("{outcome:?}")),
            ],
        );
        let stage = if routed {
            RuntimeAuditStage::ClickRouted
        } else {
            RuntimeAuditStage::ClickDropped
        };
        self.audit(
            RuntimeAuditEventBuilder::new(stage)
                .detail("block", block)
                .detail("button", button),
        );
    }

    fn dispatch_signal(&mut self, signal: BarSignal) {
        let outcome = self.router.dispatch_signal(signal);
        self.with_metrics(|metrics| {
            metrics.record_event();
            metrics.record_signal();
        });
        self.log(
            LogLevel::Debug,
            "signal_dispatched",
            [
                json_str("signal", format!("{signal:?}")),
                json_kv("delivered", outcome.delivered),
                json_kv("dropped", outcome.dropped),
            ],
        );
        self.audit(
            RuntimeAuditEventBuilder::new(RuntimeAuditStage::SignalDispatched)
                .detail("signal", format!("{signal:?}"))
                .detail("delivered", outcome.delivered),
        );
    }

    async fn finalize(mut self, reason: ExitReason) -> Result<ExitReason> {
        if let Ok(first) = self.update_rx.try_recv() {
            self.merge_updates(first);
        }
        if self.table.has_dirty() {
            self.render().await?;
        }
        if reason == ExitReason::Shutdown {
            self.writer.write_final().await.map_err(output_error)?;
        }

        self.stop.cancel();
        let abandoned = self.wait_for_blocks().await;

        self.emit_metrics();
        self.log(
            LogLevel::Info,
            "runtime_stopped",
            [
                json_str("reason", format!("{reason:?}")),
                json_kv("uptime_ms", self.started.elapsed().as_millis() as u64),
                json_kv("lines", self.writer.lines_written()),
                json_kv("abandoned_blocks", abandoned),
            ],
        );
        self.audit(
            RuntimeAuditEventBuilder::new(RuntimeAuditStage::RuntimeStopped)
                .detail("reason", format!("{reason:?}"))
                .detail("abandoned", abandoned),
        );
        Ok(reason)
    }

    /// Wait up to the grace period for block tasks; returns how many were left running.
    async fn wait_for_blocks(&mut self) -> usize {
        let tasks = &mut self.tasks;
        let updates = &mut self.update_rx;
        let drained = tokio::time::timeout(self.config.shutdown_grace, async {
            loop {
                tokio::select! {
                    joined = tasks.join_next() => if joined.is_none() { break },
                    // Keep blocks that are mid-send from stalling on a full channel.
                    _ = updates.recv() => {}
                }
            }
        })
        .await;

        if drained.is_ok() {
            return 0;
        }
        let abandoned = self.tasks.len();
        self.tasks.detach_all();
        abandoned
    }

    fn ensure_metrics_initialized(&mut self) {
        if self.config.metrics.is_none() && self.config.metrics_interval > Duration::ZERO {
            self.config.enable_metrics();
        }
    }

    fn metrics_ticker(&self) -> Option<Interval> {
        if self.config.metrics.is_none() || self.config.metrics_interval.is_zero() {
            return None;
        }
        let period = self.config.metrics_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(interval)
    }

    fn emit_metrics(&self) {
        let Some(metrics) = self.config.metrics.as_ref() else {
            return;
        };
        if let Ok(guard) = metrics.lock() {
            let event = guard
                .snapshot(self.started.elapsed())
                .to_log_event(&self.config.metrics_target);
            let _ = self.config.logger.log_event(event);
        }
    }

    fn with_metrics(&self, update: impl FnOnce(&mut RuntimeMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                update(&mut guard);
            }
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        self.config.logger.emit(level, TARGET, message, fields);
    }

    fn audit(&self, builder: RuntimeAuditEventBuilder) {
        if let Some(audit) = self.config.audit.as_ref() {
            audit.record(builder.finish());
        }
    }
}

impl<W> std::fmt::Debug for BarRuntime<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarRuntime")
            .field("slots", &self.table.len())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

fn output_error(err: ProtocolError) -> BarError {
    match err {
        ProtocolError::Write(io) => BarError::OutputClosed(io),
        other => BarError::Protocol(other),
    }
}

async fn tick(animation: &mut Option<(Duration, Interval)>) {
    match animation {
        Some((_, interval)) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn tick_metrics(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
