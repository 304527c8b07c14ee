//! Status-bar engine for hosts speaking the i3bar protocol (i3bar, swaybar).
//!
//! Blocks run as independent tokio tasks and push whole [`Widget`]s to a
//! single [`BarRuntime`], which keeps the latest widget of each block in
//! configuration order, renders them through the [`formatting`] engine and
//! streams JSON lines to the host. Clicks coming back from the host are
//! routed to the block that produced the clicked segment.

pub mod block;
pub mod config;
pub mod error;
pub mod formatting;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod routing;
pub mod runtime;
pub mod theme;
pub mod widget;
pub mod width;

pub use block::{
    Block, BlockApi, BlockContext, BlockEvent, BlockFactory, BlockRegistry, CustomBlock, TextBlock,
    TimeBlock, Wake, WidgetSender,
};
pub use config::{BlockSpec, Config, LogConfig, RuntimeSection};
pub use error::{
    BarError, BlockError, BlockResult, CompileError, ConfigError, ProtocolError, RenderError, Result,
};
pub use formatting::{Format, FormatConfig, RenderContext, Unit, Value, Values};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult, NullSink,
    StderrSink,
};
pub use metrics::{MetricSnapshot, RuntimeMetrics};
pub use protocol::{
    ClickEvent, Header, I3BarBlock, MouseButton, ProtocolWriter, ReaderOptions, parse_event_line,
    read_events,
};
pub use registry::{Slot, WidgetTable};
pub use render::{BarRenderer, Frame};
pub use routing::{BarSignal, ClickHandler, ClickRouter, RouteOutcome};
pub use runtime::audit::{
    MemoryAudit, NullRuntimeAudit, RuntimeAudit, RuntimeAuditEvent, RuntimeAuditEventBuilder,
    RuntimeAuditStage,
};
pub use runtime::driver::stdio::StdioDriver;
pub use runtime::signals::max_custom_signal;
pub use runtime::{BarRuntime, ExitReason, RuntimeConfig, RuntimeEvent, SlotOptions};
pub use theme::{Color, Icons, SeparatorColor, SharedConfig, Theme};
pub use widget::{Segment, State, Widget};
pub use width::display_width;
