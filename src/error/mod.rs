mod types;

pub use types::{
    BarError, BlockError, BlockResult, CompileError, ConfigError, ProtocolError, RenderError,
    Result,
};
