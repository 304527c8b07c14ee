use thiserror::Error;

/// Unified result type for the barkeep crate.
pub type Result<T> = std::result::Result<T, BarError>;

/// Result type used by block implementations.
pub type BlockResult<T> = std::result::Result<T, BlockError>;

/// A format template could not be compiled. Raised at block construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("unknown formatter `{0}`")]
    UnknownFormatter(String),
    #[error("invalid argument for `{formatter}`: {message}")]
    InvalidArgument {
        formatter: &'static str,
        message: String,
    },
}

impl CompileError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn argument(formatter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            formatter,
            message: message.into(),
        }
    }
}

/// A compiled template failed against a concrete set of values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("placeholder `{0}` not found")]
    MissingKey(String),
    #[error("cannot convert {from} into {to}")]
    UnitMismatch { from: String, to: String },
    #[error("{kind} value cannot be formatted with `{formatter}`")]
    TypeMismatch {
        formatter: &'static str,
        kind: &'static str,
    },
}

/// Failures raised inside a block task.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("{0}")]
    Message(String),
    #[error("invalid block configuration: {0}")]
    Config(String),
    #[error("format error: {0}")]
    Compile(#[from] CompileError),
    #[error("runtime stopped accepting updates")]
    ChannelClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BlockError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<toml::de::Error> for BlockError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.message().to_string())
    }
}

/// Wire protocol failures on either direction of the host connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed event line: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event has no target block")]
    MissingTarget,
    #[error("event target `{0}` is not a block index")]
    InvalidTarget(String),
    #[error("failed to encode bar line: {0}")]
    Encode(serde_json::Error),
    #[error("output stream closed: {0}")]
    Write(std::io::Error),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file `{0}` not found")]
    NotFound(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid color `{0}`, expected #RRGGBB or #RRGGBBAA")]
    InvalidColor(String),
    #[error("unknown theme key `{0}`")]
    UnknownThemeKey(String),
    #[error("signal {signal} is outside 0..={max}")]
    InvalidSignal { signal: i32, max: i32 },
    #[error("unknown mouse button `{0}`")]
    InvalidButton(String),
    #[error("block entry #{0} is missing the `block` key")]
    MissingBlockKind(usize),
}

/// Errors surfaced by the runtime as a whole.
#[derive(Debug, Error)]
pub enum BarError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("block `{kind}` failed: {source}")]
    Block {
        kind: String,
        #[source]
        source: BlockError,
    },
    #[error("unknown block kind `{0}`")]
    UnknownBlock(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("output pipe closed")]
    OutputClosed(#[source] std::io::Error),
    #[error("logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BarError {
    pub fn block(kind: impl Into<String>, source: BlockError) -> Self {
        Self::Block {
            kind: kind.into(),
            source,
        }
    }
}
