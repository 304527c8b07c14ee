//! TOML configuration: bar-wide settings plus the ordered list of blocks.
//!
//! ```toml
//! icons_format = " {icon} "
//!
//! [theme]
//! critical_fg = "#ff0000"
//!
//! [icons]
//! time = "T"
//!
//! [[block]]
//! block = "time"
//! interval = 5
//! signal = 2
//!
//! [[block.click]]
//! button = "left"
//! cmd = "notify-send now"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::logging::{FileSink, LogLevel, Logger, LoggingResult, StderrSink};
use crate::routing::ClickHandler;
use crate::theme::{DEFAULT_ICONS_FORMAT, Icons, SharedConfig, Theme};

/// File name looked up in the configuration directories.
pub const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "barkeep";
const DEFAULT_LOG_MAX_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_icons_format")]
    pub icons_format: String,
    #[serde(default)]
    pub invert_scrolling: bool,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub icons: Icons,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default, rename = "block")]
    blocks: Vec<toml::Table>,
}

fn default_icons_format() -> String {
    DEFAULT_ICONS_FORMAT.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
    pub max_bytes: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            max_bytes: DEFAULT_LOG_MAX_BYTES,
        }
    }
}

impl LogConfig {
    pub fn build_logger(&self) -> LoggingResult<Logger> {
        let logger = match &self.file {
            Some(path) => Logger::new(FileSink::new(path, self.max_bytes)?),
            None => Logger::new(StderrSink),
        };
        Ok(logger.with_level(self.level))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSection {
    pub shutdown_grace_ms: u64,
    /// Zero disables metrics snapshots.
    pub metrics_interval_secs: u64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 500,
            metrics_interval_secs: 60,
        }
    }
}

impl RuntimeSection {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }
}

/// One `[[block]]` entry with the shared keys pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSpec {
    pub kind: String,
    pub signal: Option<i32>,
    pub icons_format: Option<String>,
    pub theme_overrides: Option<HashMap<String, String>>,
    pub click: Vec<ClickHandler>,
    /// Everything else, handed to the block's factory.
    pub params: toml::Table,
}

impl BlockSpec {
    fn from_table(index: usize, mut table: toml::Table, max_signal: Option<i32>) -> Result<Self, ConfigError> {
        let kind: String = take(&mut table, "block")?.ok_or(ConfigError::MissingBlockKind(index))?;
        let signal: Option<i32> = take(&mut table, "signal")?;
        if let Some(signal) = signal {
            let max = max_signal.unwrap_or(-1);
            if !(0..=max).contains(&signal) {
                return Err(ConfigError::InvalidSignal { signal, max });
            }
        }
        Ok(Self {
            kind,
            signal,
            icons_format: take(&mut table, "icons_format")?,
            theme_overrides: take(&mut table, "theme_overrides")?,
            click: take(&mut table, "click")?.unwrap_or_default(),
            params: table,
        })
    }

    /// Bar-wide settings with this block's overrides applied.
    pub fn shared(&self, base: &SharedConfig) -> Result<SharedConfig, ConfigError> {
        base.with_overrides(self.theme_overrides.as_ref(), self.icons_format.as_deref())
    }
}

fn take<T>(table: &mut toml::Table, key: &str) -> Result<Option<T>, ConfigError>
where
    T: serde::de::DeserializeOwned,
{
    table
        .remove(key)
        .map(toml::Value::try_into)
        .transpose()
        .map_err(ConfigError::from)
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(source)?)
    }
}

impl Config {
    /// Locate and parse the configuration file.
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let path = resolve_path(path, &search_dirs())?;
        let source = std::fs::read_to_string(&path)?;
        Ok((source.parse()?, path))
    }

    pub fn shared(&self) -> SharedConfig {
        SharedConfig::new(self.theme.clone(), self.icons.clone(), &self.icons_format)
    }

    /// Block entries in configuration order.
    pub fn block_specs(&self, max_signal: Option<i32>) -> Result<Vec<BlockSpec>, ConfigError> {
        self.blocks
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, table)| BlockSpec::from_table(index, table, max_signal))
            .collect()
    }
}

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|value| !value.is_empty()) {
        dirs.push(PathBuf::from(xdg).join(APP_DIR));
    }
    if let Some(home) = std::env::var_os("HOME").filter(|value| !value.is_empty()) {
        dirs.push(PathBuf::from(home).join(".config").join(APP_DIR));
    }
    dirs
}

/// An existing `path` wins; a bare name is also looked up in `dirs`; without
/// a path the default file name is searched.
fn resolve_path(path: Option<&Path>, dirs: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    let name = match path {
        Some(path) if path.exists() => return Ok(path.to_path_buf()),
        Some(path) => path,
        None => Path::new(CONFIG_FILE),
    };
    if name.components().count() == 1 {
        if let Some(found) = dirs.iter().map(|dir| dir.join(name)).find(|candidate| candidate.exists()) {
            return Ok(found);
        }
    }
    Err(ConfigError::NotFound(name.display().to_string()))
}
