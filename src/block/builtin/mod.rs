mod custom;
mod text;
mod time;

use std::time::Duration;

use crate::error::{BlockError, BlockResult};

pub use custom::CustomBlock;
pub use text::TextBlock;
pub use time::TimeBlock;

pub(crate) use custom::factory as custom_factory;
pub(crate) use text::factory as text_factory;
pub(crate) use time::factory as time_factory;

/// Deserialize a block's kind-specific keys.
fn parse_params<T>(params: toml::Table) -> BlockResult<T>
where
    T: serde::de::DeserializeOwned,
{
    Ok(toml::Value::Table(params).try_into()?)
}

/// Validate a refresh period given in seconds.
fn interval_from_secs(secs: f64) -> BlockResult<Duration> {
    if !(secs > 0.0) {
        return Err(BlockError::Config(format!("interval must be positive, got {secs}")));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| BlockError::Config(format!("interval {secs} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_must_be_positive_and_representable() {
        assert_eq!(interval_from_secs(2.5).unwrap(), Duration::from_millis(2500));
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e300] {
            assert!(matches!(interval_from_secs(secs), Err(BlockError::Config(_))), "{secs}");
        }
    }
}
