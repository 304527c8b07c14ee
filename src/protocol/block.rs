use serde::Serialize;

use crate::widget::{Align, MinWidth};

/// First line of the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub version: u8,
    pub click_events: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cont_signal: Option<i32>,
}

impl Header {
    /// With `never_pause` the host is told not to stop the process when the
    /// bar is hidden.
    pub fn new(never_pause: bool) -> Self {
        let signal = never_pause.then_some(0);
        Self {
            version: 1,
            click_events: true,
            stop_signal: signal,
            cont_signal: signal,
        }
    }
}

/// One element of a rendered bar line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct I3BarBlock {
    pub full_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_width: Option<MinWidth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator_block_width: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_only_carries_signals_when_asked() {
        assert_eq!(
            serde_json::to_string(&Header::new(false)).unwrap(),
            r#"{"version":1,"click_events":true}"#
        );
        assert_eq!(
            serde_json::to_string(&Header::new(true)).unwrap(),
            r#"{"version":1,"click_events":true,"stop_signal":0,"cont_signal":0}"#
        );
    }

    #[test]
    fn block_skips_unset_fields() {
        let block = I3BarBlock {
            full_text: " cpu ".to_string(),
            name: Some("3".to_string()),
            min_width: Some(MinWidth::Text("100%".to_string())),
            align: Some(Align::Right),
            ..I3BarBlock::default()
        };
        assert_eq!(
            serde_json::to_string(&block).unwrap(),
            r#"{"full_text":" cpu ","min_width":"100%","align":"right","name":"3"}"#
        );
        let pixels = I3BarBlock {
            min_width: Some(MinWidth::Pixels(40)),
            ..I3BarBlock::default()
        };
        assert_eq!(
            serde_json::to_string(&pixels).unwrap(),
            r#"{"full_text":"","min_width":40}"#
        );
    }
}
