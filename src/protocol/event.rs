use std::str::FromStr;

use serde::Deserialize;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    Back,
    Forward,
    Unknown,
}

impl MouseButton {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Left,
            2 => Self::Middle,
            3 => Self::Right,
            4 => Self::WheelUp,
            5 => Self::WheelDown,
            8 => Self::Back,
            9 => Self::Forward,
            _ => Self::Unknown,
        }
    }

    /// Host button number; `0` for buttons the protocol does not name.
    pub fn code(self) -> u32 {
        match self {
            Self::Left => 1,
            Self::Middle => 2,
            Self::Right => 3,
            Self::WheelUp => 4,
            Self::WheelDown => 5,
            Self::Back => 8,
            Self::Forward => 9,
            Self::Unknown => 0,
        }
    }

    /// Swap the wheel directions; other buttons pass through.
    pub fn inverted(self) -> Self {
        match self {
            Self::WheelUp => Self::WheelDown,
            Self::WheelDown => Self::WheelUp,
            other => other,
        }
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "left" => Self::Left,
            "middle" => Self::Middle,
            "right" => Self::Right,
            "up" | "wheel_up" => Self::WheelUp,
            "down" | "wheel_down" => Self::WheelDown,
            "back" => Self::Back,
            "forward" => Self::Forward,
            other => return Err(other.to_string()),
        })
    }
}

/// A host click, resolved to the block and segment it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub block: usize,
    pub instance: Option<usize>,
    pub button: MouseButton,
    pub x: i64,
    pub y: i64,
    pub relative_x: i64,
    pub relative_y: i64,
    pub width: i64,
    pub height: i64,
    pub modifiers: Vec<String>,
}

impl ClickEvent {
    pub fn new(block: usize, button: MouseButton) -> Self {
        Self {
            block,
            instance: None,
            button,
            x: 0,
            y: 0,
            relative_x: 0,
            relative_y: 0,
            width: 0,
            height: 0,
            modifiers: Vec::new(),
        }
    }

    pub fn with_instance(mut self, instance: usize) -> Self {
        self.instance = Some(instance);
        self
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    name: Option<String>,
    instance: Option<String>,
    button: u32,
    #[serde(default)]
    x: i64,
    #[serde(default)]
    y: i64,
    #[serde(default)]
    relative_x: i64,
    #[serde(default)]
    relative_y: i64,
    #[serde(default)]
    width: i64,
    #[serde(default)]
    height: i64,
    #[serde(default)]
    modifiers: Vec<String>,
}

/// Parse one line of the host's click stream.
///
/// Lines carry the array punctuation of the endless stream (`[` on the first
/// line, a leading `,` on later ones). Blank and punctuation-only lines yield
/// `Ok(None)`.
pub fn parse_event_line(line: &str, invert_scrolling: bool) -> Result<Option<ClickEvent>, ProtocolError> {
    let body = line
        .trim()
        .trim_start_matches(|c: char| c == '[' || c == ',' || c.is_whitespace());
    if body.is_empty() || body == "]" {
        return Ok(None);
    }

    let raw: RawEvent = serde_json::from_str(body)?;
    let name = raw.name.ok_or(ProtocolError::MissingTarget)?;
    let block = name
        .parse::<usize>()
        .map_err(|_| ProtocolError::InvalidTarget(name.clone()))?;

    let mut button = MouseButton::from_code(raw.button);
    if invert_scrolling {
        button = button.inverted();
    }

    Ok(Some(ClickEvent {
        block,
        instance: raw.instance.and_then(|instance| instance.parse().ok()),
        button,
        x: raw.x,
        y: raw.y,
        relative_x: raw.relative_x,
        relative_y: raw.relative_y,
        width: raw.width,
        height: raw.height,
        modifiers: raw.modifiers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_and_following_lines() {
        let first = parse_event_line(r#"[{"name":"2","instance":"1","button":1,"x":10,"y":4}"#, false)
            .unwrap()
            .unwrap();
        assert_eq!(first.block, 2);
        assert_eq!(first.instance, Some(1));
        assert_eq!(first.button, MouseButton::Left);
        assert_eq!((first.x, first.y), (10, 4));

        let next = parse_event_line(r#",{"name":"0","button":3,"modifiers":["Shift"]}"#, false)
            .unwrap()
            .unwrap();
        assert_eq!(next.block, 0);
        assert_eq!(next.instance, None);
        assert_eq!(next.button, MouseButton::Right);
        assert_eq!(next.modifiers, vec!["Shift".to_string()]);
    }

    #[test]
    fn punctuation_lines_are_skipped() {
        assert_eq!(parse_event_line("[", false).unwrap(), None);
        assert_eq!(parse_event_line("  ", false).unwrap(), None);
    }

    #[test]
    fn malformed_and_untargeted_lines_are_errors() {
        assert!(matches!(
            parse_event_line("{\"name\":", false),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            parse_event_line(r#"{"button":1}"#, false),
            Err(ProtocolError::MissingTarget)
        ));
        assert!(matches!(
            parse_event_line(r#"{"name":"cpu","button":1}"#, false),
            Err(ProtocolError::InvalidTarget(_))
        ));
    }

    #[test]
    fn scrolling_can_be_inverted() {
        let line = r#"{"name":"1","button":4}"#;
        let normal = parse_event_line(line, false).unwrap().unwrap();
        let inverted = parse_event_line(line, true).unwrap().unwrap();
        assert_eq!(normal.button, MouseButton::WheelUp);
        assert_eq!(inverted.button, MouseButton::WheelDown);
    }

    #[test]
    fn unknown_codes_map_to_unknown() {
        assert_eq!(MouseButton::from_code(7), MouseButton::Unknown);
        assert_eq!("forward".parse(), Ok(MouseButton::Forward));
    }
}
