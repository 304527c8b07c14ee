use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{interval_from_secs, parse_params};
use crate::block::{Block, BlockApi, BlockContext, BlockEvent, Wake};
use crate::error::{BlockError, BlockResult};
use crate::formatting::{Format, FormatConfig, Value, Values};
use crate::logging::{LogLevel, json_kv, json_str};
use crate::protocol::MouseButton;
use crate::widget::{Segment, State, Widget};

const DEFAULT_FORMAT: &str = "$text";
/// Short template used in JSON mode when none is configured.
const DEFAULT_JSON_SHORT: &str = "$short_text|$text";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum RefreshConfig {
    Seconds(f64),
    Keyword(String),
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CustomConfig {
    command: Option<String>,
    cycle: Option<Vec<String>>,
    interval: RefreshConfig,
    json: bool,
    hide_when_empty: bool,
    format: FormatConfig,
    icon: Option<String>,
    shell: String,
}

impl Default for CustomConfig {
    fn default() -> Self {
        Self {
            command: None,
            cycle: None,
            interval: RefreshConfig::Seconds(10.0),
            json: false,
            hide_when_empty: false,
            format: FormatConfig::default(),
            icon: None,
            shell: "sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Refresh {
    Every(Duration),
    /// Only on clicks and signals.
    Once,
}

/// What a command printed, after interpretation.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct Output {
    text: String,
    short_text: Option<String>,
    icon: Option<String>,
    state: State,
}

impl Output {
    fn plain(text: String, state: State) -> Self {
        Self {
            text,
            state,
            ..Self::default()
        }
    }
}

/// Runs a shell command and shows its output as `$text`.
///
/// With `cycle`, each click switches to the next command. With `json`, the
/// command prints `{"text", "short_text", "icon", "state"}` instead of plain
/// text. The clicked button is passed to the command in `BLOCK_BUTTON`.
#[derive(Debug)]
pub struct CustomBlock {
    commands: Vec<String>,
    shell: String,
    refresh: Refresh,
    json: bool,
    hide_when_empty: bool,
    format: Arc<Format>,
    icon: Option<String>,
}

pub(crate) fn factory(_ctx: &BlockContext, params: toml::Table) -> BlockResult<Box<dyn Block>> {
    let config: CustomConfig = parse_params(params)?;
    let commands = match (config.command, config.cycle) {
        (Some(command), None) => vec![command],
        (None, Some(cycle)) if !cycle.is_empty() => cycle,
        (None, Some(_)) => return Err(BlockError::Config("`cycle` must not be empty".to_string())),
        (None, None) => {
            return Err(BlockError::Config("either `command` or `cycle` is required".to_string()));
        }
        (Some(_), Some(_)) => {
            return Err(BlockError::Config("`command` and `cycle` are mutually exclusive".to_string()));
        }
    };
    let refresh = match config.interval {
        RefreshConfig::Seconds(secs) => Refresh::Every(interval_from_secs(secs)?),
        RefreshConfig::Keyword(word) if word == "once" => Refresh::Once,
        RefreshConfig::Keyword(word) => {
            return Err(BlockError::Config(format!(
                "interval must be a number of seconds or \"once\", got {word:?}"
            )));
        }
    };
    let short = config.json.then_some(DEFAULT_JSON_SHORT);
    Ok(Box::new(CustomBlock {
        commands,
        shell: config.shell,
        refresh,
        json: config.json,
        hide_when_empty: config.hide_when_empty,
        format: Arc::new(config.format.with_defaults(DEFAULT_FORMAT, short)?),
        icon: config.icon,
    }))
}

impl CustomBlock {
    async fn execute(&self, command: &str, button: Option<MouseButton>) -> Output {
        let mut child = Command::new(&self.shell);
        child
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(button) = button {
            child.env("BLOCK_BUTTON", button.code().to_string());
        }

        match child.output().await {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if self.json {
                    parse_json(&stdout)
                } else {
                    Output::plain(first_line(&stdout), State::Idle)
                }
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let text = match first_line(&stderr) {
                    line if line.is_empty() => output.status.to_string(),
                    line => line,
                };
                Output::plain(text, State::Critical)
            }
            Err(err) => Output::plain(format!("cannot run {}: {err}", self.shell), State::Critical),
        }
    }

    fn widget(&self, output: Output) -> Widget {
        if self.hide_when_empty && output.text.is_empty() {
            return Widget::new();
        }
        let mut values = Values::from([("text".to_string(), Value::text(output.text))]);
        if let Some(short) = output.short_text {
            values.insert("short_text".to_string(), Value::text(short));
        }
        let mut segment = Segment::formatted(Arc::clone(&self.format), values).with_state(output.state);
        if let Some(icon) = output.icon.or_else(|| self.icon.clone()) {
            segment = segment.with_icon(icon);
        }
        Widget::single(segment)
    }
}

fn first_line(output: &str) -> String {
    output.lines().next().unwrap_or_default().trim_end().to_string()
}

fn parse_json(stdout: &str) -> Output {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Output::default();
    }
    serde_json::from_str(stdout)
        .unwrap_or_else(|err| Output::plain(format!("invalid JSON: {err}"), State::Critical))
}

#[async_trait]
impl Block for CustomBlock {
    fn kind(&self) -> &str {
        "custom"
    }

    async fn run(self: Box<Self>, mut api: BlockApi) -> BlockResult<()> {
        let mut current = 0;
        let mut button = None;
        loop {
            let output = self.execute(&self.commands[current], button.take()).await;
            if output.state == State::Critical {
                api.logger().emit(
                    LogLevel::Warn,
                    "bar::block.custom",
                    "command_failed",
                    [json_kv("block", api.id()), json_str("output", output.text.clone())],
                );
            }
            api.set_widget(self.widget(output)).await?;

            let wake = match self.refresh {
                Refresh::Every(period) => api.wait_for(period).await,
                Refresh::Once => match api.next_event().await {
                    Some(event) => Wake::Event(event),
                    None => Wake::Stop,
                },
            };
            match wake {
                Wake::Stop => return Ok(()),
                Wake::Event(BlockEvent::Click(click)) => {
                    current = (current + 1) % self.commands.len();
                    button = Some(click.button);
                }
                Wake::Event(BlockEvent::Refresh) | Wake::Tick => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::testing::harness;
    use crate::formatting::RenderContext;
    use crate::logging::Logger;
    use crate::protocol::ClickEvent;
    use crate::theme::{Icons, SharedConfig, Theme};
    use crate::widget::RenderedSegment;

    fn build(source: &str) -> BlockResult<Box<dyn Block>> {
        let ctx = BlockContext {
            id: 0,
            shared: SharedConfig::default(),
            logger: Logger::disabled(),
        };
        factory(&ctx, toml::from_str(source).unwrap())
    }

    fn rendered(widget: &Widget, shared: &SharedConfig) -> RenderedSegment {
        widget.segments()[0]
            .render(shared, &RenderContext::default())
            .unwrap()
            .unwrap()
    }

    fn text_of(widget: &Widget) -> String {
        rendered(widget, &SharedConfig::default()).full_text
    }

    #[test]
    fn validates_configuration() {
        assert!(matches!(build("interval = 5"), Err(BlockError::Config(_))));
        assert!(matches!(
            build("command = \"true\"\ninterval = \"sometimes\""),
            Err(BlockError::Config(_))
        ));
        assert!(matches!(
            build("command = \"true\"\ncycle = [\"true\"]"),
            Err(BlockError::Config(_))
        ));
        assert!(matches!(build("cycle = []"), Err(BlockError::Config(_))));
        assert!(build("command = \"true\"\ninterval = \"once\"").is_ok());
        assert!(build("cycle = [\"echo a\", \"echo b\"]").is_ok());
    }

    #[test]
    fn unrepresentable_intervals_are_config_errors() {
        for source in ["command = \"true\"\ninterval = 1e300", "command = \"true\"\ninterval = inf"] {
            assert!(matches!(build(source), Err(BlockError::Config(_))), "{source}");
        }
    }

    #[tokio::test]
    async fn click_reruns_with_button_in_environment() {
        let block = build("command = \"echo clicked:${BLOCK_BUTTON:-none}\"\ninterval = \"once\"").unwrap();
        let mut h = harness(2);
        let task = tokio::spawn(block.run(h.api));

        let first = h.updates.recv().await.unwrap();
        assert_eq!(text_of(&first.widget), " clicked:none ");

        let click = ClickEvent::new(2, MouseButton::Right);
        h.events.send(BlockEvent::Click(click)).await.unwrap();
        let second = h.updates.recv().await.unwrap();
        assert_eq!(text_of(&second.widget), " clicked:3 ");

        h.stop.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failing_command_is_critical() {
        let block = build("command = \"echo broken >&2; exit 3\"\ninterval = \"once\"").unwrap();
        let mut h = harness(0);
        let task = tokio::spawn(block.run(h.api));

        let update = h.updates.recv().await.unwrap();
        let segment = rendered(&update.widget, &SharedConfig::default());
        assert_eq!(segment.state, State::Critical);
        assert_eq!(segment.full_text, " broken ");

        h.stop.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn clicks_step_through_cycle() {
        let block = build("cycle = [\"echo on\", \"echo off\"]\ninterval = \"once\"").unwrap();
        let mut h = harness(1);
        let task = tokio::spawn(block.run(h.api));

        let mut seen = vec![text_of(&h.updates.recv().await.unwrap().widget)];
        for _ in 0..2 {
            let click = ClickEvent::new(1, MouseButton::Left);
            h.events.send(BlockEvent::Click(click)).await.unwrap();
            seen.push(text_of(&h.updates.recv().await.unwrap().widget));
        }
        assert_eq!(seen, vec![" on ", " off ", " on "]);

        // A refresh re-runs the current command without advancing.
        h.events.send(BlockEvent::Refresh).await.unwrap();
        assert_eq!(text_of(&h.updates.recv().await.unwrap().widget), " on ");

        h.stop.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn json_output_sets_text_icon_and_state() {
        let command = r#"command = '''echo '{"text":"Danger!","short_text":"D","icon":"bolt","state":"warning"}' '''
json = true
interval = "once""#;
        let block = build(command).unwrap();
        let mut h = harness(0);
        let task = tokio::spawn(block.run(h.api));

        let update = h.updates.recv().await.unwrap();
        let icons = Icons::from([("bolt".to_string(), "B".to_string())]);
        let shared = SharedConfig::new(Theme::default(), icons, "{icon} ");
        let segment = rendered(&update.widget, &shared);
        assert_eq!(segment.full_text, "B Danger! ");
        assert_eq!(segment.short_text.as_deref(), Some("B D "));
        assert_eq!(segment.state, State::Warning);

        h.stop.cancel();
        task.await.unwrap().unwrap();
    }

    #[test]
    fn json_without_short_text_falls_back_to_text() {
        let output = parse_json(r#"{"text":"hi"}"#);
        assert_eq!(output, Output::plain("hi".to_string(), State::Idle));

        let block = CustomBlock {
            commands: vec![],
            shell: "sh".to_string(),
            refresh: Refresh::Once,
            json: true,
            hide_when_empty: false,
            format: Arc::new(FormatConfig::Unset.with_defaults(DEFAULT_FORMAT, Some(DEFAULT_JSON_SHORT)).unwrap()),
            icon: None,
        };
        let segment = rendered(&block.widget(output), &SharedConfig::default());
        assert_eq!(segment.short_text.as_deref(), Some(" hi "));
    }

    #[test]
    fn invalid_json_is_critical() {
        let output = parse_json("not json");
        assert_eq!(output.state, State::Critical);
        assert!(output.text.starts_with("invalid JSON"));
    }

    #[tokio::test]
    async fn empty_output_hides_block_when_asked() {
        let block = build("command = \"true\"\nhide_when_empty = true\ninterval = \"once\"").unwrap();
        let mut h = harness(0);
        let task = tokio::spawn(block.run(h.api));

        let update = h.updates.recv().await.unwrap();
        assert!(update.widget.is_empty());

        h.stop.cancel();
        task.await.unwrap().unwrap();
    }
}
