//! Delivers host clicks and OS signals to the blocks they target.
//!
//! Nothing here ever waits on a block: events go out with `try_send`, and a
//! full or closed channel just drops the event.

use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::block::BlockEvent;
use crate::error::ConfigError;
use crate::logging::{LogLevel, Logger, json_kv, json_str};
use crate::protocol::{ClickEvent, MouseButton};

const TARGET: &str = "bar::routing";

/// Signals the bar reacts to, already decoded from OS signal numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarSignal {
    /// Nudge every block.
    RefreshAll,
    /// Re-execute the binary in place.
    Restart,
    /// Real-time signal `SIGRTMIN + n`.
    Custom(i32),
}

/// A `[[block.click]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickHandler {
    #[serde(deserialize_with = "deserialize_button")]
    pub button: MouseButton,
    /// Shell command run detached on a matching click.
    #[serde(default)]
    pub cmd: Option<String>,
    /// Also forward the click to the block.
    #[serde(default)]
    pub update: bool,
}

fn deserialize_button<'de, D>(deserializer: D) -> Result<MouseButton, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    name.parse()
        .map_err(|name| serde::de::Error::custom(ConfigError::InvalidButton(name)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownBlock,
    /// The block's task is gone, or it never started.
    Closed,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Forwarded,
    /// A handler took the click and it was not forwarded.
    Handled,
    Dropped(DropReason),
}

impl RouteOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }
}

/// How many blocks a signal reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug)]
struct Route {
    events: Option<mpsc::Sender<BlockEvent>>,
    handlers: Vec<ClickHandler>,
    signal: Option<i32>,
}

/// Event senders and click handlers for every slot, by slot index.
#[derive(Debug)]
pub struct ClickRouter {
    routes: Vec<Route>,
    logger: Logger,
}

impl ClickRouter {
    pub fn new(logger: Logger) -> Self {
        Self {
            routes: Vec::new(),
            logger,
        }
    }

    /// Register the next slot. `events` is `None` for a block that failed to start.
    pub fn add_route(
        &mut self,
        events: Option<mpsc::Sender<BlockEvent>>,
        handlers: Vec<ClickHandler>,
        signal: Option<i32>,
    ) -> usize {
        self.routes.push(Route {
            events,
            handlers,
            signal,
        });
        self.routes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn route(&self, click: ClickEvent) -> RouteOutcome {
        let block = click.block;
        let Some(route) = self.routes.get(block) else {
            self.log_drop(block, DropReason::UnknownBlock);
            return RouteOutcome::Dropped(DropReason::UnknownBlock);
        };

        if let Some(handler) = route.handlers.iter().find(|handler| handler.button == click.button) {
            if let Some(cmd) = &handler.cmd {
                self.spawn_detached(block, cmd);
            }
            if !handler.update {
                return RouteOutcome::Handled;
            }
        }

        match self.deliver(route, BlockEvent::Click(click)) {
            Ok(()) => RouteOutcome::Forwarded,
            Err(reason) => {
                self.log_drop(block, reason);
                RouteOutcome::Dropped(reason)
            }
        }
    }

    /// Send a refresh to each block the signal targets. A signal nobody
    /// listens for does nothing.
    pub fn dispatch_signal(&self, signal: BarSignal) -> SignalOutcome {
        let mut outcome = SignalOutcome::default();
        for (index, route) in self.routes.iter().enumerate() {
            let targeted = match signal {
                BarSignal::RefreshAll => true,
                BarSignal::Custom(n) => route.signal == Some(n),
                BarSignal::Restart => false,
            };
            if !targeted || route.events.is_none() {
                continue;
            }
            match self.deliver(route, BlockEvent::Refresh) {
                Ok(()) => outcome.delivered += 1,
                Err(reason) => {
                    outcome.dropped += 1;
                    self.log_drop(index, reason);
                }
            }
        }
        outcome
    }

    fn deliver(&self, route: &Route, event: BlockEvent) -> Result<(), DropReason> {
        let Some(events) = &route.events else {
            return Err(DropReason::Closed);
        };
        events.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => DropReason::Full,
            TrySendError::Closed(_) => DropReason::Closed,
        })
    }

    fn spawn_detached(&self, block: usize, cmd: &str) {
        let spawned = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
            }
            Err(err) => self.logger.emit(
                LogLevel::Warn,
                TARGET,
                "click_command_failed",
                [
                    json_kv("block", block),
                    json_str("cmd", cmd),
                    json_str("error", err.to_string()),
                ],
            ),
        }
    }

    fn log_drop(&self, block: usize, reason: DropReason) {
        self.logger.emit(
            LogLevel::Debug,
            TARGET,
            "event_dropped",
            [
                json_kv("block", block),
                json_str("reason", format!("{reason:?}")),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(slots: usize) -> (ClickRouter, Vec<mpsc::Receiver<BlockEvent>>) {
        let mut router = ClickRouter::new(Logger::disabled());
        let mut receivers = Vec::new();
        for index in 0..slots {
            let (tx, rx) = mpsc::channel(4);
            router.add_route(Some(tx), Vec::new(), Some(index as i32));
            receivers.push(rx);
        }
        (router, receivers)
    }

    #[tokio::test]
    async fn click_reaches_exactly_one_block() {
        let (router, mut receivers) = router(3);
        let click = ClickEvent::new(1, MouseButton::Left);
        assert_eq!(router.route(click.clone()), RouteOutcome::Forwarded);

        assert_eq!(receivers[1].try_recv().unwrap(), BlockEvent::Click(click));
        assert!(receivers[0].try_recv().is_err());
        assert!(receivers[2].try_recv().is_err());
    }

    #[tokio::test]
    async fn out_of_range_and_closed_are_dropped() {
        let (router, mut receivers) = router(2);
        assert_eq!(
            router.route(ClickEvent::new(9, MouseButton::Left)),
            RouteOutcome::Dropped(DropReason::UnknownBlock)
        );

        receivers.remove(0);
        assert_eq!(
            router.route(ClickEvent::new(0, MouseButton::Left)),
            RouteOutcome::Dropped(DropReason::Closed)
        );
    }

    #[tokio::test]
    async fn full_channel_drops_without_blocking() {
        let mut router = ClickRouter::new(Logger::disabled());
        let (tx, _rx) = mpsc::channel(1);
        router.add_route(Some(tx), Vec::new(), None);
        assert_eq!(router.route(ClickEvent::new(0, MouseButton::Left)), RouteOutcome::Forwarded);
        assert_eq!(
            router.route(ClickEvent::new(0, MouseButton::Left)),
            RouteOutcome::Dropped(DropReason::Full)
        );
    }

    #[tokio::test]
    async fn handlers_decide_whether_clicks_are_forwarded() {
        let mut router = ClickRouter::new(Logger::disabled());
        let (tx, mut rx) = mpsc::channel(4);
        let handlers = vec![
            ClickHandler {
                button: MouseButton::Right,
                cmd: Some("true".to_string()),
                update: false,
            },
            ClickHandler {
                button: MouseButton::Middle,
                cmd: None,
                update: true,
            },
        ];
        router.add_route(Some(tx), handlers, None);

        assert_eq!(router.route(ClickEvent::new(0, MouseButton::Right)), RouteOutcome::Handled);
        assert!(rx.try_recv().is_err());

        assert_eq!(router.route(ClickEvent::new(0, MouseButton::Middle)), RouteOutcome::Forwarded);
        assert_eq!(router.route(ClickEvent::new(0, MouseButton::Left)), RouteOutcome::Forwarded);
        assert_eq!(rx.try_recv().unwrap(), BlockEvent::Click(ClickEvent::new(0, MouseButton::Middle)));
    }

    #[tokio::test]
    async fn signals_target_configured_blocks() {
        let (router, mut receivers) = router(3);
        assert_eq!(
            router.dispatch_signal(BarSignal::Custom(2)),
            SignalOutcome {
                delivered: 1,
                dropped: 0
            }
        );
        assert_eq!(receivers[2].try_recv().unwrap(), BlockEvent::Refresh);
        assert!(receivers[0].try_recv().is_err());

        assert_eq!(router.dispatch_signal(BarSignal::Custom(7)), SignalOutcome::default());
        assert_eq!(router.dispatch_signal(BarSignal::RefreshAll).delivered, 3);
    }

    #[test]
    fn handler_buttons_parse_from_config() {
        let handler: ClickHandler = toml::from_str("button = \"up\"\nupdate = true").unwrap();
        assert_eq!(handler.button, MouseButton::WheelUp);
        assert!(toml::from_str::<ClickHandler>("button = \"sideways\"").is_err());
    }
}
