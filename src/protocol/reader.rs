use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::mpsc;

use super::event::parse_event_line;
use crate::logging::{LogLevel, Logger, json_kv, json_str};
use crate::runtime::RuntimeEvent;

const TARGET: &str = "bar::protocol";
const MAX_LOGGED_LINE: usize = 200;
/// Longest click line accepted from the host; longer lines are dropped.
pub const MAX_LINE_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    pub invert_scrolling: bool,
}

/// Forward host clicks to the runtime until the input closes or the runtime
/// goes away. Lines that do not parse are logged and dropped.
pub async fn read_events<R>(
    mut input: R,
    events: mpsc::Sender<RuntimeEvent>,
    options: ReaderOptions,
    logger: Logger,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let limit = MAX_LINE_BYTES as u64 + 1;
        if (&mut input).take(limit).read_until(b'\n', &mut buf).await? == 0 {
            logger.emit(LogLevel::Debug, TARGET, "input_closed", std::iter::empty());
            return Ok(());
        }
        if buf.len() > MAX_LINE_BYTES && buf.last() != Some(&b'\n') {
            let skipped = discard_line(&mut input).await?;
            logger.emit(
                LogLevel::Warn,
                TARGET,
                "event_line_dropped",
                [
                    json_str("error", format!("line exceeds {MAX_LINE_BYTES} bytes")),
                    json_kv("bytes", buf.len() + skipped),
                ],
            );
            continue;
        }
        let line = String::from_utf8_lossy(&buf);

        match parse_event_line(&line, options.invert_scrolling) {
            Ok(Some(click)) => {
                if events.send(RuntimeEvent::Click(click)).await.is_err() {
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(err) => {
                let shown: String = line.trim().chars().take(MAX_LOGGED_LINE).collect();
                logger.emit(
                    LogLevel::Warn,
                    TARGET,
                    "event_line_dropped",
                    [
                        json_str("error", err.to_string()),
                        json_str("line", shown),
                        json_kv("bytes", buf.len()),
                    ],
                );
            }
        }
    }
}

/// Skip the rest of the current line without buffering it.
async fn discard_line<R>(input: &mut R) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut skipped = 0;
    loop {
        let available = input.fill_buf().await?;
        if available.is_empty() {
            return Ok(skipped);
        }
        let (used, done) = match available.iter().position(|&byte| byte == b'\n') {
            Some(at) => (at + 1, true),
            None => (available.len(), false),
        };
        input.consume(used);
        skipped += used;
        if done {
            return Ok(skipped);
        }
    }
}
