//! OS signal listeners. Each watched signal gets its own task that turns
//! deliveries into `RuntimeEvent`s.

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::RuntimeEvent;
use crate::logging::{LogLevel, Logger, json_kv};
use crate::routing::BarSignal;

const TARGET: &str = "bar::signals";

/// Largest `n` accepted for `SIGRTMIN + n`, or `None` where real-time
/// signals are unavailable.
pub fn max_custom_signal() -> Option<i32> {
    #[cfg(target_os = "linux")]
    {
        Some(libc::SIGRTMAX() - libc::SIGRTMIN())
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Map a raw signal number onto the event the runtime should see.
pub fn decode_signal(raw: i32) -> Option<RuntimeEvent> {
    match raw {
        libc::SIGINT | libc::SIGTERM => Some(RuntimeEvent::Shutdown),
        libc::SIGUSR1 => Some(RuntimeEvent::Signal(BarSignal::RefreshAll)),
        libc::SIGUSR2 => Some(RuntimeEvent::Signal(BarSignal::Restart)),
        #[cfg(target_os = "linux")]
        n if (libc::SIGRTMIN()..=libc::SIGRTMAX()).contains(&n) => {
            Some(RuntimeEvent::Signal(BarSignal::Custom(n - libc::SIGRTMIN())))
        }
        _ => None,
    }
}

/// Start listeners for the fixed signals plus `SIGRTMIN + n` for every `n`
/// in `custom`.
pub fn spawn_listeners(
    events: &mpsc::Sender<RuntimeEvent>,
    custom: &[i32],
    logger: &Logger,
) -> std::io::Result<Vec<JoinHandle<()>>> {
    let mut raw = vec![libc::SIGINT, libc::SIGTERM, libc::SIGUSR1, libc::SIGUSR2];
    match realtime_base() {
        Some(base) => raw.extend(custom.iter().map(|n| base + n)),
        None if !custom.is_empty() => logger.emit(
            LogLevel::Warn,
            TARGET,
            "realtime_signals_unsupported",
            [json_kv("requested", custom.len())],
        ),
        None => {}
    }
    raw.sort_unstable();
    raw.dedup();

    let mut handles = Vec::with_capacity(raw.len());
    for number in raw {
        let Some(event) = decode_signal(number) else {
            continue;
        };
        let mut stream = signal(SignalKind::from_raw(number))?;
        let tx = events.clone();
        let logger = logger.clone();
        handles.push(tokio::spawn(async move {
            while stream.recv().await.is_some() {
                logger.emit(LogLevel::Debug, TARGET, "signal_received", [json_kv("signal", number)]);
                if tx.send(event.clone()).await.is_err() {
                    break;
                }
            }
        }));
    }
    Ok(handles)
}

fn realtime_base() -> Option<i32> {
    #[cfg(target_os = "linux")]
    {
        Some(libc::SIGRTMIN())
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
