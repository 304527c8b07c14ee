//! Lifecycle audit hooks for `BarRuntime`.
//!
//! Records carry a stage plus structured details so callers can log, buffer
//! or assert on the runtime's progression without touching the core loop.

use std::sync::Mutex;
use std::time::SystemTime;

use serde_json::Value;

/// Checkpoints emitted by `BarRuntime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeAuditStage {
    /// Header written; the loop is about to start.
    RuntimeStarted,
    /// A block task was spawned into a slot.
    BlockSpawned,
    /// A slot was filled with an error because its block could not be built.
    BlockFailed,
    /// A block task panicked or returned an error; its slot is frozen.
    BlockFaulted,
    /// Several queued updates were merged into one render.
    UpdatesCoalesced,
    /// A new bar line was written.
    RenderCommitted,
    /// The composed line matched the previous one and was not written.
    RenderSkipped,
    ClickRouted,
    ClickDropped,
    SignalDispatched,
    /// Runtime stopped (shutdown, restart or output loss).
    RuntimeStopped,
}

/// Structured audit entry.
#[derive(Debug, Clone)]
pub struct RuntimeAuditEvent {
    pub timestamp: SystemTime,
    pub stage: RuntimeAuditStage,
    pub details: Vec<(String, Value)>,
}

impl RuntimeAuditEvent {
    fn new(stage: RuntimeAuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Builder helper to append fields ergonomically.
pub struct RuntimeAuditEventBuilder {
    event: RuntimeAuditEvent,
}

impl RuntimeAuditEventBuilder {
    pub fn new(stage: RuntimeAuditStage) -> Self {
        Self {
            event: RuntimeAuditEvent::new(stage),
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event.details.push((key.into(), value.into()));
        self
    }

    pub fn finish(self) -> RuntimeAuditEvent {
        self.event
    }
}

/// Trait implemented by any audit sink.
pub trait RuntimeAudit: Send + Sync {
    fn record(&self, event: RuntimeAuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullRuntimeAudit;

impl RuntimeAudit for NullRuntimeAudit {
    fn record(&self, _event: RuntimeAuditEvent) {}
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    events: Mutex<Vec<RuntimeAuditEvent>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RuntimeAuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<RuntimeAuditStage> {
        self.events().into_iter().map(|event| event.stage).collect()
    }

    pub fn count(&self, stage: RuntimeAuditStage) -> usize {
        self.stages().into_iter().filter(|s| *s == stage).count()
    }
}

impl RuntimeAudit for MemoryAudit {
    fn record(&self, event: RuntimeAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_audit_keeps_details() {
        let audit = MemoryAudit::new();
        audit.record(
            RuntimeAuditEventBuilder::new(RuntimeAuditStage::BlockSpawned)
                .detail("block", 3)
                .detail("kind", "time")
                .finish(),
        );
        audit.record(RuntimeAuditEventBuilder::new(RuntimeAuditStage::RenderSkipped).finish());

        assert_eq!(
            audit.stages(),
            vec![RuntimeAuditStage::BlockSpawned, RuntimeAuditStage::RenderSkipped]
        );
        let spawned = &audit.events()[0];
        assert_eq!(spawned.detail("kind"), Some(&Value::from("time")));
        assert_eq!(audit.count(RuntimeAuditStage::RenderSkipped), 1);
    }
}
