use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters accumulated by the runtime loop.
#[derive(Debug, Default, Clone)]
pub struct RuntimeMetrics {
    events: u64,
    renders: u64,
    skipped_renders: u64,
    widget_updates: u64,
    coalesced_updates: u64,
    clicks_routed: u64,
    clicks_dropped: u64,
    signals: u64,
    block_faults: u64,
    format_errors: u64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&mut self) {
        self.events = self.events.saturating_add(1);
    }

    pub fn record_render(&mut self, flushed: bool) {
        if flushed {
            self.renders = self.renders.saturating_add(1);
        } else {
            self.skipped_renders = self.skipped_renders.saturating_add(1);
        }
    }

    /// `applied` updates were merged into one render; all but the last per
    /// block were overwritten.
    pub fn record_widget_updates(&mut self, applied: usize, coalesced: usize) {
        self.widget_updates = self.widget_updates.saturating_add(applied as u64);
        self.coalesced_updates = self.coalesced_updates.saturating_add(coalesced as u64);
    }

    pub fn record_click(&mut self, routed: bool) {
        if routed {
            self.clicks_routed = self.clicks_routed.saturating_add(1);
        } else {
            self.clicks_dropped = self.clicks_dropped.saturating_add(1);
        }
    }

    pub fn record_signal(&mut self) {
        self.signals = self.signals.saturating_add(1);
    }

    pub fn record_fault(&mut self) {
        self.block_faults = self.block_faults.saturating_add(1);
    }

    pub fn record_format_errors(&mut self, count: usize) {
        self.format_errors = self.format_errors.saturating_add(count as u64);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            events: self.events,
            renders: self.renders,
            skipped_renders: self.skipped_renders,
            widget_updates: self.widget_updates,
            coalesced_updates: self.coalesced_updates,
            clicks_routed: self.clicks_routed,
            clicks_dropped: self.clicks_dropped,
            signals: self.signals,
            block_faults: self.block_faults,
            format_errors: self.format_errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub events: u64,
    pub renders: u64,
    pub skipped_renders: u64,
    pub widget_updates: u64,
    pub coalesced_updates: u64,
    pub clicks_routed: u64,
    pub clicks_dropped: u64,
    pub signals: u64,
    pub block_faults: u64,
    pub format_errors: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(
            LogLevel::Info,
            target.to_string(),
            "runtime_metrics".to_string(),
            self.as_fields(),
        )
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("events".to_string(), json!(self.events));
        map.insert("renders".to_string(), json!(self.renders));
        map.insert("skipped_renders".to_string(), json!(self.skipped_renders));
        map.insert("widget_updates".to_string(), json!(self.widget_updates));
        map.insert("coalesced_updates".to_string(), json!(self.coalesced_updates));
        map.insert("clicks_routed".to_string(), json!(self.clicks_routed));
        map.insert("clicks_dropped".to_string(), json!(self.clicks_dropped));
        map.insert("signals".to_string(), json!(self.signals));
        map.insert("block_faults".to_string(), json!(self.block_faults));
        map.insert("format_errors".to_string(), json!(self.format_errors));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let mut metrics = RuntimeMetrics::new();
        metrics.record_render(true);
        metrics.record_render(false);
        metrics.record_widget_updates(3, 2);
        metrics.record_click(false);
        metrics.record_fault();

        let snapshot = metrics.snapshot(Duration::from_millis(1500));
        assert_eq!(snapshot.uptime_ms, 1500);
        assert_eq!(snapshot.renders, 1);
        assert_eq!(snapshot.skipped_renders, 1);
        assert_eq!(snapshot.coalesced_updates, 2);
        assert_eq!(snapshot.clicks_dropped, 1);
        assert_eq!(snapshot.block_faults, 1);

        let event = snapshot.to_log_event("bar::metrics");
        assert_eq!(event.message, "runtime_metrics");
        assert_eq!(event.fields["widget_updates"], json!(3));
    }
}
