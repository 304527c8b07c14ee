use std::time::Duration;

use crate::theme::SharedConfig;
use crate::widget::Widget;

/// One configured block's position on the bar.
#[derive(Debug, Clone)]
pub struct Slot {
    pub kind: String,
    pub shared: SharedConfig,
    widget: Option<Widget>,
    faulted: bool,
}

impl Slot {
    fn new(kind: String, shared: SharedConfig) -> Self {
        Self {
            kind,
            shared,
            widget: None,
            faulted: false,
        }
    }

    /// Last widget the block produced. `None` until its first update.
    pub fn widget(&self) -> Option<&Widget> {
        self.widget.as_ref()
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }
}

/// Table of slots indexed by configuration position.
///
/// Replacing a slot's widget is a whole-value swap, so a render never sees
/// half of one update and half of another.
#[derive(Debug, Default)]
pub struct WidgetTable {
    slots: Vec<Slot>,
    dirty: bool,
}

impl WidgetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot and return its index.
    pub fn push_slot(&mut self, kind: impl Into<String>, shared: SharedConfig) -> usize {
        self.slots.push(Slot::new(kind.into(), shared));
        self.slots.len() - 1
    }

    /// Store `widget` as the slot's latest. Returns `false` for an unknown index.
    pub fn apply(&mut self, index: usize, widget: Widget) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.widget = Some(widget);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Freeze the slot at its current widget. Returns `true` the first time.
    pub fn mark_faulted(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if !slot.faulted => {
                slot.faulted = true;
                true
            }
            _ => false,
        }
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn has_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning whether anything changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Smallest animation interval of any visible widget.
    pub fn animation_interval(&self) -> Option<Duration> {
        self.slots
            .iter()
            .filter_map(|slot| slot.widget.as_ref().and_then(Widget::interval))
            .min()
    }
}
