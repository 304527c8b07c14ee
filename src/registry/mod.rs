//! Latest widget of every configured block, in configuration order.

mod core;

pub use self::core::{Slot, WidgetTable};
