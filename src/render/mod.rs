//! Composes the widget table into one bar line.

mod core;

pub use self::core::{BarRenderer, Frame, SegmentFault};
