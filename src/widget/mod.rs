mod core;

pub use self::core::{Align, Content, MinWidth, RenderedSegment, Segment, Spacing, State, Widget};
