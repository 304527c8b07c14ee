//! i3bar/swaybar wire protocol.
//!
//! Output is a header line, then an endless JSON array whose elements are
//! one rendered bar per line. Input is the mirror image: an endless array of
//! click objects, one per line.

mod block;
mod event;
mod reader;
mod writer;

pub use block::{Header, I3BarBlock};
pub use event::{ClickEvent, MouseButton, parse_event_line};
pub use reader::{ReaderOptions, read_events};
pub use writer::{ProtocolWriter, encode_line};
