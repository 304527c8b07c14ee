mod utils;

pub use utils::{display_width, pad_to_width, truncate_to_width};
