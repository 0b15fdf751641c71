//! Domain models for purchase sync

mod checkpoint;
mod purchase;
mod window;

pub use checkpoint::{Checkpoint, DEFAULT_EPOCH};
pub use purchase::Purchase;
pub use window::{TimeWindow, format_api_time, parse_api_time};
