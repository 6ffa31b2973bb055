pub mod time;

pub use time::{format_progress, format_time};
