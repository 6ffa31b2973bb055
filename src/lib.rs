//! Synchronized playback of a video-only stream with a separate audio stream

pub mod config;
pub mod input;
pub mod pipeline;
pub mod sim;
pub mod utils;
