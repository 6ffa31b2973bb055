//! Simulated media pipelines driven by a virtual clock

mod pipeline;

pub use pipeline::{SimControl, SimSettings, SimulatedPipeline};
