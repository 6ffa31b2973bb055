//! Dual-pipeline playback engine
//!
//! A session plays a video-only pipeline and an optional audio-only pipeline
//! as one presentation:
//! - Control: `PlaybackSession` owns both pipelines and their state machine
//! - Sync: `ClockSynchronizer` keeps audio locked to the video clock
//! - Seeking: `SeekCoordinator` is the completion barrier for dual seeks
//! - Health: `BufferingMonitor` fuses stall signals, `SyncStats` counts work
//! - Output: `PresentationLoop` mirrors positions into `watch` channels
//!
//! `SessionCoordinator` runs all of it on a single task.

pub mod clock;
pub mod coordinator;
pub mod health;
pub mod media;
pub mod presenter;
pub mod seek;
pub mod session;
pub mod state;
pub mod types;

pub use clock::{ClockSynchronizer, DriftCorrection, SyncConfig};
pub use coordinator::{Command, LoopTiming, SessionCoordinator, SessionHandle};
pub use health::{BufferingMonitor, SyncStats, SyncSummary};
pub use media::{MediaPipeline, PipelineError, PipelineEvents};
pub use presenter::{PresentationLoop, PresentationView};
pub use seek::{SeekCompletion, SeekCoordinator};
pub use session::{PlaybackSession, SessionError, SessionOptions, SessionStatus};
pub use state::{Latch, SessionState};
pub use types::{MediaKind, PipelineEvent, PlaybackRate, Timeline, Volume};
