//! Media pipeline interface
//!
//! A pipeline is one independent decode/render unit for a single elementary
//! stream. The engine never looks inside it: it only issues transport
//! commands and listens to the [`PipelineEvent`](super::PipelineEvent)s the
//! pipeline reports on its own channel.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::{PipelineEvent, Volume};

/// Receiving side of a pipeline's native event stream
pub type PipelineEvents = mpsc::UnboundedReceiver<PipelineEvent>;

/// Failures reported by a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("unsupported media format: {0}")]
    Unsupported(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("decode failure: {0}")]
    Decode(String),
    /// A play request was refused, typically by an autoplay policy
    #[error("play request rejected")]
    PlayRejected,
    #[error("pipeline closed")]
    Closed,
}

/// Transport controls of a single pipeline
///
/// Implementations are driven from one logical thread, hence `?Send`.
/// Writes are fire-and-forget: a position write is acknowledged later through
/// [`PipelineEvent::Seeked`](super::PipelineEvent::Seeked), and a stall is
/// reported through [`PipelineEvent::Stalled`](super::PipelineEvent::Stalled).
#[async_trait(?Send)]
pub trait MediaPipeline {
    /// Start or resume playback. Resolves once the pipeline accepted the request.
    async fn play(&mut self) -> Result<(), PipelineError>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Move the playback position. Completion is signalled asynchronously.
    fn seek(&mut self, position: f64);

    /// Media duration in seconds, `0.0` while unknown
    fn duration(&self) -> f64;

    /// End of the buffered range containing the playback position, in seconds
    fn buffered_end(&self) -> f64;

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&mut self, rate: f64);

    fn set_volume(&mut self, volume: Volume);

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;
}
