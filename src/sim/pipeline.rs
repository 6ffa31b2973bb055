//! Virtual-clock media pipeline
//!
//! [`SimulatedPipeline`] is the handle given to a session. [`SimControl`] is
//! the "native" side: it advances virtual time and emits the events a real
//! decoder would, and lets callers inject skew, stalls, seek latency, play
//! rejections and failures.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::pipeline::{MediaKind, MediaPipeline, PipelineError, PipelineEvent, PipelineEvents, Volume};

/// Seconds of media buffered ahead of the playback position
const LOOKAHEAD_SECS: f64 = 10.0;

/// Behaviour of a simulated pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct SimSettings {
    /// Media duration in seconds
    pub duration: f64,
    /// Virtual time until the pipeline reports readiness
    pub ready_after: Duration,
    /// Virtual time between a position write and its acknowledgement
    pub seek_latency: Duration,
    /// Multiplier applied on top of the requested rate, to inject drift
    pub skew: f64,
    /// Refuse play requests
    pub reject_play: bool,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            duration: 120.0,
            ready_after: Duration::ZERO,
            seek_latency: Duration::ZERO,
            skew: 1.0,
            reject_play: false,
        }
    }
}

#[derive(Debug)]
struct SimCore {
    kind: MediaKind,
    settings: SimSettings,
    events: mpsc::UnboundedSender<PipelineEvent>,

    elapsed: f64,
    position: f64,
    rate: f64,
    paused: bool,
    muted: bool,
    volume: Volume,
    ready: bool,
    stalled: bool,
    ended: bool,
    failed: bool,
    /// Remaining latency of the pending position write
    seek_pending: Option<f64>,

    play_calls: u32,
    seeks: Vec<f64>,
    rate_history: Vec<f64>,
}

impl SimCore {
    fn emit(&self, event: PipelineEvent) {
        // Receiver dropped: the session is gone, nobody listens anymore
        let _ = self.events.send(event);
    }

    fn advance(&mut self, dt: f64) {
        if self.failed {
            return;
        }
        self.elapsed += dt;

        if !self.ready && self.elapsed >= self.settings.ready_after.as_secs_f64() {
            self.ready = true;
            self.emit(PipelineEvent::Ready);
        }

        if let Some(remaining) = self.seek_pending {
            let remaining = remaining - dt;
            if remaining <= 0.0 {
                self.seek_pending = None;
                self.emit(PipelineEvent::Seeked);
            } else {
                self.seek_pending = Some(remaining);
            }
            return;
        }

        if self.paused || !self.ready || self.stalled || self.ended {
            return;
        }

        self.position += dt * self.rate * self.settings.skew;
        if self.position >= self.settings.duration {
            self.position = self.settings.duration;
            self.ended = true;
            self.paused = true;
            self.emit(PipelineEvent::TimeUpdate);
            self.emit(PipelineEvent::Ended);
        } else {
            self.emit(PipelineEvent::TimeUpdate);
        }
    }

    fn write_position(&mut self, position: f64) {
        self.position = position.clamp(0.0, self.settings.duration);
        self.ended = self.position >= self.settings.duration;
        self.seeks.push(self.position);

        if self.settings.seek_latency.is_zero() {
            self.seek_pending = None;
            self.emit(PipelineEvent::Seeked);
        } else {
            self.seek_pending = Some(self.settings.seek_latency.as_secs_f64());
        }
    }
}

type Shared = Arc<Mutex<SimCore>>;

fn lock(core: &Shared) -> MutexGuard<'_, SimCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session-facing handle of a simulated pipeline
#[derive(Debug)]
pub struct SimulatedPipeline {
    core: Shared,
}

/// Driver-facing side of a simulated pipeline
#[derive(Debug, Clone)]
pub struct SimControl {
    core: Shared,
}

impl SimulatedPipeline {
    /// Create a pipeline, its control and its event stream
    pub fn new(kind: MediaKind, settings: SimSettings) -> (Self, SimControl, PipelineEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let core = Arc::new(Mutex::new(SimCore {
            kind,
            settings,
            events,
            elapsed: 0.0,
            position: 0.0,
            rate: 1.0,
            paused: true,
            muted: false,
            volume: Volume::default(),
            ready: false,
            stalled: false,
            ended: false,
            failed: false,
            seek_pending: None,
            play_calls: 0,
            seeks: Vec::new(),
            rate_history: Vec::new(),
        }));

        (
            SimulatedPipeline {
                core: Arc::clone(&core),
            },
            SimControl { core },
            rx,
        )
    }
}

#[async_trait(?Send)]
impl MediaPipeline for SimulatedPipeline {
    async fn play(&mut self) -> Result<(), PipelineError> {
        let mut core = lock(&self.core);
        core.play_calls += 1;
        if core.failed {
            return Err(PipelineError::Closed);
        }
        if core.settings.reject_play {
            return Err(PipelineError::PlayRejected);
        }
        if core.ended {
            core.position = 0.0;
            core.ended = false;
        }
        core.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        lock(&self.core).paused = true;
    }

    fn is_paused(&self) -> bool {
        lock(&self.core).paused
    }

    fn current_time(&self) -> f64 {
        lock(&self.core).position
    }

    fn seek(&mut self, position: f64) {
        lock(&self.core).write_position(position);
    }

    fn duration(&self) -> f64 {
        let core = lock(&self.core);
        if core.ready { core.settings.duration } else { 0.0 }
    }

    fn buffered_end(&self) -> f64 {
        let core = lock(&self.core);
        if core.ready {
            (core.position + LOOKAHEAD_SECS).min(core.settings.duration)
        } else {
            0.0
        }
    }

    fn playback_rate(&self) -> f64 {
        lock(&self.core).rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        let mut core = lock(&self.core);
        core.rate = rate;
        core.rate_history.push(rate);
    }

    fn set_volume(&mut self, volume: Volume) {
        lock(&self.core).volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        lock(&self.core).muted = muted;
    }

    fn is_muted(&self) -> bool {
        lock(&self.core).muted
    }
}

impl SimControl {
    pub fn kind(&self) -> MediaKind {
        lock(&self.core).kind
    }

    /// Advance virtual time, emitting the resulting events
    pub fn advance(&self, dt: Duration) {
        lock(&self.core).advance(dt.as_secs_f64());
    }

    /// Report a stall; the position freezes until [`SimControl::resume`]
    pub fn stall(&self) {
        let mut core = lock(&self.core);
        if !core.stalled {
            core.stalled = true;
            core.emit(PipelineEvent::Stalled);
        }
    }

    pub fn resume(&self) {
        let mut core = lock(&self.core);
        if core.stalled {
            core.stalled = false;
            core.emit(PipelineEvent::Resumed);
        }
    }

    /// Fail permanently with `err`
    pub fn fail(&self, err: PipelineError) {
        let mut core = lock(&self.core);
        core.failed = true;
        core.paused = true;
        core.emit(PipelineEvent::Error(err));
    }

    /// Move the position without an acknowledgement, as a decoder hiccup would
    pub fn jump_to(&self, position: f64) {
        let mut core = lock(&self.core);
        core.position = position.clamp(0.0, core.settings.duration);
    }

    pub fn set_skew(&self, skew: f64) {
        lock(&self.core).settings.skew = skew;
    }

    pub fn set_reject_play(&self, reject: bool) {
        lock(&self.core).settings.reject_play = reject;
    }

    pub fn set_seek_latency(&self, latency: Duration) {
        lock(&self.core).settings.seek_latency = latency;
    }

    pub fn position(&self) -> f64 {
        lock(&self.core).position
    }

    pub fn rate(&self) -> f64 {
        lock(&self.core).rate
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.core).paused
    }

    pub fn is_muted(&self) -> bool {
        lock(&self.core).muted
    }

    pub fn volume(&self) -> Volume {
        lock(&self.core).volume
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.core).ready
    }

    /// Number of play requests received
    pub fn play_calls(&self) -> u32 {
        lock(&self.core).play_calls
    }

    /// Every position write received, in order
    pub fn seeks(&self) -> Vec<f64> {
        lock(&self.core).seeks.clone()
    }

    /// Every rate write received, in order
    pub fn rate_history(&self) -> Vec<f64> {
        lock(&self.core).rate_history.clone()
    }
}
